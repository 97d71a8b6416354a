//! Client side of SecondBrain chat.
//!
//! - [`decoder`] incremental decoder for the `data: {...}` event stream,
//!   tolerant of arbitrary chunking and malformed frames
//! - [`session`] HTTP client and a chat session holding the visible
//!   message list

pub mod decoder;
pub mod session;

pub use decoder::{DecodeError, DeltaSink, MessageBuffer, StreamDecoder, decode_stream};
pub use session::{ChatClient, ChatSession, ClientError, FALLBACK_MESSAGE};
