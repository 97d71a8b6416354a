//! Retrieval-augmented chat for SecondBrain.
//!
//! A chat request flows through three stages:
//!
//! 1. [`ContextRetriever`]: best-effort search of completed knowledge items
//!    for the latest user turn
//! 2. [`prompt`]: persona plus retrieved excerpts, prepended as a system turn
//! 3. [`ChatPipeline`]: forwards the augmented request and hands back the
//!    backend's event stream untouched
//!
//! Retrieval never fails a chat: any store error degrades to "no context".

pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use pipeline::{ChatError, ChatPipeline};
pub use prompt::{AssembledRequest, assemble};
pub use retriever::ContextRetriever;
