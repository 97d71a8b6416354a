//! Incremental decoder for the chat event stream.
//!
//! The stream is a sequence of `\n`-separated lines:
//! - `: ...` comments and blank lines are keep-alives and separators
//! - `data: {json}` carries `choices[0].delta.content`
//! - `data: [DONE]` ends the stream
//!
//! Chunk boundaries are arbitrary, including inside a line or inside a
//! multi-byte UTF-8 sequence, so the decoder keeps two pieces of state: bytes
//! of an incomplete character, and text of an incomplete line. Feeding the same
//! bytes split any other way yields the same notifications.

use futures::{Stream, StreamExt};
use secondbrain_core::message::Role;
use serde::Deserialize;
use std::fmt::Display;
use tracing::trace;

/// One visible chat message, grown in place while its reply streams in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBuffer {
    pub id: String,
    pub role: Role,
    pub text: String,
}

impl MessageBuffer {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
        }
    }

    /// An empty assistant buffer awaiting deltas.
    pub fn assistant() -> Self {
        Self::new(Role::Assistant, "")
    }
}

/// Receives the full text of a buffer each time a delta is appended.
pub trait DeltaSink {
    fn on_delta(&mut self, buffer_id: &str, text: &str);
}

impl<F: FnMut(&str, &str)> DeltaSink for F {
    fn on_delta(&mut self, buffer_id: &str, text: &str) {
        self(buffer_id, text)
    }
}

/// The transport failed before the stream ended.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Stream transport failed: {0}")]
    Transport(String),
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

enum Frame {
    Skip,
    Done,
    Delta(String),
}

fn classify(line: &str) -> Frame {
    if line.trim().is_empty() || line.starts_with(':') {
        return Frame::Skip;
    }
    let Some(payload) = line.strip_prefix("data: ") else {
        return Frame::Skip;
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Frame::Done;
    }

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => event
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())
            .map_or(Frame::Skip, Frame::Delta),
        Err(e) => {
            trace!(data = %payload, error = %e, "Ignoring unparseable event frame");
            Frame::Skip
        }
    }
}

/// Line-oriented state machine over a chunked byte stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Trailing bytes of a character split across chunks
    pending: Vec<u8>,
    /// Text after the last newline seen
    residual: String,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one chunk, appending deltas to `buffer` and notifying `sink`.
    ///
    /// Returns `true` once the terminator has been seen; later chunks are ignored.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        buffer: &mut MessageBuffer,
        sink: &mut impl DeltaSink,
    ) -> bool {
        if self.done {
            return true;
        }

        self.decode_utf8(chunk);

        while let Some(newline) = self.residual.find('\n') {
            let mut line: String = self.residual.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            match classify(&line) {
                Frame::Skip => {}
                Frame::Done => {
                    self.done = true;
                    self.residual.clear();
                    self.pending.clear();
                    return true;
                }
                Frame::Delta(delta) => {
                    buffer.text.push_str(&delta);
                    sink.on_delta(&buffer.id, &buffer.text);
                }
            }
        }

        false
    }

    /// End of input: any incomplete line is dropped. Returns how many bytes
    /// were discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.residual.len() + self.pending.len();
        if discarded > 0 {
            trace!(bytes = discarded, "Discarding incomplete trailing frame");
        }
        self.residual.clear();
        self.pending.clear();
        discarded
    }

    /// Move every complete character from `pending + chunk` into `residual`.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.residual.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.residual
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            self.residual.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Drive a [`StreamDecoder`] over an async byte stream.
///
/// Stops reading as soon as the terminator arrives, dropping the stream.
pub async fn decode_stream<S, B, E>(
    stream: S,
    buffer: &mut MessageBuffer,
    sink: &mut impl DeltaSink,
) -> Result<(), DecodeError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = StreamDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DecodeError::Transport(e.to_string()))?;
        if decoder.feed(chunk.as_ref(), buffer, &mut *sink) {
            return Ok(());
        }
    }

    decoder.finish();
    Ok(())
}
