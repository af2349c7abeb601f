//! Server-sent-event decoding for streamed chat answers.
//!
//! Network chunks do not line up with SSE frames: one chunk may carry several
//! `data:` lines, and one line (or one UTF-8 character) may be split across two
//! chunks. [`SseLineBuffer`] keeps the unterminated tail between chunks and
//! only hands out complete lines.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use super::ChatStream;
use crate::error::LLMError;

/// A decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line, prefix stripped
    Data(String),
    /// The literal `[DONE]` sentinel
    Done,
}

/// Line-buffering SSE decoder.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a network chunk and returns every frame completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the byte stream has ended.
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let rest = mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim();
    // comments, `event:`, `id:` and `retry:` fields carry no text
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    if data.is_empty() {
        return None;
    }
    Some(SseEvent::Data(data.to_string()))
}

struct SseState<F> {
    bytes: Pin<Box<dyn Stream<Item = Result<Vec<u8>, LLMError>> + Send>>,
    buffer: SseLineBuffer,
    pending: VecDeque<String>,
    finished: bool,
    parse_data: F,
}

impl<F> SseState<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Data(payload) => match (self.parse_data)(&payload) {
                    Some(fragment) if !fragment.is_empty() => self.pending.push_back(fragment),
                    Some(_) => {}
                    None => log::trace!("skipping undecodable SSE frame: {payload}"),
                },
                SseEvent::Done => {
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turns a raw HTTP byte stream into a stream of text fragments.
///
/// `parse_data` maps a frame payload to its text; returning `None` skips the
/// frame (malformed JSON, metadata-only frames). The stream ends at `[DONE]`,
/// at the end of the body, or right after a transport error.
pub fn create_sse_stream<S, B, F>(byte_stream: S, parse_data: F) -> ChatStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    F: Fn(&str) -> Option<String> + Send + 'static,
{
    let bytes = byte_stream.map(|chunk| {
        chunk
            .map(|b| b.as_ref().to_vec())
            .map_err(|e| LLMError::HttpError(e.to_string()))
    });
    decode_sse(Box::pin(bytes), parse_data)
}

fn decode_sse<F>(
    bytes: Pin<Box<dyn Stream<Item = Result<Vec<u8>, LLMError>> + Send>>,
    parse_data: F,
) -> ChatStream
where
    F: Fn(&str) -> Option<String> + Send + 'static,
{
    let state = SseState {
        bytes,
        buffer: SseLineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
        parse_data,
    };

    let fragments = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.buffer.feed(&chunk);
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    let events = state.buffer.flush();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(fragments)
}
