//! Stream parser for Claude Code stdout.
//!
//! Stdout arrives in arbitrary chunks. [`LineDecoder`] reassembles those
//! chunks into newline-delimited records, and [`event_stream`] turns an
//! async reader into a lazy, ordered, single-pass stream of decoded
//! [`ClaudeEvent`]s.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_core::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::cli::ClaudeEvent;

/// Size of each read from the process stdout.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Failed to parse JSON: {reason} (input: {input})")]
    ParseError { input: String, reason: String },
}

/// A boxed stream of decoded events for one invocation.
pub type EventStream = Pin<Box<dyn Stream<Item = ClaudeEvent> + Send>>;

/// Reassembles newline-delimited records from arbitrarily split chunks.
///
/// Bytes are buffered rather than text, so a UTF-8 sequence split across
/// two chunks is decoded intact once its line completes.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completes, in order.
    ///
    /// Blank records are skipped. The unterminated tail stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|&b| b == b'\n')
            .filter_map(record_from_bytes)
            .collect()
    }

    /// Flush the unterminated tail at end of stream.
    ///
    /// Returns `None` if nothing but whitespace remains.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        record_from_bytes(&rest)
    }

    /// Number of bytes waiting for a line terminator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn record_from_bytes(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parser for stream-json records.
pub struct StreamParser;

impl StreamParser {
    /// Parse a single line of stream-json output.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::ParseError` if the JSON is invalid.
    pub fn parse_line(line: &str) -> Result<ClaudeEvent, StreamError> {
        serde_json::from_str(line).map_err(|e| StreamError::ParseError {
            input: line.to_string(),
            reason: e.to_string(),
        })
    }
}

struct DecodeState<R> {
    reader: R,
    decoder: LineDecoder,
    pending: VecDeque<ClaudeEvent>,
    chunk: Vec<u8>,
    verbose: bool,
    done: bool,
}

impl<R> DecodeState<R> {
    fn enqueue(&mut self, records: impl IntoIterator<Item = String>) {
        for record in records {
            match StreamParser::parse_line(&record) {
                Ok(event) => self.pending.push_back(event),
                Err(e) if self.verbose => {
                    tracing::warn!(error = %e, "Skipping malformed stream-json record");
                }
                Err(e) => {
                    tracing::trace!(error = %e, "Skipping malformed stream-json record");
                }
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        let tail = self.decoder.finish();
        self.enqueue(tail);
    }
}

/// Decode events from a byte source until it is exhausted.
///
/// Malformed records are dropped. A read error ends the stream as if the
/// source had closed; callers should still check the process exit code.
pub fn event_stream<R>(reader: R, verbose: bool) -> EventStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let state = DecodeState {
        reader,
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        chunk: vec![0; READ_CHUNK_SIZE],
        verbose,
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }

            match state.reader.read(&mut state.chunk).await {
                Ok(0) => state.finish(),
                Ok(n) => {
                    let records = state.decoder.push(&state.chunk[..n]);
                    state.enqueue(records);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Claude stdout read failed, ending event stream");
                    state.finish();
                }
            }
        }
    }))
}
