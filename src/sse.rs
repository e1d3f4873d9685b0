//! Server-Sent Events (SSE) decoding for streamed completions.
//!
//! The server answers a streaming request with newline-delimited lines.  Lines
//! that start with `data: ` carry either a JSON chunk or the `[DONE]` sentinel;
//! everything else (blank lines, comments, keep-alives) is ignored.
//!
//! [`decode_line`] and [`assemble`] are pure and work on literal lines.
//! [`decode_stream`] adapts a chunked byte stream from the HTTP response into a
//! stream of content fragments.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_LINES, STREAM_TTFB,
};
use crate::types::ChatCompletionChunk;

/// Prefix of every data-bearing line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a single line of the stream means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// A content fragment, possibly empty.
    Fragment(String),
    /// The end-of-stream sentinel.  Nothing after it may be read.
    Done,
    /// Not a data line.
    Ignored,
}

/// Decode one raw line of the stream.
///
/// # Errors
///
/// Returns [`Error::Streaming`] when a data line carries a payload that is not a
/// valid chunk.  Malformed events are never skipped.
pub fn decode_line(line: &str) -> Result<StreamLine> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(StreamLine::Ignored);
    };
    if payload == DONE_SENTINEL {
        return Ok(StreamLine::Done);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(payload).map_err(|e| {
        Error::streaming(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        )
    })?;
    Ok(StreamLine::Fragment(chunk.into_fragment()))
}

/// Fold literal lines into the final content.
///
/// Fragments are concatenated in order; reading stops at the sentinel.
///
/// # Errors
///
/// Fails on the first malformed data line.
pub fn assemble<I, S>(lines: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut content = String::new();
    for line in lines {
        match decode_line(line.as_ref())? {
            StreamLine::Fragment(fragment) => content.push_str(&fragment),
            StreamLine::Done => break,
            StreamLine::Ignored => {}
        }
    }
    Ok(content)
}

/// Decode a chunked byte stream into a stream of non-empty content fragments.
///
/// Lines may be split across chunks; partial lines are buffered until their
/// newline arrives.  The returned stream ends after the sentinel, at the end
/// of the byte stream (a trailing line without a newline is still decoded), or
/// right after yielding the first error.  The byte stream is dropped as soon as
/// the returned stream ends, which releases the connection.
pub fn decode_stream<S, E>(
    byte_stream: S,
    logger: Option<Arc<dyn ClientLogger>>,
) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = LineReader {
        inner: Some(byte_stream),
        buffer: Vec::new(),
        logger,
        started: Instant::now(),
        saw_fragment: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.inner.is_none() {
                return None;
            }

            if let Some(line) = state.take_line() {
                match state.step(&line) {
                    Step::Yield(item) => return Some((item, state)),
                    Step::Skip => continue,
                    Step::Stop => return None,
                }
            }

            let inner = state.inner.as_mut()?;
            match inner.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    STREAM_ERRORS.click();
                    state.inner = None;
                    let err =
                        Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)));
                    return Some((Err(err), state));
                }
                None => {
                    state.inner = None;
                    if state.buffer.is_empty() {
                        return None;
                    }
                    let rest = std::mem::take(&mut state.buffer);
                    return match state.step(&rest) {
                        Step::Yield(item) => Some((item, state)),
                        Step::Skip | Step::Stop => None,
                    };
                }
            }
        }
    })
}

enum Step {
    Yield(Result<String>),
    Skip,
    Stop,
}

struct LineReader<S> {
    inner: Option<S>,
    buffer: Vec<u8>,
    logger: Option<Arc<dyn ClientLogger>>,
    started: Instant,
    saw_fragment: bool,
}

impl<S> LineReader<S> {
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    fn step(&mut self, raw: &[u8]) -> Step {
        STREAM_LINES.click();
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                STREAM_ERRORS.click();
                self.inner = None;
                return Step::Yield(Err(Error::streaming(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                )));
            }
        };
        if let Some(logger) = &self.logger {
            logger.log_stream_line(line);
        }
        tracing::trace!(line, "stream line");
        match decode_line(line) {
            Ok(StreamLine::Fragment(fragment)) if fragment.is_empty() => Step::Skip,
            Ok(StreamLine::Fragment(fragment)) => {
                if !self.saw_fragment {
                    self.saw_fragment = true;
                    STREAM_TTFB.add(self.started.elapsed().as_secs_f64());
                }
                STREAM_FRAGMENTS.click();
                Step::Yield(Ok(fragment))
            }
            Ok(StreamLine::Done) => {
                tracing::debug!("stream sentinel received");
                Step::Stop
            }
            Ok(StreamLine::Ignored) => Step::Skip,
            Err(err) => {
                STREAM_ERRORS.click();
                self.inner = None;
                Step::Yield(Err(err))
            }
        }
    }
}
