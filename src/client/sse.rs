//! Server-Sent Events parsing for the A2A client.
//!
//! Frames are split on blank-line separators; within a frame only `data:`
//! lines are retained and concatenated, then JSON-decoded by the caller.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

use crate::error::{A2AError, Result};

/// Incremental SSE frame parser.
///
/// Feed it raw text chunks as they arrive; completed frame payloads come
/// back in order.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: String,
}

impl SseFrameParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the payloads of any frames it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..pos + 2).collect();
            if let Some(payload) = Self::decode_frame(&frame) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes a trailing frame that was not blank-line terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_frame(&rest)
    }

    /// Concatenates the `data:` lines of one frame; other fields are ignored.
    fn decode_frame(frame: &str) -> Option<String> {
        let mut data = String::new();
        for line in frame.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(value) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value.strip_prefix(' ').unwrap_or(value));
            }
        }
        if data.is_empty() { None } else { Some(data) }
    }
}

pin_project! {
    /// Adapts a stream of raw text chunks into a stream of SSE frame payloads.
    pub struct SseFrameStream<S> {
        #[pin]
        inner: S,
        parser: SseFrameParser,
        pending: VecDeque<String>,
        done: bool,
    }
}

impl<S> SseFrameStream<S> {
    /// Wraps a chunk stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseFrameParser::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseFrameStream<S>
where
    S: Stream<Item = std::result::Result<String, E>>,
    E: std::fmt::Display,
{
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(payload) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(payload)));
            }
            if *this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending.extend(this.parser.push(&chunk));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(A2AError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    if let Some(payload) = this.parser.finish() {
                        return Poll::Ready(Some(Ok(payload)));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_single_frame() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push("data: {\"a\":1}\n\n");
        assert_eq!(frames, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push("data: {\"a\"").is_empty());
        assert!(parser.push(":1}\n").is_empty());
        let frames = parser.push("\ndata: {\"b\":2}\n\n");
        assert_eq!(
            frames,
            vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]
        );
    }

    #[test]
    fn test_multi_data_lines_concatenate() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push("data: line1\ndata: line2\n\n");
        assert_eq!(frames, vec!["line1\nline2".to_string()]);
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push("event: task\nid: 3\n: comment\ndata: x\n\n");
        assert_eq!(frames, vec!["x".to_string()]);
        // A frame with no data lines yields nothing
        assert!(parser.push("event: ping\n\n").is_empty());
    }

    #[test]
    fn test_crlf_frames() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push("data: x\r\n\ndata: y\n\n");
        assert_eq!(frames, vec!["x".to_string(), "y".to_string()]);
    }

    #[tokio::test]
    async fn test_frame_stream() {
        let chunks: Vec<std::result::Result<String, std::convert::Infallible>> = vec![
            Ok("data: one\n".to_string()),
            Ok("\ndata: two\n\ndata: tr".to_string()),
            Ok("ailing\n".to_string()),
        ];
        let stream = SseFrameStream::new(futures::stream::iter(chunks));
        let frames: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(frames, vec!["one", "two", "trailing"]);
    }
}
