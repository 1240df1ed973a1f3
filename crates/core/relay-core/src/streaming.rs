//! Server-Sent-Events framing
//!
//! [`SseDecoder`] turns a byte stream arriving in arbitrary chunks into the
//! ordered sequence of complete event payloads:
//!
//! - `data:` lines append to the current event (leading whitespace of the
//!   value dropped, a newline appended)
//! - a blank line dispatches the current event, minus its final newline
//! - `:` lines are comments
//! - any other line is ignored
//!
//! At end of stream, a trailing unterminated line is processed and a
//! trailing unterminated event is still dispatched.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use tracing::trace;

/// Incremental SSE frame decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    line_buffer: Vec<u8>,
    data_buffer: String,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every event completed by it, in order
    ///
    /// Lines are only decoded once complete, so a chunk boundary inside a
    /// multi-byte UTF-8 sequence is harmless.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.line_buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.line_buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.line_buffer[start..end]).into_owned();
            self.process_line(&line, &mut events);
            start = end + 1;
        }
        self.line_buffer.drain(..start);
        events
    }

    /// Flush at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let mut events = Vec::new();
        if !self.line_buffer.is_empty() {
            let rest = std::mem::take(&mut self.line_buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.process_line(&line, &mut events);
        }
        if !self.data_buffer.is_empty() {
            events.push(self.take_event());
        }
        // a trailing line either dispatches or extends the pending event, never both
        debug_assert!(events.len() <= 1);
        events.pop()
    }

    /// Whether a partial line or event is still buffered
    pub fn has_pending(&self) -> bool {
        !self.line_buffer.is_empty() || !self.data_buffer.is_empty()
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            if !self.data_buffer.is_empty() {
                events.push(self.take_event());
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data_buffer.push_str(value.trim_start());
            self.data_buffer.push('\n');
        } else if line.starts_with(':') {
            // comment
        } else {
            trace!("Ignoring non-data SSE line: {}", line);
        }
    }

    fn take_event(&mut self) -> String {
        let mut event = std::mem::take(&mut self.data_buffer);
        if event.ends_with('\n') {
            event.pop();
        }
        event
    }
}

struct DecodeState<S> {
    inner: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Adapt a chunked byte stream into a stream of complete event payloads
///
/// The first transport error is yielded and ends the stream.
pub fn decode_stream<S, E>(inner: S) -> impl Stream<Item = std::result::Result<String, E>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
{
    let state = DecodeState {
        inner,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(&chunk);
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    let last = st.decoder.finish();
                    st.pending.extend(last);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = ": keep-alive\n\
        data: {\"author\":\"a\"}\n\
        \n\
        event: message\n\
        data:{\"author\":\"b\",\n\
        data:  \"x\":1}\n\
        \n\
        \n\
        data: {\"author\":\"c\"}\n\
        \n";

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.push(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn test_single_chunk() {
        let events = decode_all(&[STREAM.as_bytes()]);
        assert_eq!(
            events,
            vec![
                "{\"author\":\"a\"}".to_string(),
                "{\"author\":\"b\",\n\"x\":1}".to_string(),
                "{\"author\":\"c\"}".to_string(),
            ]
        );
    }

    #[test]
    fn test_every_split_point_matches_single_chunk() {
        let bytes = STREAM.as_bytes();
        let expected = decode_all(&[bytes]);
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let bytes = STREAM.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&chunks), decode_all(&[bytes]));
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let text = "data: {\"text\":\"héllo ✓\"}\n\n";
        let bytes = text.as_bytes();
        let check_pos = text.find('✓').unwrap() + 1;
        let (a, b) = bytes.split_at(check_pos);
        assert_eq!(decode_all(&[a, b]), vec!["{\"text\":\"héllo ✓\"}".to_string()]);
    }

    #[test]
    fn test_trailing_event_without_blank_line_dispatched_once() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"n\":1}\n").is_empty());
        assert!(decoder.has_pending());
        assert_eq!(decoder.finish(), Some("{\"n\":1}".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_trailing_unterminated_line() {
        assert_eq!(decode_all(&[b"data: {\"n\":2}"]), vec!["{\"n\":2}".to_string()]);
    }

    #[test]
    fn test_crlf_framing() {
        let events = decode_all(&[b"data: {\"n\":1}\r\n\r\ndata: {\"n\":2}\r\n\r\n"]);
        assert_eq!(events, vec!["{\"n\":1}".to_string(), "{\"n\":2}".to_string()]);
    }

    #[test]
    fn test_comments_and_unknown_lines_only() {
        assert!(decode_all(&[b": ping\nretry: 100\nid: 7\n\n"]).is_empty());
    }

    #[tokio::test]
    async fn test_decode_stream_preserves_order() {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: 1\n\nda")),
            Ok(Bytes::from_static(b"ta: 2\n\n")),
            Ok(Bytes::from_static(b"data: 3")),
        ];
        let payloads: Vec<String> = decode_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(payloads, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_error() {
        let chunks: Vec<std::result::Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err("reset".to_string()),
            Ok(Bytes::from_static(b"data: 2\n\n")),
        ];
        let items: Vec<_> = decode_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items, vec![Ok("1".to_string()), Err("reset".to_string())]);
    }
}
