//! Server-sent event decoding.
//!
//! Turns a byte stream into `text/event-stream` messages. Lines end in `\n`
//! or `\r\n`; a blank line dispatches the pending event. Chunk boundaries may
//! fall anywhere, including inside a multi-byte character.

use crate::backend::EventStream;
use askdocs_core::{AppError, AppResult};
use futures::{Stream, StreamExt};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Value of the `event:` field, if any
    pub event: Option<String>,

    /// `data:` lines joined with `\n`
    pub data: String,

    /// Last seen `id:` value
    pub id: Option<String>,
}

impl SseMessage {
    /// Build a plain data-only message.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }
}

/// Incremental `text/event-stream` parser.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no line break
    scanned: usize,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;

        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            let line = &self.buffer[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let line = String::from_utf8_lossy(line).into_owned();

            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }

            start = end + 1;
            search_from = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        messages
    }

    /// True when bytes of an unterminated line are buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            other => tracing::trace!("Ignoring SSE field '{}'", other),
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = self.data.join("\n");
        self.data.clear();

        Some(SseMessage {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

/// Decode a byte stream into a stream of server-sent events.
///
/// Transport errors are forwarded as [`AppError::Stream`]; an event left
/// unterminated when the byte stream ends is discarded.
pub fn decode<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (Box::pin(bytes), SseDecoder::new());

    let messages = futures::stream::unfold(state, |(mut bytes, mut decoder)| async move {
        let items: Vec<AppResult<SseMessage>> = match bytes.next().await {
            Some(Ok(chunk)) => decoder.feed(chunk.as_ref()).into_iter().map(Ok).collect(),
            Some(Err(e)) => vec![Err(AppError::Stream(format!("Event stream error: {}", e)))],
            None => {
                if decoder.has_pending() {
                    tracing::debug!("Discarding unterminated event at end of stream");
                }
                return None;
            }
        };
        Some((futures::stream::iter(items), (bytes, decoder)))
    })
    .flatten();

    Box::pin(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b"data: {\"answer\":\"hi\"}\n\n");
        assert_eq!(messages, vec![SseMessage::data("{\"answer\":\"hi\"}")]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: hel").is_empty());
        assert!(decoder.feed(b"lo\r\n").is_empty());
        assert!(decoder.has_pending());

        let messages = decoder.feed(b"\r\n");
        assert_eq!(messages, vec![SseMessage::data("hello")]);
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "data: café\n\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = text.len() - 3;

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&text[..split]).is_empty());
        let messages = decoder.feed(&text[split..]);
        assert_eq!(messages[0].data, "café");
    }

    #[test]
    fn test_multiline_data_and_fields() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b": keep-alive\nevent: message\nid: 7\ndata: one\ndata:two\n\n");
        assert_eq!(
            messages,
            vec![SseMessage {
                event: Some("message".to_string()),
                data: "one\ntwo".to_string(),
                id: Some("7".to_string()),
            }]
        );
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\nevent: ping\n\n").is_empty());
    }

    #[test]
    fn test_several_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b"data: a\n\ndata: b\n\ndata: c");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].data, "b");
        assert!(decoder.has_pending());
    }

    #[test]
    fn test_lines_spanning_many_chunks() {
        let mut decoder = SseDecoder::new();
        for piece in ["data", ": ", "one", " two", "\r"] {
            assert!(decoder.feed(piece.as_bytes()).is_empty());
        }

        let messages = decoder.feed(b"\n\ndata: next\n\n");
        assert_eq!(
            messages,
            vec![SseMessage::data("one two"), SseMessage::data("next")]
        );
        assert!(!decoder.has_pending());
    }

    #[tokio::test]
    async fn test_decode_stream() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"answer\":\"Net".to_vec()),
            Ok(b"lify \"}\n\ndata: x\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];

        let mut stream = decode(futures::stream::iter(chunks));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.data, "{\"answer\":\"Netlify \"}");
        assert_eq!(stream.next().await.unwrap().unwrap().data, "x");
        assert!(matches!(
            stream.next().await,
            Some(Err(AppError::Stream(_)))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_drops_unterminated_tail() {
        let chunks: Vec<Result<&'static [u8], std::io::Error>> =
            vec![Ok(b"data: complete\n\n"), Ok(b"data: partial")];

        let messages: Vec<_> = decode(futures::stream::iter(chunks)).collect().await;
        assert_eq!(messages.len(), 1);
    }
}
