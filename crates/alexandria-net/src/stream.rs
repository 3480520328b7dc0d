//! The streaming half of the query transport.
//!
//! One invocation opens exactly one network stream.  The response body is a
//! sequence of newline-delimited event lines; each line starting with
//! [`EVENT_PREFIX`] carries one JSON [`StreamChunk`].  A dedicated reader
//! task decodes the body and forwards [`AnswerEvent`]s over an mpsc channel
//! in arrival order; aborting the task releases the connection and
//! guarantees no further events are delivered.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use alexandria_shared::protocol::{AnswerEvent, StreamChunk};
use alexandria_shared::types::OrganizationId;

use crate::api::{status_error, ApiClient};
use crate::error::{NetError, Result};

/// Fixed marker prefixing every event line on the wire.
pub const EVENT_PREFIX: &str = "data: ";

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
    organization_id: &'a OrganizationId,
}

/// Handle to one in-flight streaming query.
///
/// Dropping the handle aborts the reader task, so a cancelled stream cannot
/// deliver events after the fact.
#[derive(Debug)]
pub struct QueryStream {
    events: mpsc::Receiver<AnswerEvent>,
    reader: JoinHandle<()>,
}

impl QueryStream {
    /// Next event in arrival order; `None` once the channel is closed.
    pub async fn next_event(&mut self) -> Option<AnswerEvent> {
        self.events.recv().await
    }

    /// Cancel the query, aborting the reader task and releasing the stream.
    pub fn abort(&self) {
        self.reader.abort();
    }
}

impl Drop for QueryStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl ApiClient {
    /// Open a streaming query for `question` against the organization's
    /// corpus.
    ///
    /// Fails fast on a non-success status; otherwise the returned
    /// [`QueryStream`] yields events until [`AnswerEvent::Completed`] or a
    /// fatal [`AnswerEvent::Error`].
    pub async fn streaming_query(
        &self,
        question: &str,
        organization: &OrganizationId,
    ) -> Result<QueryStream> {
        let response = self
            .http
            .post(self.url("/streaming-query"))
            .bearer_auth(&self.auth_token)
            .json(&QueryRequest {
                question,
                organization_id: organization,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        debug!(org = %organization, "query stream opened");

        let (tx, events) = mpsc::channel(64);
        let reader = tokio::spawn(pump_event_lines(response.bytes_stream(), tx));

        Ok(QueryStream { events, reader })
    }
}

/// Read the body stream, reassemble lines across chunk boundaries, and
/// forward decoded events until end-of-stream or a fatal condition.
pub(crate) async fn pump_event_lines<S, E>(mut body: S, tx: mpsc::Sender<AnswerEvent>)
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    // Byte-level buffer so multi-byte characters split across network
    // chunks survive until their line is complete.
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "query stream interrupted");
                let _ = tx.send(AnswerEvent::Error(e.to_string())).await;
                return;
            }
        };

        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if !dispatch_line(&line, &tx).await {
                return;
            }
        }
    }

    // A final line may arrive without its newline.
    if !buffer.is_empty() && !dispatch_line(&buffer, &tx).await {
        return;
    }

    let _ = tx.send(AnswerEvent::Completed).await;
}

/// Decode and forward one raw line.  Returns `false` when the stream must
/// stop: a fatal event was sent or the receiver went away.
async fn dispatch_line(raw: &[u8], tx: &mpsc::Sender<AnswerEvent>) -> bool {
    let line = String::from_utf8_lossy(raw);
    match decode_event_line(line.trim_end()) {
        Ok(events) => {
            for event in events {
                let fatal = matches!(event, AnswerEvent::Error(_));
                if tx.send(event).await.is_err() || fatal {
                    return false;
                }
            }
            true
        }
        Err(e) => {
            let _ = tx.send(AnswerEvent::Error(e.to_string())).await;
            false
        }
    }
}

/// Decode one line of the wire format.
///
/// Lines without the event prefix are ignored.  A payload that fails to
/// parse is silently dropped only when the failure is a truncated-input
/// condition (the tail of a partially-delivered chunk); any other decode
/// failure is fatal.
pub(crate) fn decode_event_line(line: &str) -> Result<Vec<AnswerEvent>> {
    let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => Ok(chunk.into_events()),
        Err(e) if e.is_eof() => {
            debug!(payload, "dropping truncated event payload");
            Ok(Vec::new())
        }
        Err(e) => Err(NetError::Decode(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Unpin {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn collect_events(chunks: Vec<&'static str>) -> Vec<AnswerEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        pump_event_lines(byte_stream(chunks), tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn lines_without_prefix_are_ignored() {
        assert!(decode_event_line("").unwrap().is_empty());
        assert!(decode_event_line(": keepalive").unwrap().is_empty());
        assert!(decode_event_line("event: message").unwrap().is_empty());
    }

    #[test]
    fn truncated_payload_is_dropped_silently() {
        let events = decode_event_line(r#"data: {"answer": "cut of"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_payload_is_fatal() {
        let err = decode_event_line(r#"data: {"answer": 5}"#).unwrap_err();
        assert!(matches!(err, NetError::Decode(_)));
    }

    #[tokio::test]
    async fn deltas_arrive_in_order_then_completed() {
        let events = collect_events(vec![
            "data: {\"answer\": \"The \"}\n",
            "data: {\"answer\": \"spleen \"}\ndata: {\"answer\": \"filters.\"}\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                AnswerEvent::TextDelta {
                    text: "The ".into(),
                    insufficient_info: false
                },
                AnswerEvent::TextDelta {
                    text: "spleen ".into(),
                    insufficient_info: false
                },
                AnswerEvent::TextDelta {
                    text: "filters.".into(),
                    insufficient_info: false
                },
                AnswerEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn lines_split_across_chunks_reassemble() {
        let events = collect_events(vec![
            "data: {\"ans",
            "wer\": \"Hel",
            "lo\"}\ndata: {\"answer\": \"!\"}\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                AnswerEvent::TextDelta {
                    text: "Hello".into(),
                    insufficient_info: false
                },
                AnswerEvent::TextDelta {
                    text: "!".into(),
                    insufficient_info: false
                },
                AnswerEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn multibyte_characters_survive_chunk_splits() {
        // "é" is 0xC3 0xA9; split between the two bytes.
        let first: &'static [u8] = b"data: {\"answer\": \"caf\xc3";
        let second: &'static [u8] = b"\xa9\"}\n";
        let stream = futures::stream::iter(
            [first, second]
                .into_iter()
                .map(|c| Ok::<_, Infallible>(Bytes::from_static(c))),
        );

        let (tx, mut rx) = mpsc::channel(8);
        pump_event_lines(stream, tx).await;

        assert_eq!(
            rx.recv().await,
            Some(AnswerEvent::TextDelta {
                text: "café".into(),
                insufficient_info: false
            })
        );
    }

    #[tokio::test]
    async fn error_payload_stops_the_stream_without_completion() {
        let events = collect_events(vec![
            "data: {\"answer\": \"a\"}\n",
            "data: {\"error\": \"index unavailable\"}\ndata: {\"answer\": \"never seen\"}\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                AnswerEvent::TextDelta {
                    text: "a".into(),
                    insufficient_info: false
                },
                AnswerEvent::Error("index unavailable".into()),
            ]
        );
    }

    #[tokio::test]
    async fn fatal_decode_failure_stops_the_stream() {
        let events = collect_events(vec![
            "data: {\"answer\": \"a\"}\ndata: not json at all\ndata: {\"answer\": \"b\"}\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], AnswerEvent::Error(_)));
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_processed() {
        let events = collect_events(vec!["data: {\"answer\": \"tail\"}"]).await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::TextDelta {
                    text: "tail".into(),
                    insufficient_info: false
                },
                AnswerEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn truncated_trailing_payload_still_completes() {
        let events =
            collect_events(vec!["data: {\"answer\": \"ok\"}\ndata: {\"answer\": \"cut"]).await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::TextDelta {
                    text: "ok".into(),
                    insufficient_info: false
                },
                AnswerEvent::Completed,
            ]
        );
    }
}
