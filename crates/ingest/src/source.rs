//! Event sources feeding the worker.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::ScoreEvent;

/// A source of score events.
///
/// `next_event` returns `None` once the source is exhausted. The worker may
/// drop a pending `next_event` future when it is stopped, so implementations
/// must not lose an event that was not yet returned.
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next event.
    async fn next_event(&mut self) -> Option<ScoreEvent>;
}

/// Source backed by a tokio mpsc channel.
///
/// The source is exhausted once every sender has been dropped and the
/// channel is drained.
#[derive(Debug)]
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<ScoreEvent>,
}

impl ChannelEventSource {
    /// Wraps an existing receiver.
    pub fn new(receiver: mpsc::Receiver<ScoreEvent>) -> Self {
        Self { receiver }
    }

    /// Creates a bounded channel and returns its sender with the source.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ScoreEvent>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<ScoreEvent> {
        self.receiver.recv().await
    }
}

/// Source replaying a fixed, in-memory sequence of events.
#[derive(Debug, Clone, Default)]
pub struct IterEventSource {
    events: VecDeque<ScoreEvent>,
}

impl IterEventSource {
    /// Creates a source yielding `events` in order.
    pub fn new(events: impl IntoIterator<Item = ScoreEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Number of events not yet yielded.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl EventSource for IterEventSource {
    async fn next_event(&mut self) -> Option<ScoreEvent> {
        self.events.pop_front()
    }
}

/// Source adapting any `Stream` of events.
pub struct StreamEventSource<St> {
    stream: St,
}

impl<St> StreamEventSource<St>
where
    St: Stream<Item = ScoreEvent> + Unpin + Send,
{
    /// Wraps the stream.
    pub fn new(stream: St) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<St> EventSource for StreamEventSource<St>
where
    St: Stream<Item = ScoreEvent> + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<ScoreEvent> {
        self.stream.next().await
    }
}

/// Source reading one JSON-encoded [`ScoreEvent`] per line.
///
/// Lines are read as raw bytes, so a line that is not valid UTF-8 is treated
/// like any other undecodable line. Blank lines are ignored. Malformed lines
/// are logged and skipped; only an I/O error from the reader ends the source.
pub struct JsonLinesEventSource<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: u64,
}

impl<R> JsonLinesEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Creates a source reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R> EventSource for JsonLinesEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<ScoreEvent> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "failed to read score events, closing source");
                    return None;
                }
            }
            self.line_number += 1;

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<ScoreEvent>(line) {
                Ok(event) => return Some(event),
                Err(err) => {
                    tracing::warn!(
                        line = self.line_number,
                        error = %err,
                        "dropping malformed score event"
                    );
                    metrics::counter!("score_events_rejected_total", "reason" => "malformed")
                        .increment(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iter_source_yields_in_order() {
        let mut source = IterEventSource::new(vec![
            ScoreEvent::new("e", "s1", 0.1),
            ScoreEvent::new("e", "s2", 0.2),
        ]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_event().await.unwrap().student_id, "s1");
        assert_eq!(source.next_event().await.unwrap().student_id, "s2");
        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelEventSource::channel(4);
        tx.send(ScoreEvent::new("e", "s", 0.5)).await.unwrap();
        drop(tx);

        assert!(source.next_event().await.is_some());
        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_source() {
        let stream = futures_util::stream::iter(vec![ScoreEvent::new("e", "s", 0.3)]);
        let mut source = StreamEventSource::new(stream);
        assert_eq!(source.next_event().await.unwrap().score, 0.3);
        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_json_lines_skips_blank_and_malformed() {
        let input = concat!(
            r#"{"examId":"e1","studentId":"s1","score":0.5,"eventId":"a"}"#,
            "\n",
            "\n",
            "not json\n",
            r#"{"examId":"e1","studentId":"s2","score":"high","eventId":"b"}"#,
            "\n",
            r#"{"examId":"e2","studentId":"s1","score":1.0,"eventId":"c"}"#,
            "\n",
        );
        let mut source = JsonLinesEventSource::new(input.as_bytes());

        let first = source.next_event().await.unwrap();
        assert_eq!(first.event_id, "a");
        let second = source.next_event().await.unwrap();
        assert_eq!(second.event_id, "c");
        assert_eq!(second.exam_id, "e2");
        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_json_lines_passes_incomplete_events_to_validation() {
        let input = r#"{"studentId":"s1","score":0.5,"eventId":"a"}"#;
        let mut source = JsonLinesEventSource::new(input.as_bytes());
        let event = source.next_event().await.unwrap();
        assert!(event.exam_id.is_empty());
        assert!(event.validate().is_err());
    }

    #[tokio::test]
    async fn test_json_lines_skips_invalid_utf8() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"examId":"e1","studentId":"s1","score":0.5,"eventId":"a"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"examId":"e1","studentId":"s2","score":0.7,"eventId":"b"}"#);
        input.extend_from_slice(b"\n");
        let mut source = JsonLinesEventSource::new(input.as_slice());

        assert_eq!(source.next_event().await.unwrap().event_id, "a");
        assert_eq!(source.next_event().await.unwrap().event_id, "b");
        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_json_lines_last_line_without_newline() {
        let input = r#"{"examId":"e1","studentId":"s1","score":0.5,"eventId":"a"}"#;
        let mut source = JsonLinesEventSource::new(input.as_bytes());
        assert_eq!(source.next_event().await.unwrap().event_id, "a");
        assert!(source.next_event().await.is_none());
    }
}
