//! Outbound event queue.
//!
//! Producers (the session orchestrator, audio forwarders, tool-result
//! handlers) enqueue events; a single consumer drains them in FIFO order and
//! bridges them onto the duplex transport as serialized JSON frames. Closing
//! the queue is idempotent and lets the consumer drain whatever is already
//! buffered before the stream ends.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::{Mutex, Notify};

use super::error::{SpeechError, SpeechResult};
use super::events::OutboundEvent;

struct QueueInner {
    buffer: VecDeque<OutboundEvent>,
    closed: bool,
}

/// FIFO queue of outbound events with a closed flag.
///
/// Built for one consumer and any number of producers. Wakeups use stored
/// notify permits, so an enqueue that lands before the consumer parks is
/// never lost.
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(QueueInner {
                buffer: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        })
    }

    /// Append one event. Fails once the queue has been closed.
    pub async fn enqueue(&self, event: OutboundEvent) -> SpeechResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                tracing::warn!(event = event.tag(), "Dropping event enqueued after close");
                return Err(SpeechError::QueueClosed);
            }
            inner.buffer.push_back(event);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Append a batch of events in order, as one locked section.
    pub async fn enqueue_all(&self, events: Vec<OutboundEvent>) -> SpeechResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(SpeechError::QueueClosed);
            }
            inner.buffer.extend(events);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Close the queue. Idempotent; buffered events remain drainable.
    pub async fn close(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            inner.closed = true;
            tracing::debug!(buffered = inner.buffer.len(), "Outbound queue closed");
        }
        self.notify.notify_one();
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    /// Pop the next event, waiting while the queue is open and empty.
    ///
    /// Returns `None` only after the queue is both closed and drained.
    pub async fn next_event(&self) -> Option<OutboundEvent> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(event) = inner.buffer.pop_front() {
                    return Some(event);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Consume the queue as a stream of serialized JSON frames.
    ///
    /// The stream ends when the queue is closed and drained.
    pub fn into_frame_stream(self: Arc<Self>) -> impl Stream<Item = SpeechResult<Bytes>> {
        stream! {
            while let Some(event) = self.next_event().await {
                tracing::trace!(event = event.tag(), "Sending outbound frame");
                match serde_json::to_vec(&event) {
                    Ok(json) => yield Ok(Bytes::from(json)),
                    Err(e) => yield Err(SpeechError::Serialization(e.to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::speech::builder;
    use crate::core::speech::config::InferenceConfig;
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready, task};

    fn sample_event() -> OutboundEvent {
        builder::session_start(&InferenceConfig::default())
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = OutboundQueue::new();
        queue.enqueue(builder::session_start(&InferenceConfig::default())).await.unwrap();
        queue.enqueue(builder::prompt_end("p1")).await.unwrap();
        queue.enqueue(builder::session_end()).await.unwrap();
        queue.close().await;

        let tags: Vec<&str> = [
            queue.next_event().await.unwrap().tag(),
            queue.next_event().await.unwrap().tag(),
            queue.next_event().await.unwrap().tag(),
        ]
        .to_vec();
        assert_eq!(tags, vec!["sessionStart", "promptEnd", "sessionEnd"]);
        assert!(queue.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let queue = OutboundQueue::new();
        queue.enqueue(sample_event()).await.unwrap();
        queue.close().await;
        queue.close().await;
        queue.close().await;
        assert!(queue.is_closed().await);

        // Buffered event survives repeated closes
        assert!(queue.next_event().await.is_some());
        assert!(queue.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_after_close_fails() {
        let queue = OutboundQueue::new();
        queue.close().await;
        let result = queue.enqueue(sample_event()).await;
        assert!(matches!(result, Err(SpeechError::QueueClosed)));
        let result = queue.enqueue_all(vec![sample_event()]).await;
        assert!(matches!(result, Err(SpeechError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_waiting_consumer_wakes_on_enqueue() {
        let queue = OutboundQueue::new();
        let mut next = task::spawn(queue.next_event());
        assert_pending!(next.poll());

        queue.enqueue(sample_event()).await.unwrap();
        assert!(next.is_woken());
        let event = assert_ready!(next.poll());
        assert!(event.is_some());
    }

    #[tokio::test]
    async fn test_waiting_consumer_wakes_on_close() {
        let queue = OutboundQueue::new();
        let mut next = task::spawn(queue.next_event());
        assert_pending!(next.poll());

        queue.close().await;
        assert!(next.is_woken());
        let event = assert_ready!(next.poll());
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_frame_stream_serializes_and_ends() {
        let queue = OutboundQueue::new();
        queue.enqueue(builder::session_end()).await.unwrap();
        queue.close().await;

        let frames: Vec<_> = queue.into_frame_stream().collect().await;
        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        let value: serde_json::Value = serde_json::from_slice(frame).unwrap();
        assert!(value.get("sessionEnd").is_some());
    }
}
