//! Stream events and the per-task event queue.
//!
//! The event queue is the hand-off point between the agent's producer side
//! (a [`TaskStream`](super::TaskStream)) and the single consumer that fans
//! events out to subscribers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use crate::types::{StreamingMessageResult, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};

/// An event emitted by a task's producer stream.
///
/// `EndOfStream` is an internal sentinel: it tells the consumer to stop and
/// is never surfaced to protocol clients.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A task status change.
    StatusUpdate(TaskStatusUpdateEvent),
    /// An artifact produced or extended.
    ArtifactUpdate(TaskArtifactUpdateEvent),
    /// End-of-stream sentinel; consumer exit cue only.
    EndOfStream {
        /// The task whose stream ended.
        task_id: String,
        /// The context the task belongs to.
        context_id: String,
    },
}

impl StreamEvent {
    /// Returns the task ID this event belongs to.
    pub fn task_id(&self) -> &str {
        match self {
            Self::StatusUpdate(e) => &e.task_id,
            Self::ArtifactUpdate(e) => &e.task_id,
            Self::EndOfStream { task_id, .. } => task_id,
        }
    }

    /// Returns true if this is the end-of-stream sentinel.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream { .. })
    }

    /// Returns true if this is a status update with `final = true`.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::StatusUpdate(e) if e.r#final)
    }

    /// Converts the event into a protocol-visible result frame.
    ///
    /// Returns `None` for the end-of-stream sentinel.
    pub fn into_result(self) -> Option<StreamingMessageResult> {
        match self {
            Self::StatusUpdate(e) => Some(StreamingMessageResult::StatusUpdate(e)),
            Self::ArtifactUpdate(e) => Some(StreamingMessageResult::ArtifactUpdate(e)),
            Self::EndOfStream { .. } => None,
        }
    }
}

/// An ordered FIFO of [`StreamEvent`]s with a blocking dequeue.
///
/// Implementations are written to by one producer (the task's
/// [`TaskStream`](super::TaskStream)) and drained by exactly one
/// [`StreamConsumer`](super::StreamConsumer). Durable replacements can be
/// dropped in behind this trait.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Enqueues an event. Never blocks; silently dropped once closed.
    fn enqueue(&self, event: StreamEvent);

    /// Dequeues the next event, suspending until one arrives.
    ///
    /// Returns `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<StreamEvent>;

    /// Closes the queue: pending waiters resolve with `None` and future
    /// enqueues are dropped. Idempotent.
    fn close(&self);

    /// Returns true if the queue has been closed.
    fn is_closed(&self) -> bool;

    /// Returns the number of buffered events.
    fn len(&self) -> usize;

    /// Returns true if no events are buffered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process, unbounded [`EventQueue`].
#[derive(Debug, Default)]
pub struct InMemoryEventQueue {
    buffer: Mutex<VecDeque<StreamEvent>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryEventQueue {
    /// Creates a new open, empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    fn enqueue(&self, event: StreamEvent) {
        if self.closed.load(Ordering::Acquire) {
            debug!(task_id = %event.task_id(), "Queue is closed; event dropped");
            return;
        }
        self.buffer
            .lock()
            .expect("event queue lock poisoned")
            .push_back(event);
        // Each enqueue wakes at most one waiter.
        self.notify.notify_one();
    }

    async fn dequeue(&self) -> Option<StreamEvent> {
        loop {
            // Register interest before inspecting state so a concurrent
            // enqueue/close between the check and the await is not lost.
            let notified = self.notify.notified();
            {
                let mut buffer = self.buffer.lock().expect("event queue lock poisoned");
                if let Some(event) = buffer.pop_front() {
                    return Some(event);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            notified.await;
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Event queue closed");
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn len(&self) -> usize {
        self.buffer.lock().expect("event queue lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use std::sync::Arc;
    use std::time::Duration;

    fn status_event(task_id: &str) -> StreamEvent {
        StreamEvent::StatusUpdate(TaskStatusUpdateEvent::new(
            task_id,
            "c1",
            TaskStatus::working(),
            false,
        ))
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryEventQueue::new();
        queue.enqueue(status_event("t1"));
        queue.enqueue(status_event("t2"));
        queue.enqueue(status_event("t3"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue().await.unwrap().task_id(), "t1");
        assert_eq!(queue.dequeue().await.unwrap().task_id(), "t2");
        assert_eq!(queue.dequeue().await.unwrap().task_id(), "t3");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_suspends_until_enqueue() {
        let queue = Arc::new(InMemoryEventQueue::new());

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(status_event("late"));

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.task_id(), "late");
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_with_none() {
        let queue = Arc::new(InMemoryEventQueue::new());

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        assert!(waiter.await.unwrap().is_none());
        // Idempotent
        queue.close();
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_enqueue_after_close_is_dropped() {
        let queue = InMemoryEventQueue::new();
        queue.enqueue(status_event("kept"));
        queue.close();
        queue.enqueue(status_event("dropped"));

        // Buffered events drain before the close is observed.
        assert_eq!(queue.dequeue().await.unwrap().task_id(), "kept");
        assert!(queue.dequeue().await.is_none());
    }

    #[test]
    fn test_sentinel_has_no_result_frame() {
        let sentinel = StreamEvent::EndOfStream {
            task_id: "t1".into(),
            context_id: "c1".into(),
        };
        assert!(sentinel.is_end_of_stream());
        assert!(sentinel.into_result().is_none());
        assert!(status_event("t1").into_result().is_some());
    }
}
