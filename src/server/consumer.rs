//! Per-task stream consumption and fan-out.
//!
//! Exactly one [`StreamConsumer`] drains a task's event queue. The first
//! subscriber drives the drain (`consume()`); any number of late subscribers
//! tap in (`tap()`) and observe only events processed after they subscribed.
//! The [`StreamManager`] is the single arbiter enforcing at most one consumer
//! per task id.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{A2AError, Result};

use super::events::{EventQueue, StreamEvent};

/// A boxed stream of task events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

const STATE_IDLE: u8 = 0;
const STATE_CONSUMING: u8 = 1;
const STATE_FINISHED: u8 = 2;

type ConsumerRegistry = RwLock<HashMap<String, Arc<StreamConsumer>>>;

/// Drains one task's event queue and multiplexes events to subscribers.
pub struct StreamConsumer {
    task_id: String,
    queue: Arc<dyn EventQueue>,
    tappers: Mutex<Vec<mpsc::UnboundedSender<StreamEvent>>>,
    state: AtomicU8,
    cancel: CancellationToken,
    registry: Weak<ConsumerRegistry>,
}

impl StreamConsumer {
    fn new(
        task_id: impl Into<String>,
        queue: Arc<dyn EventQueue>,
        cancel: CancellationToken,
        registry: Weak<ConsumerRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            task_id: task_id.into(),
            queue,
            tappers: Mutex::new(Vec::new()),
            state: AtomicU8::new(STATE_IDLE),
            cancel,
            registry,
        })
    }

    /// Returns the task id this consumer drains.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Returns true while the consumer has not finished.
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) != STATE_FINISHED
    }

    /// The primary drain of the task's queue.
    ///
    /// Yields every event once, fanning each out to registered tappers before
    /// yielding. Exits on the end-of-stream sentinel (never yielded), on queue
    /// close, or when the abort token trips; on exit all tappers terminate and
    /// the consumer unregisters itself. A second call is a no-op returning an
    /// empty stream.
    pub fn consume(self: &Arc<Self>) -> EventStream {
        if self
            .state
            .compare_exchange(
                STATE_IDLE,
                STATE_CONSUMING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!(task_id = %self.task_id, "consume() called on a non-idle consumer");
            return Box::pin(futures::stream::empty());
        }

        let this = Arc::clone(self);
        Box::pin(async_stream::stream! {
            // Runs cleanup even when the subscriber drops the stream early.
            let _guard = FinishGuard(Arc::clone(&this));
            loop {
                let event = tokio::select! {
                    biased;
                    _ = this.cancel.cancelled() => None,
                    event = this.queue.dequeue() => event,
                };
                match event {
                    None => break,
                    Some(event) if event.is_end_of_stream() => break,
                    Some(event) => {
                        this.broadcast(&event);
                        yield event;
                    }
                }
            }
        })
    }

    /// A live-only subscription: yields events processed after this call,
    /// with no replay, and terminates when the consumer exits.
    pub fn tap(&self) -> EventStream {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut tappers = self.tappers.lock().expect("tapper lock poisoned");
            if self.state.load(Ordering::Acquire) == STATE_FINISHED {
                return Box::pin(futures::stream::empty());
            }
            tappers.push(tx);
        }
        debug!(task_id = %self.task_id, "Tapper registered");
        Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        })
    }

    fn broadcast(&self, event: &StreamEvent) {
        let mut tappers = self.tappers.lock().expect("tapper lock poisoned");
        // A closed receiver means the tapper's iterator was dropped.
        tappers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn finish(self: &Arc<Self>) {
        {
            let mut tappers = self.tappers.lock().expect("tapper lock poisoned");
            if self.state.swap(STATE_FINISHED, Ordering::AcqRel) == STATE_FINISHED {
                return;
            }
            // Dropping the senders terminates every tap iterator.
            tappers.clear();
        }
        self.queue.close();
        if let Some(registry) = self.registry.upgrade() {
            let mut consumers = registry.write().expect("consumer registry poisoned");
            if consumers
                .get(&self.task_id)
                .is_some_and(|c| Arc::ptr_eq(c, self))
            {
                consumers.remove(&self.task_id);
            }
        }
        debug!(task_id = %self.task_id, "Stream consumer finished");
    }
}

struct FinishGuard(Arc<StreamConsumer>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl std::fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("task_id", &self.task_id)
            .field("state", &self.state.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Task-id keyed registry of [`StreamConsumer`]s.
///
/// The manager is the single arbiter of the at-most-one-consumer-per-task
/// invariant; creating a second consumer for a live task id fails
/// synchronously.
#[derive(Debug, Default)]
pub struct StreamManager {
    consumers: Arc<ConsumerRegistry>,
}

impl StreamManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a consumer for a task. Errors if one already exists.
    pub fn create_consumer(
        &self,
        task_id: &str,
        queue: Arc<dyn EventQueue>,
        cancel: CancellationToken,
    ) -> Result<Arc<StreamConsumer>> {
        let mut consumers = self.consumers.write().expect("consumer registry poisoned");
        if consumers.contains_key(task_id) {
            return Err(A2AError::Internal(format!(
                "A stream consumer already exists for task '{task_id}'"
            )));
        }
        let consumer =
            StreamConsumer::new(task_id, queue, cancel, Arc::downgrade(&self.consumers));
        consumers.insert(task_id.to_string(), Arc::clone(&consumer));
        debug!(task_id = %task_id, "Stream consumer registered");
        Ok(consumer)
    }

    /// Taps the existing consumer for the task, or creates one and returns
    /// its primary drain.
    pub fn tap_or_consume(
        &self,
        task_id: &str,
        queue: Arc<dyn EventQueue>,
        cancel: CancellationToken,
    ) -> EventStream {
        if let Some(consumer) = self.get(task_id) {
            return consumer.tap();
        }
        match self.create_consumer(task_id, queue, cancel) {
            Ok(consumer) => consumer.consume(),
            // Lost a registration race: tap whoever won.
            Err(_) => match self.get(task_id) {
                Some(consumer) => consumer.tap(),
                None => Box::pin(futures::stream::empty()),
            },
        }
    }

    /// Returns the consumer for a task, if present.
    pub fn get(&self, task_id: &str) -> Option<Arc<StreamConsumer>> {
        self.consumers
            .read()
            .expect("consumer registry poisoned")
            .get(task_id)
            .cloned()
    }

    /// Evicts the consumer for a task.
    pub fn remove(&self, task_id: &str) -> Option<Arc<StreamConsumer>> {
        self.consumers
            .write()
            .expect("consumer registry poisoned")
            .remove(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::events::InMemoryEventQueue;
    use crate::types::{TaskStatus, TaskStatusUpdateEvent};
    use futures::StreamExt;

    fn status_event(n: u32) -> StreamEvent {
        StreamEvent::StatusUpdate(TaskStatusUpdateEvent::new(
            format!("t-{n}"),
            "c1",
            TaskStatus::working(),
            false,
        ))
    }

    fn sentinel() -> StreamEvent {
        StreamEvent::EndOfStream {
            task_id: "t".into(),
            context_id: "c1".into(),
        }
    }

    #[tokio::test]
    async fn test_consume_stops_at_sentinel_and_unregisters() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let consumer = manager
            .create_consumer("t", Arc::clone(&queue), CancellationToken::new())
            .unwrap();

        queue.enqueue(status_event(1));
        queue.enqueue(status_event(2));
        queue.enqueue(sentinel());

        let events: Vec<_> = consumer.consume().collect().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| !e.is_end_of_stream()));
        assert!(manager.get("t").is_none());
        assert!(!consumer.is_active());
    }

    #[tokio::test]
    async fn test_consume_twice_is_noop() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let consumer = manager
            .create_consumer("t", Arc::clone(&queue), CancellationToken::new())
            .unwrap();

        queue.enqueue(sentinel());
        let _first = consumer.consume();
        let second: Vec<_> = consumer.consume().collect().await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_tappers_are_live_only() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let consumer = manager
            .create_consumer("t", Arc::clone(&queue), CancellationToken::new())
            .unwrap();

        let mut early_a = consumer.tap();
        let mut early_b = consumer.tap();
        let mut primary = consumer.consume();

        queue.enqueue(status_event(1));
        let first = primary.next().await.unwrap();
        assert_eq!(first.task_id(), "t-1");

        // Both pre-registered tappers see the event exactly once.
        assert_eq!(early_a.next().await.unwrap().task_id(), "t-1");
        assert_eq!(early_b.next().await.unwrap().task_id(), "t-1");

        // A tapper registered after t-1 was processed sees only later events.
        let mut late = consumer.tap();
        queue.enqueue(status_event(2));
        queue.enqueue(sentinel());
        assert_eq!(primary.next().await.unwrap().task_id(), "t-2");
        assert!(primary.next().await.is_none());

        assert_eq!(late.next().await.unwrap().task_id(), "t-2");
        assert!(late.next().await.is_none());
        assert_eq!(early_a.next().await.unwrap().task_id(), "t-2");
        assert!(early_a.next().await.is_none());
    }

    #[tokio::test]
    async fn test_abort_terminates_consumer_and_tappers() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let cancel = CancellationToken::new();
        let consumer = manager
            .create_consumer("t", Arc::clone(&queue), cancel.clone())
            .unwrap();

        let mut tapper = consumer.tap();
        let primary = consumer.consume();
        let drain = tokio::spawn(primary.collect::<Vec<_>>());

        cancel.cancel();
        let events = drain.await.unwrap();
        assert!(events.is_empty());
        assert!(tapper.next().await.is_none());
        assert!(manager.get("t").is_none());
    }

    #[tokio::test]
    async fn test_dropping_primary_finishes_consumer() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let consumer = manager
            .create_consumer("t", Arc::clone(&queue), CancellationToken::new())
            .unwrap();

        let mut tapper = consumer.tap();
        let mut primary = consumer.consume();
        queue.enqueue(status_event(1));
        primary.next().await.unwrap();
        drop(primary);

        assert_eq!(tapper.next().await.unwrap().task_id(), "t-1");
        assert!(tapper.next().await.is_none());
        assert!(manager.get("t").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_consumer_creation_fails() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        manager
            .create_consumer("t", Arc::clone(&queue), CancellationToken::new())
            .unwrap();
        assert!(manager
            .create_consumer("t", queue, CancellationToken::new())
            .is_err());
    }

    #[tokio::test]
    async fn test_tap_or_consume_consumes_then_taps() {
        let manager = StreamManager::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());

        let mut primary = manager.tap_or_consume("t", Arc::clone(&queue), CancellationToken::new());
        assert!(manager.get("t").is_some());

        let mut tapper = manager.tap_or_consume("t", Arc::clone(&queue), CancellationToken::new());

        queue.enqueue(status_event(1));
        queue.enqueue(sentinel());
        assert_eq!(primary.next().await.unwrap().task_id(), "t-1");
        assert!(primary.next().await.is_none());
        assert_eq!(tapper.next().await.unwrap().task_id(), "t-1");
        assert!(tapper.next().await.is_none());
    }
}
