//! Producer-side stream handle for agents.
//!
//! A [`TaskStream`] is handed to the callback passed to
//! [`ExecutionContext::stream`](super::ExecutionContext::stream). It enforces
//! the task state machine while emitting status and artifact events, and
//! closes itself with an end-of-stream sentinel on the first terminal or
//! pending transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{A2AError, Result};
use crate::types::{Artifact, Task, TaskArtifactUpdateEvent, TaskState, TaskStatusUpdateEvent};

use super::context::{ExecutionContext, TaskUpdate};
use super::events::{EventQueue, StreamEvent};

/// Payload for [`TaskStream::write_artifact`].
#[derive(Debug, Clone)]
pub struct ArtifactUpdate {
    /// The artifact produced or extended.
    pub artifact: Artifact,
    /// If true, parts are appended to the artifact with the same id.
    pub append: bool,
    /// If true, this is the final chunk of the artifact.
    pub last_chunk: bool,
    /// Optional event metadata.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ArtifactUpdate {
    /// Creates a whole-artifact update (no append, not a last chunk).
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            append: false,
            last_chunk: false,
            metadata: None,
        }
    }

    /// Marks the update as appending to an existing artifact.
    #[must_use]
    pub fn append(mut self) -> Self {
        self.append = true;
        self
    }

    /// Marks the update as the artifact's last chunk.
    #[must_use]
    pub fn last_chunk(mut self) -> Self {
        self.last_chunk = true;
        self
    }
}

/// The producer-side handle an agent uses inside a `stream(...)` callback.
pub struct TaskStream {
    context: Arc<ExecutionContext>,
    queue: Arc<dyn EventQueue>,
    closed: AtomicBool,
}

impl TaskStream {
    pub(crate) fn new(context: Arc<ExecutionContext>, queue: Arc<dyn EventQueue>) -> Self {
        Self {
            context,
            queue,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the execution context this stream produces for.
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Returns true if the stream has terminated.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(A2AError::Stream("Task stream already terminated".into()));
        }
        Ok(())
    }

    fn emit_status(&self, task: &Task, is_final: bool) {
        self.queue
            .enqueue(StreamEvent::StatusUpdate(TaskStatusUpdateEvent::new(
                &task.id,
                &task.context_id,
                task.status.clone(),
                is_final,
            )));
    }

    /// Transitions the task to `working` if it is not already, emitting a
    /// status update for the transition.
    pub fn start(&self, update: TaskUpdate) -> Result<()> {
        self.ensure_open()?;
        let current = self
            .context
            .current_task()
            .ok_or_else(|| A2AError::Internal("Task stream has no current task".into()))?;
        if current.state() != TaskState::Working {
            let task = self.context.set_or_update(update, TaskState::Working);
            self.emit_status(&task, false);
        }
        Ok(())
    }

    /// Emits an artifact update, transitioning to `working` first if needed.
    ///
    /// The implicit transition emits its own status update unless
    /// `send_status` is false. Exactly one artifact-update event is emitted.
    pub fn write_artifact(&self, update: ArtifactUpdate, send_status: bool) -> Result<()> {
        self.ensure_open()?;
        let current = self
            .context
            .current_task()
            .ok_or_else(|| A2AError::Internal("Task stream has no current task".into()))?;

        let task = if current.state() != TaskState::Working {
            let task = self.context.set_or_update(TaskUpdate::new(), TaskState::Working);
            if send_status {
                self.emit_status(&task, false);
            }
            task
        } else {
            current
        };

        let mut event = TaskArtifactUpdateEvent::new(&task.id, &task.context_id, update.artifact);
        event.append = update.append;
        event.last_chunk = update.last_chunk;
        event.metadata = update.metadata;

        self.context.fold_artifact_update(&event);
        self.queue.enqueue(StreamEvent::ArtifactUpdate(event));
        Ok(())
    }

    /// Transitions the task to `completed` and terminates the stream.
    pub fn complete(&self, update: TaskUpdate) -> Result<Task> {
        self.transition(update, TaskState::Completed)
    }

    /// Transitions the task to `rejected` and terminates the stream.
    pub fn reject(&self, update: TaskUpdate) -> Result<Task> {
        self.transition(update, TaskState::Rejected)
    }

    /// Transitions the task to `failed` and terminates the stream.
    pub fn fail(&self, update: TaskUpdate) -> Result<Task> {
        self.transition(update, TaskState::Failed)
    }

    /// Transitions the task to `auth-required` and terminates the stream.
    pub fn auth_required(&self, update: TaskUpdate) -> Result<Task> {
        self.transition(update, TaskState::AuthRequired)
    }

    /// Transitions the task to `input-required` and terminates the stream.
    pub fn input_required(&self, update: TaskUpdate) -> Result<Task> {
        self.transition(update, TaskState::InputRequired)
    }

    fn transition(&self, update: TaskUpdate, state: TaskState) -> Result<Task> {
        self.ensure_open()?;
        let task = self.context.set_or_update(update, state);
        self.emit_status(&task, state.is_terminal());

        if state.closes_stream() {
            self.closed.store(true, Ordering::Release);
            debug!(task_id = %task.id, state = ?state, "Task stream terminated");
            self.queue.enqueue(StreamEvent::EndOfStream {
                task_id: task.id.clone(),
                context_id: task.context_id.clone(),
            });
            self.queue.close();
        }
        Ok(task)
    }
}

impl std::fmt::Debug for TaskStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStream")
            .field("context_id", &self.context.context_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::context::AgentRequest;
    use crate::server::events::InMemoryEventQueue;
    use crate::types::{Message, MessageSendParams};

    fn stream_fixture() -> (TaskStream, Arc<dyn EventQueue>) {
        let ctx = ExecutionContext::new(
            AgentRequest::new(MessageSendParams::new(Message::user_text("go"))),
            None,
            vec![],
            None,
        );
        ctx.set_or_update(TaskUpdate::new(), TaskState::Submitted);
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        (TaskStream::new(ctx, Arc::clone(&queue)), queue)
    }

    async fn drain(queue: &Arc<dyn EventQueue>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while !queue.is_empty() {
            events.push(queue.dequeue().await.unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_write_artifact_emits_status_once() {
        let (stream, queue) = stream_fixture();

        stream
            .write_artifact(ArtifactUpdate::new(Artifact::text("a1", "one")), true)
            .unwrap();
        stream
            .write_artifact(ArtifactUpdate::new(Artifact::text("a2", "two")), true)
            .unwrap();

        let events = drain(&queue).await;
        // working status first (task was submitted), then two artifact updates
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::StatusUpdate(e) if e.status.state == TaskState::Working));
        assert!(matches!(&events[1], StreamEvent::ArtifactUpdate(_)));
        assert!(matches!(&events[2], StreamEvent::ArtifactUpdate(_)));
    }

    #[tokio::test]
    async fn test_write_artifact_without_status() {
        let (stream, queue) = stream_fixture();
        stream
            .write_artifact(ArtifactUpdate::new(Artifact::text("a1", "one")), false)
            .unwrap();

        let events = drain(&queue).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::ArtifactUpdate(_)));
        // The task still moved to working
        assert_eq!(
            stream.context().current_task().unwrap().state(),
            TaskState::Working
        );
    }

    #[tokio::test]
    async fn test_complete_is_final_and_terminates() {
        let (stream, queue) = stream_fixture();
        let task = stream.complete(TaskUpdate::new()).unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert!(stream.is_closed());

        let events = drain(&queue).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::StatusUpdate(e) if e.r#final));
        assert!(events[1].is_end_of_stream());

        // Second terminal call fails
        let err = stream.complete(TaskUpdate::new()).unwrap_err();
        assert!(err.to_string().contains("already terminated"));
    }

    #[tokio::test]
    async fn test_pending_closes_without_final_flag() {
        let (stream, queue) = stream_fixture();
        stream.input_required(TaskUpdate::text("more?")).unwrap();
        assert!(stream.is_closed());

        let events = drain(&queue).await;
        assert!(matches!(&events[0], StreamEvent::StatusUpdate(e)
            if e.status.state == TaskState::InputRequired && !e.r#final));
        assert!(events[1].is_end_of_stream());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_on_working() {
        let (stream, queue) = stream_fixture();
        stream.start(TaskUpdate::new()).unwrap();
        stream.start(TaskUpdate::new()).unwrap();

        let events = drain(&queue).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_after_terminal_fail() {
        let (stream, _queue) = stream_fixture();
        stream.complete(TaskUpdate::new()).unwrap();
        assert!(stream
            .write_artifact(ArtifactUpdate::new(Artifact::text("a", "x")), true)
            .is_err());
        assert!(stream.start(TaskUpdate::new()).is_err());
    }
}
