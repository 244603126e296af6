//! Per-request execution context handed to the agent executor.
//!
//! The context owns the inbound request, the resolved current task and any
//! referenced tasks, and the producer operations the agent uses to answer:
//! direct messages, terminal/pending task results, or a live event stream.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{A2AError, Result};
use crate::types::{
    Artifact, Message, MessageSendParams, Role, Task, TaskState, TaskStatus,
};

use super::events::{EventQueue, InMemoryEventQueue};
use super::stream::TaskStream;

/// The inbound request as seen by the agent: typed params plus an opaque
/// extension map the runtime never interprets.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// The `message/send` / `message/stream` parameters.
    pub params: MessageSendParams,
    /// Opaque per-request extension data (keyed by extension URI).
    pub extensions: HashMap<String, serde_json::Value>,
}

impl AgentRequest {
    /// Creates a request with no extensions.
    pub fn new(params: MessageSendParams) -> Self {
        Self {
            params,
            extensions: HashMap::new(),
        }
    }

    /// Returns the inbound message.
    pub fn message(&self) -> &Message {
        &self.params.message
    }
}

/// Mutation payload for the context's task-producing operations.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// An agent message that becomes the new `status.message`.
    pub message: Option<Message>,
    /// Artifacts to append to the task (order preserved).
    pub artifacts: Vec<Artifact>,
    /// Metadata entries to merge into the task.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TaskUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an update carrying a single agent text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_message(Message::agent_text(text))
    }

    /// Sets the status message.
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    /// Appends an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Sets metadata to merge into the task.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of [`ExecutionContext::stream`]: the initial task snapshot and the
/// event queue the spawned producer writes into.
pub struct StreamHandle {
    /// The task as of stream creation (`submitted` or `working`).
    pub task: Task,
    /// The queue carrying the producer's events.
    pub queue: Arc<dyn EventQueue>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

/// Per-request handle owning the current task, request parameters, and
/// referenced tasks; one per incoming `message/send` or `message/stream`.
pub struct ExecutionContext {
    request: AgentRequest,
    context_id: String,
    reference_tasks: Vec<Task>,
    current_task: Mutex<Option<Task>>,
    inbound_recorded: AtomicBool,
    stream_started: AtomicBool,
}

impl ExecutionContext {
    /// Creates a context, deriving the context id by the resolution rule
    /// `task.context_id ?? message.context_id ?? supplied ?? generated`.
    pub fn new(
        request: AgentRequest,
        current_task: Option<Task>,
        reference_tasks: Vec<Task>,
        supplied_context_id: Option<String>,
    ) -> Arc<Self> {
        let context_id = current_task
            .as_ref()
            .map(|t| t.context_id.clone())
            .or_else(|| request.params.message.context_id.clone())
            .or(supplied_context_id)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        debug!(context_id = %context_id, has_task = current_task.is_some(), "Execution context built");
        Arc::new(Self {
            request,
            context_id,
            reference_tasks,
            current_task: Mutex::new(current_task),
            inbound_recorded: AtomicBool::new(false),
            stream_started: AtomicBool::new(false),
        })
    }

    /// Returns the inbound request.
    pub fn request(&self) -> &AgentRequest {
        &self.request
    }

    /// Returns the stable context id for this request.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Returns the tasks resolved from `reference_task_ids`
    /// (missing ids were silently elided).
    pub fn reference_tasks(&self) -> &[Task] {
        &self.reference_tasks
    }

    /// Returns a snapshot of the current task, if any.
    pub fn current_task(&self) -> Option<Task> {
        self.current_task
            .lock()
            .expect("context lock poisoned")
            .clone()
    }

    /// Materializes an agent message inheriting this context's id and, when
    /// a current task exists, its task id.
    pub fn message(&self, mut message: Message) -> Message {
        if message.message_id.is_empty() {
            message.message_id = uuid::Uuid::new_v4().to_string();
        }
        message.role = Role::Agent;
        message.context_id = Some(self.context_id.clone());
        message.task_id = self.current_task().map(|t| t.id);
        message
    }

    /// Sets or refreshes the current task to `completed`.
    pub fn complete(&self, update: TaskUpdate) -> Task {
        self.set_or_update(update, TaskState::Completed)
    }

    /// Sets or refreshes the current task to `rejected`.
    pub fn reject(&self, update: TaskUpdate) -> Task {
        self.set_or_update(update, TaskState::Rejected)
    }

    /// Sets or refreshes the current task to `auth-required`.
    pub fn auth_required(&self, update: TaskUpdate) -> Task {
        self.set_or_update(update, TaskState::AuthRequired)
    }

    /// Sets or refreshes the current task to `input-required`.
    pub fn input_required(&self, update: TaskUpdate) -> Task {
        self.set_or_update(update, TaskState::InputRequired)
    }

    /// Starts a streaming producer.
    ///
    /// Sets the current task to `submitted` (or `working` when requested),
    /// creates the task's event queue, spawns the producer callback without
    /// awaiting it, and returns immediately with the initial task snapshot.
    ///
    /// At most one stream may be created per context; a second call is a
    /// programming error and fails synchronously.
    pub fn stream<F, Fut>(
        self: &Arc<Self>,
        initial_state: Option<TaskState>,
        producer: F,
    ) -> Result<StreamHandle>
    where
        F: FnOnce(TaskStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = initial_state.unwrap_or(TaskState::Submitted);
        if !state.is_active() {
            return Err(A2AError::InvalidConfig(format!(
                "Stream initial state must be submitted or working, got {state:?}"
            )));
        }
        if self.stream_started.swap(true, Ordering::AcqRel) {
            return Err(A2AError::Stream(
                "A task stream was already created for this context".into(),
            ));
        }

        let task = self.set_or_update(TaskUpdate::new(), state);
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let task_stream = TaskStream::new(Arc::clone(self), Arc::clone(&queue));

        debug!(task_id = %task.id, "Spawning stream producer");
        tokio::spawn(producer(task_stream));

        Ok(StreamHandle { task, queue })
    }

    /// Sets or refreshes the current task.
    ///
    /// Creates the task on first use (inheriting this context's id and
    /// recording the inbound message in its history). Artifacts are merged by
    /// concatenation; the status is replaced whole with a fresh timestamp; an
    /// update message is materialized with the task's ids and becomes
    /// `status.message`.
    pub(crate) fn set_or_update(&self, update: TaskUpdate, state: TaskState) -> Task {
        let mut guard = self.current_task.lock().expect("context lock poisoned");
        let task = guard.get_or_insert_with(|| {
            Task::new(uuid::Uuid::new_v4().to_string(), self.context_id.clone())
        });

        if !self.inbound_recorded.swap(true, Ordering::AcqRel) {
            let mut inbound = self.request.params.message.clone();
            inbound.task_id = Some(task.id.clone());
            inbound.context_id = Some(self.context_id.clone());
            task.add_message(inbound);
        }

        let status = match update.message {
            Some(mut message) => {
                if message.message_id.is_empty() {
                    message.message_id = uuid::Uuid::new_v4().to_string();
                }
                message.role = Role::Agent;
                message.task_id = Some(task.id.clone());
                message.context_id = Some(self.context_id.clone());
                task.add_message(message.clone());
                TaskStatus::with_message(state, message)
            }
            None => TaskStatus::new(state),
        };
        task.status = status;

        for artifact in update.artifacts {
            task.add_artifact(artifact);
        }
        if let Some(metadata) = update.metadata {
            task.metadata.get_or_insert_with(HashMap::new).extend(metadata);
        }

        task.clone()
    }

    /// Folds an artifact-update event into the current task.
    pub(crate) fn fold_artifact_update(&self, event: &crate::types::TaskArtifactUpdateEvent) {
        let mut guard = self.current_task.lock().expect("context lock poisoned");
        if let Some(task) = guard.as_mut() {
            task.apply_artifact_update(event);
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("context_id", &self.context_id)
            .field("reference_tasks", &self.reference_tasks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Part;

    fn context_for(message: Message) -> Arc<ExecutionContext> {
        let request = AgentRequest::new(MessageSendParams::new(message));
        ExecutionContext::new(request, None, vec![], None)
    }

    #[test]
    fn test_context_id_resolution_order() {
        // From the stored task, over the message's context id
        let task = Task::new("t1", "ctx-task");
        let msg = Message::user_text("hi").with_context_id("ctx-msg");
        let ctx = ExecutionContext::new(
            AgentRequest::new(MessageSendParams::new(msg)),
            Some(task),
            vec![],
            Some("ctx-supplied".into()),
        );
        assert_eq!(ctx.context_id(), "ctx-task");

        // From the message when no task
        let msg = Message::user_text("hi").with_context_id("ctx-msg");
        let ctx = ExecutionContext::new(
            AgentRequest::new(MessageSendParams::new(msg)),
            None,
            vec![],
            Some("ctx-supplied".into()),
        );
        assert_eq!(ctx.context_id(), "ctx-msg");

        // Supplied id next
        let ctx = ExecutionContext::new(
            AgentRequest::new(MessageSendParams::new(Message::user_text("hi"))),
            None,
            vec![],
            Some("ctx-supplied".into()),
        );
        assert_eq!(ctx.context_id(), "ctx-supplied");

        // Generated as a last resort
        let ctx = context_for(Message::user_text("hi"));
        assert!(!ctx.context_id().is_empty());
    }

    #[test]
    fn test_message_inherits_context_and_task_ids() {
        let ctx = context_for(Message::user_text("hi"));

        // No current task: task id stays empty
        let msg = ctx.message(Message::agent(vec![Part::text("a")]));
        assert_eq!(msg.context_id.as_deref(), Some(ctx.context_id()));
        assert!(msg.task_id.is_none());
        assert_eq!(msg.role, Role::Agent);

        // With a current task the id is inherited
        let task = ctx.complete(TaskUpdate::new());
        let msg = ctx.message(Message::agent(vec![Part::text("b")]));
        assert_eq!(msg.task_id.as_deref(), Some(task.id.as_str()));
    }

    #[test]
    fn test_complete_creates_task_with_status_message() {
        let ctx = context_for(Message::user_text("echo?"));
        let task = ctx.input_required(TaskUpdate::text("how many?"));

        assert_eq!(task.state(), TaskState::InputRequired);
        assert_eq!(task.context_id, ctx.context_id());
        let status_msg = task.status.message.as_ref().unwrap();
        assert_eq!(status_msg.text_content(), Some("how many?".to_string()));
        assert_eq!(status_msg.task_id.as_deref(), Some(task.id.as_str()));
        // History holds the inbound message and the status message
        assert_eq!(task.history.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_artifact_merge_is_concatenation() {
        let ctx = context_for(Message::user_text("hi"));
        let t1 = ctx.set_or_update(
            TaskUpdate::new()
                .with_artifact(Artifact::text("a1", "one"))
                .with_artifact(Artifact::text("a2", "two")),
            TaskState::Working,
        );
        assert_eq!(t1.artifacts.as_ref().unwrap().len(), 2);

        let t2 = ctx.set_or_update(
            TaskUpdate::new().with_artifact(Artifact::text("a1", "dup")),
            TaskState::Completed,
        );
        // Unconditional concatenation: a repeated artifact id duplicates
        let ids: Vec<&str> = t2
            .artifacts
            .as_ref()
            .unwrap()
            .iter()
            .map(|a| a.artifact_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "a2", "a1"]);
    }

    #[test]
    fn test_status_replaced_whole() {
        let ctx = context_for(Message::user_text("hi"));
        let t1 = ctx.set_or_update(TaskUpdate::text("working on it"), TaskState::Working);
        assert!(t1.status.message.is_some());

        let t2 = ctx.complete(TaskUpdate::new());
        assert_eq!(t2.state(), TaskState::Completed);
        // No stale message carried over
        assert!(t2.status.message.is_none());
    }

    #[tokio::test]
    async fn test_stream_twice_is_an_error() {
        let ctx = context_for(Message::user_text("hi"));
        let first = ctx.stream(None, |_stream| async {});
        assert!(first.is_ok());

        let second = ctx.stream(None, |_stream| async {});
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_stream_rejects_non_active_initial_state() {
        let ctx = context_for(Message::user_text("hi"));
        let result = ctx.stream(Some(TaskState::Completed), |_stream| async {});
        assert!(result.is_err());
        // The guard did not burn the context's one stream slot
        assert!(ctx.stream(Some(TaskState::Working), |_stream| async {}).is_ok());
    }
}
