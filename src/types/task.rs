//! Task types for the A2A protocol.
//!
//! Tasks represent stateful operations or conversations between clients and
//! agents, identified by `id` and correlated through `context_id`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize, Serializer};

use super::{Message, Part};

/// Helper for serde: skip serializing boolean fields when false.
#[must_use]
pub fn is_false(v: &bool) -> bool {
    !v
}

/// Defines the lifecycle states of a Task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Task has been submitted but not yet started.
    #[default]
    Submitted,
    /// Task is currently being processed.
    Working,
    /// Task requires additional input from the user.
    InputRequired,
    /// Task requires authentication.
    AuthRequired,
    /// Task has completed successfully.
    Completed,
    /// Task was canceled.
    Canceled,
    /// Task failed due to an error.
    Failed,
    /// Task was rejected by the agent.
    Rejected,
    /// Task state is unknown.
    Unknown,
}

impl TaskState {
    /// Returns true if this state is terminal (absorbing, no further transitions).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Failed | Self::Rejected
        )
    }

    /// Returns true if this is a pending state: the stream closes and the
    /// task may only be resumed by a fresh request referencing its id.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::InputRequired | Self::AuthRequired)
    }

    /// Returns true if this state is active (submitted or working).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::Working)
    }

    /// Returns true if a producer reaching this state must close its stream.
    #[must_use]
    pub const fn closes_stream(&self) -> bool {
        self.is_terminal() || self.is_pending()
    }
}

/// Represents the status of a task at a specific point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    /// The current state of the task's lifecycle.
    pub state: TaskState,
    /// An optional message providing more details about the current status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// An ISO 8601 datetime string indicating when this status was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    /// Creates a new task status with the given state, stamped "now".
    #[must_use]
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Creates a new task status with a status message.
    #[must_use]
    pub fn with_message(state: TaskState, message: Message) -> Self {
        Self {
            state,
            message: Some(message),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Creates a submitted status.
    #[must_use]
    pub fn submitted() -> Self {
        Self::new(TaskState::Submitted)
    }

    /// Creates a working status.
    #[must_use]
    pub fn working() -> Self {
        Self::new(TaskState::Working)
    }

    /// Creates a failed status with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::with_message(TaskState::Failed, Message::agent(vec![Part::text(error)]))
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::submitted()
    }
}

/// A single, stateful operation or conversation between a client and an agent.
///
/// The `kind` field is injected during JSON serialization as `"task"`; it is
/// not stored on the struct and is ignored on input.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// A unique identifier for the task.
    pub id: String,
    /// A unique identifier for maintaining context across related tasks.
    pub context_id: String,
    /// The current status of the task.
    pub status: TaskStatus,
    /// Messages exchanged during the task, in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Message>>,
    /// Artifacts generated during the task, in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Ignored during deserialization; injected as `"task"` on serialization.
    #[serde(default, skip_serializing)]
    #[allow(dead_code)]
    kind: Option<String>,
}

impl Serialize for Task {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct TaskWithKind<'a> {
            kind: &'static str,
            id: &'a str,
            context_id: &'a str,
            status: &'a TaskStatus,
            #[serde(skip_serializing_if = "Option::is_none")]
            history: &'a Option<Vec<Message>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            artifacts: &'a Option<Vec<Artifact>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            metadata: &'a Option<HashMap<String, serde_json::Value>>,
        }
        TaskWithKind {
            kind: "task",
            id: &self.id,
            context_id: &self.context_id,
            status: &self.status,
            history: &self.history,
            artifacts: &self.artifacts,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

impl Task {
    /// Creates a new task with the given ID and context ID.
    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::submitted(),
            history: None,
            artifacts: None,
            metadata: None,
            kind: None,
        }
    }

    /// Sets the status of this task.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns the current state of the task.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.status.state
    }

    /// Returns true if the task is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Adds a message to the task's history.
    pub fn add_message(&mut self, message: Message) {
        self.history.get_or_insert_with(Vec::new).push(message);
    }

    /// Appends an artifact to the task.
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.get_or_insert_with(Vec::new).push(artifact);
    }

    /// Applies an artifact update event to the task.
    ///
    /// When `append` is set and the artifact id already exists, the incoming
    /// parts are appended to the existing artifact; otherwise the artifact is
    /// replaced in place or inserted.
    pub fn apply_artifact_update(&mut self, event: &TaskArtifactUpdateEvent) {
        let artifacts = self.artifacts.get_or_insert_with(Vec::new);
        let artifact_id = &event.artifact.artifact_id;
        let existing_idx = artifacts.iter().position(|a| &a.artifact_id == artifact_id);

        if event.append {
            if let Some(idx) = existing_idx {
                artifacts[idx].parts.extend(event.artifact.parts.clone());
            } else {
                artifacts.push(event.artifact.clone());
            }
        } else if let Some(idx) = existing_idx {
            artifacts[idx] = event.artifact.clone();
        } else {
            artifacts.push(event.artifact.clone());
        }
    }

    /// Truncates history to the last `len` messages.
    ///
    /// `None`, or a history already within the limit, is a no-op. A limit of
    /// zero drops the history entirely.
    pub fn truncate_history(&mut self, len: Option<usize>) {
        match (len, self.history.as_mut()) {
            (Some(0), _) => self.history = None,
            (Some(max), Some(history)) if history.len() > max => {
                let start = history.len() - max;
                *history = history.split_off(start);
            }
            _ => {}
        }
    }

    /// Creates a [`TaskStatusUpdateEvent`] from the current task status.
    #[must_use]
    pub fn status_update_event(&self, is_final: bool) -> TaskStatusUpdateEvent {
        TaskStatusUpdateEvent::new(&self.id, &self.context_id, self.status.clone(), is_final)
    }
}

/// A file, data structure, or other resource generated by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// A unique identifier for the artifact within the task.
    pub artifact_id: String,
    /// An array of content parts that make up the artifact.
    pub parts: Vec<Part>,
    /// An optional name for the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// An optional description of the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Artifact {
    /// Creates a new artifact with the given ID and parts.
    pub fn new(artifact_id: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            parts,
            name: None,
            description: None,
            metadata: None,
        }
    }

    /// Creates a text artifact with the given content.
    pub fn text(artifact_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(artifact_id, vec![Part::text(text)])
    }
}

/// An event notifying the client of a task status change.
///
/// The `kind` field is injected as `"status-update"` during serialization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    /// The ID of the task that was updated.
    pub task_id: String,
    /// The context ID associated with the task.
    pub context_id: String,
    /// The new status of the task.
    pub status: TaskStatus,
    /// If true, this is the final event in the stream for this task.
    pub r#final: bool,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Ignored during deserialization; injected as `"status-update"` on serialization.
    #[serde(default, skip_serializing)]
    #[allow(dead_code)]
    kind: Option<String>,
}

impl Serialize for TaskStatusUpdateEvent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Helper<'a> {
            kind: &'static str,
            task_id: &'a str,
            context_id: &'a str,
            status: &'a TaskStatus,
            r#final: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            metadata: &'a Option<HashMap<String, serde_json::Value>>,
        }
        Helper {
            kind: "status-update",
            task_id: &self.task_id,
            context_id: &self.context_id,
            status: &self.status,
            r#final: self.r#final,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

impl TaskStatusUpdateEvent {
    /// Creates a new status update event.
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        status: TaskStatus,
        r#final: bool,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status,
            r#final,
            metadata: None,
            kind: None,
        }
    }
}

/// An event notifying the client of an artifact update.
///
/// The `kind` field is injected as `"artifact-update"` during serialization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    /// The ID of the task this artifact belongs to.
    pub task_id: String,
    /// The context ID associated with the task.
    pub context_id: String,
    /// The artifact that was generated or updated.
    pub artifact: Artifact,
    /// If true, the parts should be appended to a previous artifact.
    #[serde(default)]
    pub append: bool,
    /// If true, this is the final chunk of the artifact.
    #[serde(default)]
    pub last_chunk: bool,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Ignored during deserialization; injected as `"artifact-update"` on serialization.
    #[serde(default, skip_serializing)]
    #[allow(dead_code)]
    kind: Option<String>,
}

impl Serialize for TaskArtifactUpdateEvent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Helper<'a> {
            kind: &'static str,
            task_id: &'a str,
            context_id: &'a str,
            artifact: &'a Artifact,
            #[serde(skip_serializing_if = "crate::types::task::is_false")]
            append: bool,
            #[serde(skip_serializing_if = "crate::types::task::is_false")]
            last_chunk: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            metadata: &'a Option<HashMap<String, serde_json::Value>>,
        }
        Helper {
            kind: "artifact-update",
            task_id: &self.task_id,
            context_id: &self.context_id,
            artifact: &self.artifact,
            append: self.append,
            last_chunk: self.last_chunk,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

impl TaskArtifactUpdateEvent {
    /// Creates a new artifact update event.
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        artifact: Artifact,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            artifact,
            append: false,
            last_chunk: false,
            metadata: None,
            kind: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_subsets() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Rejected.is_terminal());
        assert!(TaskState::InputRequired.is_pending());
        assert!(TaskState::AuthRequired.is_pending());
        assert!(TaskState::Working.is_active());
        assert!(!TaskState::Working.closes_stream());
        assert!(TaskState::InputRequired.closes_stream());
        assert!(TaskState::Canceled.closes_stream());
    }

    #[test]
    fn test_task_kind_roundtrip() {
        let task = Task::new("t1", "c1");
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"kind\":\"task\""));

        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "t1");

        let no_kind = r#"{"id":"t2","contextId":"c2","status":{"state":"submitted"}}"#;
        let parsed2: Task = serde_json::from_str(no_kind).unwrap();
        assert_eq!(parsed2.id, "t2");
    }

    #[test]
    fn test_apply_artifact_update_replace_and_append() {
        let mut task = Task::new("t1", "c1");
        let a1 = Artifact::text("a1", "one");
        task.apply_artifact_update(&TaskArtifactUpdateEvent::new("t1", "c1", a1));
        assert_eq!(task.artifacts.as_ref().unwrap().len(), 1);

        // Replace in place
        let a1b = Artifact::text("a1", "two");
        task.apply_artifact_update(&TaskArtifactUpdateEvent::new("t1", "c1", a1b));
        let arts = task.artifacts.as_ref().unwrap();
        assert_eq!(arts.len(), 1);
        assert_eq!(arts[0].parts[0].as_text(), Some("two"));

        // Append parts
        let mut ev = TaskArtifactUpdateEvent::new("t1", "c1", Artifact::text("a1", "three"));
        ev.append = true;
        task.apply_artifact_update(&ev);
        let arts = task.artifacts.as_ref().unwrap();
        assert_eq!(arts[0].parts.len(), 2);
    }

    #[test]
    fn test_truncate_history() {
        let mut task = Task::new("t1", "c1");
        for i in 0..5 {
            task.add_message(Message::user_text(format!("m{i}")));
        }
        task.truncate_history(Some(2));
        let history = task.history.as_ref().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text_content(), Some("m3".to_string()));

        task.truncate_history(Some(0));
        assert!(task.history.is_none());
    }

    #[test]
    fn test_event_kind_injection() {
        let ev = TaskStatusUpdateEvent::new("t1", "c1", TaskStatus::working(), false);
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"kind\":\"status-update\""));

        let ev = TaskArtifactUpdateEvent::new("t1", "c1", Artifact::text("a1", "x"));
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"kind\":\"artifact-update\""));
        // false booleans are omitted from the wire form
        assert!(!json.contains("append"));
    }
}
