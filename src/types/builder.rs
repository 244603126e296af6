//! Fluent builders for tasks, messages, and artifacts.
//!
//! Builders are pure: they perform no I/O and validate shape only when the
//! finished value is extracted with `build()`, never on intermediate calls.

use std::collections::HashMap;

use crate::error::{A2AError, Result};

use super::{Artifact, Message, Part, Role, Task, TaskState, TaskStatus};

/// Builder for [`Task`] values.
///
/// `build()` fails if no context id was supplied; a task id is generated when
/// absent.
#[derive(Debug, Default)]
pub struct TaskBuilder {
    id: Option<String>,
    context_id: Option<String>,
    status: Option<TaskStatus>,
    history: Vec<Message>,
    artifacts: Vec<Artifact>,
    metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TaskBuilder {
    /// Creates a new empty task builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the task id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the context id.
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Sets the task status.
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the task state, stamping the status "now".
    pub fn state(self, state: TaskState) -> Self {
        self.status(TaskStatus::new(state))
    }

    /// Appends a message to the task history.
    pub fn message(mut self, message: Message) -> Self {
        self.history.push(message);
        self
    }

    /// Appends an artifact.
    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Sets the task metadata.
    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Materializes the task.
    ///
    /// Fails if no context id was supplied.
    pub fn build(self) -> Result<Task> {
        let context_id = self
            .context_id
            .filter(|c| !c.is_empty())
            .ok_or_else(|| A2AError::InvalidConfig("Task requires a non-empty context id".into()))?;
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut task = Task::new(id, context_id);
        if let Some(status) = self.status {
            task.status = status;
        }
        for message in self.history {
            task.add_message(message);
        }
        for artifact in self.artifacts {
            task.add_artifact(artifact);
        }
        task.metadata = self.metadata;
        Ok(task)
    }
}

/// Builder for [`Message`] values.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    message_id: Option<String>,
    role: Option<Role>,
    parts: Vec<Part>,
    task_id: Option<String>,
    context_id: Option<String>,
    reference_task_ids: Option<Vec<String>>,
    metadata: Option<HashMap<String, serde_json::Value>>,
}

impl MessageBuilder {
    /// Creates a new empty message builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message id.
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the sender role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Appends a content part.
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Appends a text part.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.part(Part::text(text))
    }

    /// Sets the task id.
    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Sets the context id.
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Sets the referenced task ids.
    pub fn reference_task_ids(mut self, ids: Vec<String>) -> Self {
        self.reference_task_ids = Some(ids);
        self
    }

    /// Sets the message metadata.
    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Materializes the message. A message id is generated when absent.
    pub fn build(self) -> Message {
        let mut message = Message::new(
            self.message_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            self.role.unwrap_or_default(),
            self.parts,
        );
        message.task_id = self.task_id;
        message.context_id = self.context_id;
        message.reference_task_ids = self.reference_task_ids;
        message.metadata = self.metadata;
        message
    }
}

/// Builder for [`Artifact`] values.
///
/// An artifact id is auto-assigned when omitted.
#[derive(Debug, Default)]
pub struct ArtifactBuilder {
    artifact_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    parts: Vec<Part>,
    metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ArtifactBuilder {
    /// Creates a new empty artifact builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the artifact id.
    pub fn artifact_id(mut self, id: impl Into<String>) -> Self {
        self.artifact_id = Some(id.into());
        self
    }

    /// Sets the artifact name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the artifact description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a content part.
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Appends a text part.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.part(Part::text(text))
    }

    /// Sets the artifact metadata.
    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Materializes the artifact.
    pub fn build(self) -> Artifact {
        let mut artifact = Artifact::new(
            self.artifact_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            self.parts,
        );
        artifact.name = self.name;
        artifact.description = self.description;
        artifact.metadata = self.metadata;
        artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder_requires_context_id() {
        let err = TaskBuilder::new().id("t1").build();
        assert!(err.is_err());

        let task = TaskBuilder::new().id("t1").context_id("c1").build().unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.context_id, "c1");
        assert_eq!(task.state(), TaskState::Submitted);
    }

    #[test]
    fn test_task_builder_generates_id() {
        let task = TaskBuilder::new().context_id("c1").build().unwrap();
        assert!(!task.id.is_empty());
    }

    #[test]
    fn test_artifact_builder_auto_id() {
        let artifact = ArtifactBuilder::new().text("hello").build();
        assert!(!artifact.artifact_id.is_empty());
        assert_eq!(artifact.parts.len(), 1);

        let artifact = ArtifactBuilder::new().artifact_id("a1").name("out").build();
        assert_eq!(artifact.artifact_id, "a1");
        assert_eq!(artifact.name.as_deref(), Some("out"));
    }

    #[test]
    fn test_message_builder() {
        let msg = MessageBuilder::new()
            .role(Role::Agent)
            .text("hi")
            .task_id("t1")
            .context_id("c1")
            .build();
        assert_eq!(msg.role, Role::Agent);
        assert_eq!(msg.task_id.as_deref(), Some("t1"));
        assert!(!msg.message_id.is_empty());
    }
}
