//! Message types for the A2A protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Part;

/// Identifies the sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user/client.
    #[default]
    User,
    /// Message from the agent/service.
    Agent,
}

/// A single message in the conversation between a user and an agent.
///
/// Identity is `message_id`; messages are immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// A unique identifier for the message (typically a UUID).
    pub message_id: String,
    /// Identifies the sender of the message.
    pub role: Role,
    /// An array of content parts that form the message body.
    pub parts: Vec<Part>,
    /// The type of this object (always "message").
    #[serde(default = "default_message_kind")]
    pub kind: String,
    /// The ID of the task this message is part of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// The context ID for this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Other task IDs this message references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_task_ids: Option<Vec<String>>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

fn default_message_kind() -> String {
    "message".to_string()
}

impl Message {
    /// Creates a new message with the given ID, role, and parts.
    pub fn new(message_id: impl Into<String>, role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: message_id.into(),
            role,
            parts,
            kind: "message".to_string(),
            task_id: None,
            context_id: None,
            reference_task_ids: None,
            metadata: None,
        }
    }

    /// Creates a new user message with an auto-generated ID.
    pub fn user(parts: Vec<Part>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), Role::User, parts)
    }

    /// Creates a new agent message with an auto-generated ID.
    pub fn agent(parts: Vec<Part>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), Role::Agent, parts)
    }

    /// Creates a simple text message from the user.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// Creates a simple text message from the agent.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::agent(vec![Part::text(text)])
    }

    /// Sets the task ID for this message.
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Sets the context ID for this message.
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Sets the referenced task IDs for this message.
    pub fn with_reference_task_ids(mut self, ids: Vec<String>) -> Self {
        self.reference_task_ids = Some(ids);
        self
    }

    /// Returns the concatenated text content of all text parts, if any.
    pub fn text_content(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts.iter().filter_map(|p| p.as_text()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_message() {
        let msg = Message::user_text("Hello!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text_content(), Some("Hello!".to_string()));
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::agent_text("Hi").with_task_id("t1").with_context_id("c1");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"agent\""));
        assert!(json.contains("\"kind\":\"message\""));
        assert!(json.contains("\"taskId\":\"t1\""));
        assert!(json.contains("\"contextId\":\"c1\""));
    }

    #[test]
    fn test_message_kind_defaulted_on_input() {
        let raw = r#"{"messageId":"m1","role":"user","parts":[]}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, "message");
    }
}
