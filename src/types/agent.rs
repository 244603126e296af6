//! Agent descriptor types.
//!
//! The `AgentCard` is the self-describing manifest served on the well-known
//! endpoint: identity, capabilities, skills, and supported content modes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The AgentCard is a self-describing manifest for an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// A human-readable name for the agent.
    pub name: String,
    /// A human-readable description of the agent.
    pub description: String,
    /// The preferred endpoint URL for interacting with the agent.
    pub url: String,
    /// The agent's own version number.
    pub version: String,
    /// Default set of supported input MIME types.
    pub default_input_modes: Vec<String>,
    /// Default set of supported output MIME types.
    pub default_output_modes: Vec<String>,
    /// A declaration of optional capabilities supported by the agent.
    pub capabilities: AgentCapabilities,
    /// The set of skills the agent can perform.
    pub skills: Vec<AgentSkill>,
    /// Information about the agent's service provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    /// A list of security requirement objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<HashMap<String, Vec<String>>>>,
}

impl AgentCard {
    /// Creates a new AgentCard builder.
    pub fn builder(name: impl Into<String>, url: impl Into<String>) -> AgentCardBuilder {
        AgentCardBuilder::new(name, url)
    }

    /// Returns true if the agent supports streaming.
    pub fn supports_streaming(&self) -> bool {
        self.capabilities.streaming.unwrap_or(false)
    }

    /// Finds a skill by its ID.
    pub fn find_skill(&self, skill_id: &str) -> Option<&AgentSkill> {
        self.skills.iter().find(|s| s.id == skill_id)
    }
}

/// Builder for creating an AgentCard.
#[derive(Debug)]
pub struct AgentCardBuilder {
    card: AgentCard,
}

impl AgentCardBuilder {
    /// Creates a new builder with required fields.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            card: AgentCard {
                name: name.into(),
                description: String::new(),
                url: url.into(),
                version: "1.0.0".to_string(),
                default_input_modes: vec!["text/plain".to_string()],
                default_output_modes: vec!["text/plain".to_string()],
                capabilities: AgentCapabilities::default(),
                skills: vec![],
                provider: None,
                security: None,
            },
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.card.description = description.into();
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.card.version = version.into();
        self
    }

    /// Sets the capabilities.
    pub fn capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.card.capabilities = capabilities;
        self
    }

    /// Adds a skill.
    pub fn skill(mut self, skill: AgentSkill) -> Self {
        self.card.skills.push(skill);
        self
    }

    /// Sets the input modes.
    pub fn input_modes(mut self, modes: Vec<String>) -> Self {
        self.card.default_input_modes = modes;
        self
    }

    /// Sets the output modes.
    pub fn output_modes(mut self, modes: Vec<String>) -> Self {
        self.card.default_output_modes = modes;
        self
    }

    /// Sets the provider.
    pub fn provider(mut self, provider: AgentProvider) -> Self {
        self.card.provider = Some(provider);
        self
    }

    /// Builds the AgentCard.
    pub fn build(self) -> AgentCard {
        self.card
    }
}

/// Defines optional capabilities supported by an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Indicates if the agent supports SSE streaming responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    /// Indicates if the agent supports push notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notifications: Option<bool>,
    /// Indicates if the agent exposes task status history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_transition_history: Option<bool>,
}

/// A distinct capability or function the agent can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// A unique identifier for the skill.
    pub id: String,
    /// A human-readable name for the skill.
    pub name: String,
    /// A description of the skill.
    pub description: String,
    /// Keywords describing the skill's capabilities.
    pub tags: Vec<String>,
    /// Example prompts the skill can handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    /// Supported input MIME types, overriding the card default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_modes: Option<Vec<String>>,
    /// Supported output MIME types, overriding the card default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_modes: Option<Vec<String>>,
}

impl AgentSkill {
    /// Creates a new skill with the given id, name, and description.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags: vec![],
            examples: None,
            input_modes: None,
            output_modes: None,
        }
    }
}

/// Information about the organization providing the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentProvider {
    /// The name of the organization.
    pub organization: String,
    /// A URL for the organization.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_card_builder() {
        let card = AgentCard::builder("Echo Agent", "http://localhost:8080/a2a")
            .description("Echoes messages back")
            .version("0.2.0")
            .capabilities(AgentCapabilities {
                streaming: Some(true),
                ..Default::default()
            })
            .skill(AgentSkill::new("echo", "Echo", "Repeats the input"))
            .build();

        assert_eq!(card.name, "Echo Agent");
        assert!(card.supports_streaming());
        assert!(card.find_skill("echo").is_some());
        assert!(card.find_skill("missing").is_none());
    }

    #[test]
    fn test_agent_card_serialization() {
        let card = AgentCard::builder("A", "http://a").build();
        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"defaultInputModes\""));
        assert!(!json.contains("provider"));
    }
}
