use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::MessageType;

// ---------------------------------------------------------------------------
// Command registry
// ---------------------------------------------------------------------------

/// Resolved metadata describing where and how to execute a command for one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Canonical command token, including its prefix (e.g. `!so`).
    pub command: String,
    pub module_name: String,
    /// Base URL of the owning module; the invocation target is `{module_url}/api/v1/execute`.
    pub module_url: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// Per-user repetition limit. Zero disables the cooldown gate.
    #[serde(default)]
    pub cooldown_seconds: u64,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Per-community live translation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Results below this confidence are discarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

fn default_target_lang() -> String {
    "en".to_string()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_lang: default_target_lang(),
            provider: None,
            min_confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_lang: String,
    pub community_id: String,
    pub config: TranslationConfig,
    pub platform: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
    pub detected_lang: String,
    pub target_lang: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub cached: bool,
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// An active, published workflow whose trigger matched the current event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    pub workflow_id: String,
    #[serde(default)]
    pub trigger_config: Value,
}

/// The supported workflow lookups. Each variant maps to one fixed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerFilter {
    Command { entity_id: String, command: String },
    MessageType { entity_id: String, message_type: MessageType },
}

impl TriggerFilter {
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Command { entity_id, .. } | Self::MessageType { entity_id, .. } => entity_id,
        }
    }

    /// `(trigger_type, trigger_value)` as carried in workflow trigger payloads.
    pub fn trigger(&self) -> (&'static str, String) {
        match self {
            Self::Command { command, .. } => ("command", command.clone()),
            Self::MessageType { message_type, .. } => ("event", message_type.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Side-channel services
// ---------------------------------------------------------------------------

/// Collaborator services the processor notifies in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Activity,
    Reputation,
    Workflow,
    Caption,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Reputation => "reputation",
            Self::Workflow => "workflow",
            Self::Caption => "caption",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published after a command succeeds, for platform action wrappers to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub session_id: String,
    pub entity_id: String,
    pub community_id: String,
    pub platform: String,
    pub channel_id: String,
    pub command: String,
    pub module: String,
    pub response: Value,
    pub timestamp: DateTime<Utc>,
}
