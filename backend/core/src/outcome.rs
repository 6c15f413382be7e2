//! Structured results returned to platforms.
//!
//! Every path through the processor ends in a [`DispatchResult`]; user-facing
//! refusals are [`Rejection`]s rather than errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::event::MessageType;

/// A refusal the user is shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("entity_id is required")]
    MissingEntity,

    #[error("Community not found for this channel")]
    CommunityNotFound,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("module disabled")]
    ModuleDisabled,

    #[error("command disabled")]
    CommandDisabled,

    #[error("on cooldown, wait {0} seconds")]
    Cooldown(u64),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("module did not respond")]
    ModuleUnresponsive,
}

/// A command that reached its module and came back with a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedCommand {
    pub command: String,
    pub module: String,
    pub response: Value,
}

pub type CommandOutcome = Result<ExecutedCommand, Rejection>;

/// Routing metadata parsed from an interaction `custom_id` (`module:action:context`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRoute {
    pub module: String,
    pub action: String,
    pub context: String,
}

/// Branch-specific body of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Command(ExecutedCommand),
    Interaction(InteractionRoute),
    Acknowledged { event_type: MessageType },
    Message { translated: bool },
}

/// The envelope every caller of `process_event` receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub reply: Option<Reply>,
}

impl DispatchResult {
    pub fn ok(session_id: impl Into<String>, reply: Reply) -> Self {
        Self {
            success: true,
            session_id: Some(session_id.into()),
            error: None,
            reply: Some(reply),
        }
    }

    pub fn rejected(session_id: Option<String>, rejection: &Rejection) -> Self {
        Self::failed(session_id, rejection.to_string())
    }

    pub fn failed(session_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id,
            error: Some(error.into()),
            reply: None,
        }
    }

    pub fn from_outcome(session_id: impl Into<String>, outcome: CommandOutcome) -> Self {
        let session_id = session_id.into();
        match outcome {
            Ok(executed) => Self::ok(session_id, Reply::Command(executed)),
            Err(rejection) => Self::rejected(Some(session_id), &rejection),
        }
    }
}
