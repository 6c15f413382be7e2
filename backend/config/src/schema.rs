//! Command hub configuration schema.
//!
//! Every section has serde defaults, so an empty file (or no file) yields a
//! runnable configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use cmdhub_core::{CommandInfo, MessageType, TranslationConfig};
use serde::{Deserialize, Serialize};

use crate::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
    pub notifiers: NotifiersConfig,
    pub tasks: TasksConfig,
    /// Seed rows for the in-process directory (commands, mappings, workflows).
    pub directory: DirectoryConfig,
}

// ---------------------------------------------------------------------------
// Server / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling NDJSON log files. Console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Emit JSON on the console as well.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-attempt timeout of a module invocation.
    pub module_timeout_secs: u64,
    pub module_max_attempts: u32,
    /// Backoff before retry `n` (0-based) is `backoff_base_ms * 2^n`.
    pub backoff_base_ms: u64,
    pub flood_limit: u32,
    pub flood_window_secs: u64,
    pub command_prefixes: Vec<char>,
    pub response_ttl_secs: u64,
    pub enablement_ttl_secs: u64,
    pub community_ttl_secs: u64,
    /// How often the in-process cache and limiter drop expired entries.
    pub sweep_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            module_timeout_secs: DEFAULT_MODULE_TIMEOUT_SECS,
            module_max_attempts: DEFAULT_MODULE_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            flood_limit: DEFAULT_FLOOD_LIMIT,
            flood_window_secs: DEFAULT_FLOOD_WINDOW_SECS,
            command_prefixes: DEFAULT_COMMAND_PREFIXES.to_vec(),
            response_ttl_secs: DEFAULT_RESPONSE_TTL_SECS,
            enablement_ttl_secs: DEFAULT_ENABLEMENT_TTL_SECS,
            community_ttl_secs: DEFAULT_COMMUNITY_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl DispatchConfig {
    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn flood_window(&self) -> Duration {
        Duration::from_secs(self.flood_window_secs)
    }

    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_secs)
    }

    pub fn enablement_ttl(&self) -> Duration {
        Duration::from_secs(self.enablement_ttl_secs)
    }

    pub fn community_ttl(&self) -> Duration {
        Duration::from_secs(self.community_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Notifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifiersConfig {
    /// Prefer the RPC transport when an RPC client is available.
    pub rpc_enabled: bool,
    pub rpc_timeout_secs: u64,
    pub rpc_attempts: u32,
    pub rest_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_url: Option<String>,
    /// JSON-RPC endpoints, one per side-channel service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_rpc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation_rpc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_rpc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_rpc_url: Option<String>,
}

impl Default for NotifiersConfig {
    fn default() -> Self {
        Self {
            rpc_enabled: false,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            rpc_attempts: DEFAULT_RPC_ATTEMPTS,
            rest_timeout_secs: DEFAULT_REST_TIMEOUT_SECS,
            activity_url: None,
            reputation_url: None,
            workflow_url: None,
            caption_url: None,
            translation_url: None,
            activity_rpc_url: None,
            reputation_rpc_url: None,
            workflow_rpc_url: None,
            caption_rpc_url: None,
        }
    }
}

impl NotifiersConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_secs(self.rest_timeout_secs)
    }

    pub fn has_rpc_endpoints(&self) -> bool {
        [
            &self.activity_rpc_url,
            &self.reputation_rpc_url,
            &self.workflow_rpc_url,
            &self.caption_rpc_url,
        ]
        .iter()
        .any(|url| url.is_some())
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub max_concurrent: usize,
    /// Running plus queued tasks above which new work is shed.
    pub max_pending: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_TASKS_MAX_CONCURRENT,
            max_pending: DEFAULT_TASKS_MAX_PENDING,
        }
    }
}

// ---------------------------------------------------------------------------
// Directory seed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Active `entity_id -> community_id` mappings.
    pub entities: BTreeMap<String, String>,
    pub commands: Vec<CommandRow>,
    pub installations: Vec<InstallationRow>,
    /// Translation settings keyed by community id.
    pub translation: BTreeMap<String, TranslationConfig>,
    pub workflows: Vec<WorkflowRow>,
}

/// A registry row. Rows without a community apply to every community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<String>,
    #[serde(flatten)]
    pub info: CommandInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRow {
    pub community_id: String,
    pub module_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRow {
    pub workflow_id: String,
    pub entity_id: String,
    pub trigger: WorkflowTriggerSpec,
    #[serde(default)]
    pub trigger_config: serde_json::Value,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowTriggerSpec {
    Command { command: String },
    Event { message_type: MessageType },
}

fn default_true() -> bool {
    true
}
