//! Config defaults: constants for every tunable plus post-load normalisation.

use crate::schema::HubConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Per-attempt timeout of a module call.
pub const DEFAULT_MODULE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MODULE_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Flood protection: calls per `user:command` key per window.
pub const DEFAULT_FLOOD_LIMIT: u32 = 60;
pub const DEFAULT_FLOOD_WINDOW_SECS: u64 = 60;
pub const DEFAULT_COMMAND_PREFIXES: [char; 2] = ['!', '#'];

pub const DEFAULT_RESPONSE_TTL_SECS: u64 = 3_600;
pub const DEFAULT_ENABLEMENT_TTL_SECS: u64 = 300;
pub const DEFAULT_COMMUNITY_TTL_SECS: u64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_RPC_ATTEMPTS: u32 = 2;
pub const DEFAULT_REST_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_TASKS_MAX_CONCURRENT: usize = 64;
pub const DEFAULT_TASKS_MAX_PENDING: usize = 1_024;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: HubConfig) -> HubConfig {
    let config = apply_dispatch_defaults(config);
    let config = apply_notifier_defaults(config);
    apply_task_defaults(config)
}

/// An explicitly empty prefix list would disable every command; restore the defaults.
fn apply_dispatch_defaults(mut config: HubConfig) -> HubConfig {
    let dispatch = &mut config.dispatch;
    if dispatch.command_prefixes.is_empty() {
        dispatch.command_prefixes = DEFAULT_COMMAND_PREFIXES.to_vec();
    }
    if dispatch.module_max_attempts == 0 {
        dispatch.module_max_attempts = DEFAULT_MODULE_MAX_ATTEMPTS;
    }
    if dispatch.sweep_interval_secs == 0 {
        dispatch.sweep_interval_secs = DEFAULT_SWEEP_INTERVAL_SECS;
    }
    config
}

/// Strip trailing slashes from service URLs and drop empty ones.
fn apply_notifier_defaults(mut config: HubConfig) -> HubConfig {
    let n = &mut config.notifiers;
    for url in [
        &mut n.activity_url,
        &mut n.reputation_url,
        &mut n.workflow_url,
        &mut n.caption_url,
        &mut n.translation_url,
        &mut n.activity_rpc_url,
        &mut n.reputation_rpc_url,
        &mut n.workflow_rpc_url,
        &mut n.caption_rpc_url,
    ] {
        *url = url
            .take()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
    }
    if n.rpc_attempts == 0 {
        n.rpc_attempts = 1;
    }
    config
}

fn apply_task_defaults(mut config: HubConfig) -> HubConfig {
    let tasks = &mut config.tasks;
    if tasks.max_pending < tasks.max_concurrent {
        tasks.max_pending = tasks.max_concurrent;
    }
    config
}
