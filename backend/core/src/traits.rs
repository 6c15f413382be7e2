//! Collaborator seams of the command processor.
//!
//! Implementations are constructed once per process and shared behind `Arc`;
//! all of them must be safe for concurrent use by in-flight events.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HubResult;
use crate::types::{
    CommandInfo, OutboundEvent, ServiceKind, TranslationConfig, TranslationRequest,
    TranslationResult, TriggerFilter, WorkflowTrigger,
};

/// Resolves `(command, community)` to the module that implements it.
#[async_trait]
pub trait CommandRegistry: Send + Sync {
    async fn get_command(&self, command: &str, community_id: &str)
        -> HubResult<Option<CommandInfo>>;
}

/// Sliding-window limiter. Each call counts against the window (increment-and-check).
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> HubResult<bool>;
}

/// Shared byte cache with per-entry TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> HubResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> HubResult<()>;
}

/// Issues one opaque session id per inbound event.
pub trait SessionAllocator: Send + Sync {
    fn allocate(&self, entity_id: &str, user_id: &str) -> String;
}

/// Community-level records the processor reads.
#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Community of the active server mapping for `entity_id`, if provisioned.
    async fn active_community(&self, entity_id: &str) -> HubResult<Option<String>>;

    /// `Some(enabled)` when an installation row exists for the module.
    async fn module_installation(
        &self,
        community_id: &str,
        module_name: &str,
    ) -> HubResult<Option<bool>>;

    async fn translation_config(&self, community_id: &str) -> HubResult<Option<TranslationConfig>>;
}

/// Read-only workflow catalog.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Active, published workflows whose trigger matches `filter`.
    async fn matching_workflows(&self, filter: &TriggerFilter) -> HubResult<Vec<WorkflowTrigger>>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// `Ok(None)` when the provider declined to translate.
    async fn translate(&self, request: &TranslationRequest) -> HubResult<Option<TranslationResult>>;
}

/// A pooled RPC channel to side-channel services.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(
        &self,
        service: ServiceKind,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> HubResult<Value>;
}

/// Delivers results of successful commands to outbound platform wrappers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: OutboundEvent) -> HubResult<()>;
}
