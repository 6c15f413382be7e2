//! Fakes shared by the dispatch tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cmdhub_config::HubConfig;
use cmdhub_core::{
    Cache, CommandInfo, CommandRegistry, CommunityStore, HubError, HubResult, InboundEvent,
    RateLimiter, ServiceKind, TranslationConfig, TranslationRequest, TranslationResult,
    Translator,
};
use cmdhub_transport::{ServiceCall, Transport};
use serde_json::{json, Value};

pub fn test_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.dispatch.module_timeout_secs = 2;
    config.dispatch.backoff_base_ms = 10;
    config
}

pub fn inbound(value: Value) -> InboundEvent {
    serde_json::from_value(value).unwrap()
}

/// A chat message from `user-1` in `disc-1`.
pub fn chat(message: &str) -> InboundEvent {
    inbound(json!({
        "entity_id": "disc-1",
        "user_id": "user-1",
        "username": "alice",
        "platform": "discord",
        "channel_id": "chan-1",
        "message": message,
        "message_type": "chatMessage",
    }))
}

/// Records every call and answers `null`.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<ServiceCall>>,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, service: ServiceKind) -> Vec<ServiceCall> {
        self.calls().into_iter().filter(|c| c.service == service).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, call: &ServiceCall) -> HubResult<Value> {
        self.calls.lock().unwrap().push(call.clone());
        Ok(Value::Null)
    }
}

pub struct FixedTranslator {
    text: String,
    detected: String,
}

impl FixedTranslator {
    pub fn new(text: &str, detected: &str) -> Self {
        Self { text: text.into(), detected: detected.into() }
    }
}

#[async_trait]
impl Translator for FixedTranslator {
    async fn translate(&self, request: &TranslationRequest) -> HubResult<Option<TranslationResult>> {
        Ok(Some(TranslationResult {
            translated_text: self.text.clone(),
            detected_lang: self.detected.clone(),
            target_lang: request.target_lang.clone(),
            confidence: 0.95,
            provider: "fixed".into(),
            cached: false,
        }))
    }
}

pub struct BrokenTranslator;

#[async_trait]
impl Translator for BrokenTranslator {
    async fn translate(&self, _request: &TranslationRequest) -> HubResult<Option<TranslationResult>> {
        Err(HubError::Translation("provider timeout".into()))
    }
}

pub struct DownCache;

#[async_trait]
impl Cache for DownCache {
    async fn get(&self, _key: &str) -> HubResult<Option<Vec<u8>>> {
        Err(HubError::Cache("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> HubResult<()> {
        Err(HubError::Cache("connection refused".into()))
    }
}

/// Answers community lookups but fails every installation query.
pub struct InstallationsDown {
    pub community: Option<String>,
}

#[async_trait]
impl CommunityStore for InstallationsDown {
    async fn active_community(&self, _entity_id: &str) -> HubResult<Option<String>> {
        Ok(self.community.clone())
    }

    async fn module_installation(&self, _c: &str, _m: &str) -> HubResult<Option<bool>> {
        Err(HubError::Store("installations table unavailable".into()))
    }

    async fn translation_config(&self, _c: &str) -> HubResult<Option<TranslationConfig>> {
        Ok(None)
    }
}

pub struct DownLimiter;

#[async_trait]
impl RateLimiter for DownLimiter {
    async fn check(&self, _key: &str, _limit: u32, _window: Duration) -> HubResult<bool> {
        Err(HubError::RateLimiter("redis down".into()))
    }
}

pub struct DownRegistry;

#[async_trait]
impl CommandRegistry for DownRegistry {
    async fn get_command(&self, _command: &str, _community: &str) -> HubResult<Option<CommandInfo>> {
        Err(HubError::Registry("registry offline".into()))
    }
}

pub struct PanickingRegistry;

#[async_trait]
impl CommandRegistry for PanickingRegistry {
    async fn get_command(&self, _command: &str, _community: &str) -> HubResult<Option<CommandInfo>> {
        panic!("registry exploded")
    }
}
