//! Side-channel service transports.
//!
//! Notifiers describe a call once as a [`ServiceCall`]; the [`Transport`]
//! chosen at startup decides whether it travels over RPC, REST, or RPC with
//! a REST fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cmdhub_config::NotifiersConfig;
use cmdhub_core::{HubError, HubResult, RpcClient, ServiceKind};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

/// One logical call to a side-channel service, addressable both ways.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub service: ServiceKind,
    pub rpc_method: &'static str,
    /// Path appended to the service's base URL.
    pub rest_path: String,
    pub payload: Value,
}

impl ServiceCall {
    pub fn activity(payload: Value) -> Self {
        Self {
            service: ServiceKind::Activity,
            rpc_method: "RecordActivity",
            rest_path: "/api/v1/activity".into(),
            payload,
        }
    }

    pub fn reputation(payload: Value) -> Self {
        Self {
            service: ServiceKind::Reputation,
            rpc_method: "RecordEvent",
            rest_path: "/api/v1/reputation/events".into(),
            payload,
        }
    }

    pub fn workflow_trigger(workflow_id: &str, payload: Value) -> Self {
        Self {
            service: ServiceKind::Workflow,
            rpc_method: "TriggerWorkflow",
            rest_path: format!("/api/v1/workflows/{workflow_id}/trigger"),
            payload,
        }
    }

    pub fn caption(payload: Value) -> Self {
        Self {
            service: ServiceKind::Caption,
            rpc_method: "PushCaption",
            rest_path: "/api/v1/captions".into(),
            payload,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, call: &ServiceCall) -> HubResult<Value>;
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

pub struct RestTransport {
    http: Client,
    endpoints: HashMap<ServiceKind, String>,
    timeout: Duration,
}

impl RestTransport {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self {
            http,
            endpoints: HashMap::new(),
            timeout,
        }
    }

    pub fn from_config(http: Client, config: &NotifiersConfig) -> Self {
        let endpoints = [
            (ServiceKind::Activity, &config.activity_url),
            (ServiceKind::Reputation, &config.reputation_url),
            (ServiceKind::Workflow, &config.workflow_url),
            (ServiceKind::Caption, &config.caption_url),
        ];
        endpoints
            .into_iter()
            .filter_map(|(kind, url)| url.as_deref().map(|u| (kind, u)))
            .fold(Self::new(http, config.rest_timeout()), |t, (kind, url)| {
                t.with_endpoint(kind, url)
            })
    }

    pub fn with_endpoint(mut self, service: ServiceKind, base_url: &str) -> Self {
        self.endpoints
            .insert(service, base_url.trim_end_matches('/').to_string());
        self
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn send(&self, call: &ServiceCall) -> HubResult<Value> {
        let transport_err = |message: String| HubError::Transport {
            service: call.service.to_string(),
            message,
        };
        let base = self
            .endpoints
            .get(&call.service)
            .ok_or_else(|| transport_err("no REST endpoint configured".into()))?;
        let url = format!("{base}{}", call.rest_path);

        let response = self
            .http
            .post(&url)
            .json(&call.payload)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| transport_err(e.to_string()))?;
        debug!(service = %call.service, url = %url, status = %response.status(), "REST call ok");

        let text = response.text().await.map_err(|e| transport_err(e.to_string()))?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

// ---------------------------------------------------------------------------
// RPC
// ---------------------------------------------------------------------------

/// Calls through an [`RpcClient`] with a short per-attempt timeout and a
/// small fixed number of attempts.
pub struct RpcTransport {
    client: Arc<dyn RpcClient>,
    timeout: Duration,
    attempts: u32,
}

impl RpcTransport {
    pub fn new(client: Arc<dyn RpcClient>, timeout: Duration, attempts: u32) -> Self {
        Self {
            client,
            timeout,
            attempts: attempts.max(1),
        }
    }
}

#[async_trait]
impl Transport for RpcTransport {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn send(&self, call: &ServiceCall) -> HubResult<Value> {
        let mut last_err = None;
        for attempt in 0..self.attempts {
            let result = tokio::time::timeout(
                self.timeout,
                self.client.call(call.service, call.rpc_method, &call.payload, self.timeout),
            )
            .await;
            match result {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    debug!(service = %call.service, method = call.rpc_method, attempt, error = %e, "RPC attempt failed");
                    last_err = Some(e);
                }
                Err(_) => {
                    debug!(service = %call.service, method = call.rpc_method, attempt, "RPC attempt timed out");
                    last_err = Some(HubError::Rpc {
                        service: call.service.to_string(),
                        method: call.rpc_method.to_string(),
                        message: format!("timed out after {:?}", self.timeout),
                    });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| HubError::Rpc {
            service: call.service.to_string(),
            method: call.rpc_method.to_string(),
            message: "no attempts made".into(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Tries `primary`; any error sends the same call through `secondary`.
pub struct FallbackTransport {
    primary: Arc<dyn Transport>,
    secondary: Arc<dyn Transport>,
}

impl FallbackTransport {
    pub fn new(primary: Arc<dyn Transport>, secondary: Arc<dyn Transport>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn send(&self, call: &ServiceCall) -> HubResult<Value> {
        match self.primary.send(call).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(
                    service = %call.service,
                    from = self.primary.name(),
                    to = self.secondary.name(),
                    error = %e,
                    "Primary transport failed; falling back"
                );
                self.secondary.send(call).await
            }
        }
    }
}

/// Pick the notifier transport once at startup.
///
/// RPC with REST fallback when RPC is enabled and a client is available,
/// otherwise REST alone.
pub fn build_transport(
    config: &NotifiersConfig,
    http: Client,
    rpc: Option<Arc<dyn RpcClient>>,
) -> Arc<dyn Transport> {
    let rest: Arc<dyn Transport> = Arc::new(RestTransport::from_config(http, config));
    match rpc {
        Some(client) if config.rpc_enabled => {
            info!("Notifier transport: rpc with rest fallback");
            let rpc = Arc::new(RpcTransport::new(client, config.rpc_timeout(), config.rpc_attempts));
            Arc::new(FallbackTransport::new(rpc, rest))
        }
        Some(_) => {
            info!("RPC client present but disabled; notifier transport: rest");
            rest
        }
        None => {
            if config.rpc_enabled {
                warn!("rpc_enabled is set but no RPC client is available; using rest");
            }
            rest
        }
    }
}
