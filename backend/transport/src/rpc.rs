//! JSON-RPC 2.0 client for side-channel services.
//!
//! Each service gets its own endpoint; the method name travels in the
//! request body. Services without an endpoint fail fast so the fallback
//! transport moves straight to REST.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cmdhub_config::NotifiersConfig;
use cmdhub_core::{HubError, HubResult, RpcClient, ServiceKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    http: Client,
    endpoints: HashMap<ServiceKind, String>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            endpoints: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_endpoint(mut self, service: ServiceKind, url: &str) -> Self {
        self.endpoints
            .insert(service, url.trim_end_matches('/').to_string());
        self
    }

    /// `None` when no service has an RPC endpoint configured.
    pub fn from_config(http: Client, config: &NotifiersConfig) -> Option<Self> {
        let endpoints = [
            (ServiceKind::Activity, &config.activity_rpc_url),
            (ServiceKind::Reputation, &config.reputation_rpc_url),
            (ServiceKind::Workflow, &config.workflow_rpc_url),
            (ServiceKind::Caption, &config.caption_rpc_url),
        ];
        let mut client = Self::new(http);
        for (service, url) in endpoints {
            if let Some(url) = url {
                client = client.with_endpoint(service, url);
            }
        }
        (!client.endpoints.is_empty()).then_some(client)
    }

    pub fn endpoint(&self, service: ServiceKind) -> Option<&str> {
        self.endpoints.get(&service).map(String::as_str)
    }
}

#[async_trait]
impl RpcClient for JsonRpcClient {
    async fn call(
        &self,
        service: ServiceKind,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> HubResult<Value> {
        let rpc_error = |message: String| HubError::Rpc {
            service: service.to_string(),
            method: method.to_string(),
            message,
        };
        let url = self
            .endpoint(service)
            .ok_or_else(|| rpc_error("no rpc endpoint configured".into()))?;

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: payload,
        };
        debug!(service = %service, method, id = request.id, "RPC call");

        let response: RpcResponse = self
            .http
            .post(url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| rpc_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| rpc_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| rpc_error(format!("invalid response: {e}")))?;

        match response {
            RpcResponse {
                error: Some(err), ..
            } => Err(rpc_error(format!("{} (code {})", err.message, err.code))),
            RpcResponse { result, .. } => Ok(result.unwrap_or(Value::Null)),
        }
    }
}
