//! Module invocation over HTTP.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// The fixed-shape body every module receives on `/api/v1/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationPayload {
    pub command: String,
    /// Message text after the command token.
    pub args: String,
    pub user_id: String,
    pub entity_id: String,
    pub community_id: String,
    pub session_id: String,
    pub message: String,
}

enum Attempt {
    Done(Value),
    Retry(String),
    Fatal(StatusCode),
}

pub struct ModuleInvoker {
    http: Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl ModuleInvoker {
    pub fn new(http: Client, timeout: Duration, policy: RetryPolicy) -> Self {
        Self { http, timeout, policy }
    }

    pub fn execute_url(module_url: &str) -> String {
        format!("{}/api/v1/execute", module_url.trim_end_matches('/'))
    }

    /// Invoke the module, retrying on 429, timeouts and network errors.
    ///
    /// Returns `None` on a non-retryable status or once attempts run out.
    pub async fn invoke(&self, module_url: &str, payload: &InvocationPayload) -> Option<Value> {
        let url = Self::execute_url(module_url);
        for attempt in 0..self.policy.max_attempts {
            match self.attempt(&url, payload).await {
                Attempt::Done(body) => {
                    info!(url = %url, attempt, command = %payload.command, "Module responded");
                    return Some(body);
                }
                Attempt::Fatal(status) => {
                    warn!(url = %url, attempt, status = %status, "Module call failed; not retrying");
                    return None;
                }
                Attempt::Retry(reason) => {
                    if !self.policy.should_retry(attempt) {
                        warn!(url = %url, attempt, reason = %reason, "Module call attempts exhausted");
                        break;
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Module call failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        None
    }

    async fn attempt(&self, url: &str, payload: &InvocationPayload) -> Attempt {
        let response = match self
            .http
            .post(url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Retry("timeout".into()),
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry("429 Too Many Requests".into());
        }
        if status != StatusCode::OK {
            return Attempt::Fatal(status);
        }

        match response.text().await {
            Ok(text) if text.trim().is_empty() => Attempt::Done(Value::Null),
            Ok(text) => Attempt::Done(serde_json::from_str(&text).unwrap_or_else(|_| {
                debug!(url, "Module body is not JSON; passing through as text");
                Value::String(text)
            })),
            Err(e) if e.is_timeout() => Attempt::Retry("timeout reading body".into()),
            Err(e) => Attempt::Retry(e.to_string()),
        }
    }
}
