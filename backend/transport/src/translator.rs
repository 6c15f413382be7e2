//! HTTP client for the translation service.

use std::time::Duration;

use async_trait::async_trait;
use cmdhub_core::{HubError, HubResult, TranslationRequest, TranslationResult, Translator};
use reqwest::{Client, StatusCode};
use tracing::debug;

pub struct RestTranslator {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl RestTranslator {
    pub fn new(http: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Translator for RestTranslator {
    /// `None` for 204/404 or a `null` body.
    async fn translate(&self, request: &TranslationRequest) -> HubResult<Option<TranslationResult>> {
        let url = format!("{}/api/v1/translate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HubError::Translation(e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {
                debug!(community_id = %request.community_id, "Translation declined");
                return Ok(None);
            }
            s if !s.is_success() => {
                return Err(HubError::Translation(format!("translation service returned {s}")));
            }
            _ => {}
        }

        response
            .json::<Option<TranslationResult>>()
            .await
            .map_err(|e| HubError::Translation(e.to_string()))
    }
}
