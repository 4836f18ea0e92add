//! Client for the upstream image-generation API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProxyConfig;
use crate::error::{ToolkitError, ToolkitResult};

/// Body accepted by the proxy route and forwarded upstream unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default = "default_count")]
    pub n: u32,
    #[serde(default = "default_size")]
    pub size: String,
}

fn default_count() -> u32 {
    1
}

fn default_size() -> String {
    "1024x1024".to_string()
}

impl GenerationRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: Some(prompt.into()),
            n: default_count(),
            size: default_size(),
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl UpstreamClient {
    /// Build from config. Fails when no API key is configured.
    pub fn from_config(config: &ProxyConfig) -> ToolkitResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::new(http, &config.api_base, api_key))
    }

    pub fn new(http: reqwest::Client, api_base: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/images/generations", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Forward `request` and return the upstream JSON as-is.
    ///
    /// A non-2xx answer becomes an upstream error carrying the same status
    /// and the text `API Error: {status} {body}`.
    pub async fn generate(&self, request: &GenerationRequest) -> ToolkitResult<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ToolkitError::network(e.to_string()).with_operation("generate image"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Upstream rejected image generation");
            return Err(ToolkitError::upstream(
                status.as_u16(),
                format!("API Error: {} {}", status.as_u16(), body),
            ));
        }

        let data = response
            .json::<Value>()
            .await
            .map_err(|e| ToolkitError::network(e.to_string()).with_operation("read upstream body"))?;
        debug!(status = status.as_u16(), "Upstream answered");
        Ok(data)
    }
}
