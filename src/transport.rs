use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CompletionRequest, CompletionResponse, deserialize_flexible_code};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Failure reported by, or on the way to, the completion provider
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
    pub error_type: Option<String>,
    pub code: Option<String>,
    /// Request field the provider objected to, when it says so
    pub param: Option<String>,
    pub status: Option<u16>,
}

impl UpstreamError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            code: None,
            param: None,
            status: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_code")]
    code: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

/// Decode a provider error body. Bodies that are not the standard envelope
/// keep their raw text as the message.
pub(crate) fn parse_provider_error(status: u16, body: &str) -> UpstreamError {
    match serde_json::from_str::<ProviderErrorEnvelope>(body) {
        Ok(envelope) => UpstreamError {
            message: envelope
                .error
                .message
                .unwrap_or_else(|| format!("{status} status code (no body)")),
            error_type: envelope.error.error_type,
            code: envelope.error.code,
            param: envelope.error.param,
            status: Some(status),
        },
        Err(_) => UpstreamError {
            message: if body.trim().is_empty() {
                format!("{status} status code (no body)")
            } else {
                format!("{status} {body}")
            },
            error_type: None,
            code: None,
            param: None,
            status: Some(status),
        },
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse, UpstreamError>;
}

/// Chat completions over HTTP with bearer auth
pub struct OpenAiTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiTransport {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse, UpstreamError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| {
                UpstreamError::transport(format!("Failed to send request to OpenAI API: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                UpstreamError::transport(format!("Failed to parse OpenAI API response: {e}"))
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(parse_provider_error(status.as_u16(), &body))
    }
}
