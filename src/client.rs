//! Client side of the chat exchange.
//!
//! [`ChatClient::send_message`] never fails: every outcome, including
//! network trouble and server errors, is turned into text that can be
//! shown to the student. The underlying failure is kept in
//! [`ChatClient::last_error`] for diagnostics.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::catalog::{DEFAULT_MODEL_ID, default_system_prompt, uses_special_params};
use crate::config::Config;
use crate::models::{ChatRequestBody, UserProfile};
use crate::service::FALLBACK_CONTENT;

pub const CONNECTIVITY_REPLY: &str = "I'm sorry, but I can't connect to our server right now. This might be due to network issues or server configuration. Please try again later or contact support.";

/// Failure texts that indicate the request never reached the server
pub const CONNECTIVITY_SIGNATURES: [&str; 2] = ["Failed to fetch", "Network request failed"];

const NON_JSON_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure or timeout
    #[error("{0}")]
    Unreachable(String),

    #[error("{0}")]
    Network(String),

    /// Non-success status; the text is built from the response body
    #[error("{0}")]
    Server(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn is_connectivity(&self) -> bool {
        match self {
            ClientError::Unreachable(_) => true,
            ClientError::Network(msg) => CONNECTIVITY_SIGNATURES.iter().any(|s| msg.contains(s)),
            _ => false,
        }
    }
}

/// Raw reply from the chat endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl EndpointReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn post_chat(&self, body: &ChatRequestBody) -> Result<EndpointReply, ClientError>;
}

pub struct HttpChatEndpoint {
    client: Client,
    url: String,
}

impl HttpChatEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn classify_send_error(e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::Unreachable(format!("Network request failed: {e}"))
    } else {
        ClientError::Network(e.to_string())
    }
}

#[async_trait]
impl ChatEndpoint for HttpChatEndpoint {
    async fn post_chat(&self, body: &ChatRequestBody) -> Result<EndpointReply, ClientError> {
        tracing::debug!(url = %self.url, model = ?body.model_id, "Sending chat request");
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify_send_error)?;

        Ok(EndpointReply {
            status,
            content_type,
            body,
        })
    }
}

/// Decode the reply body, substituting a diagnostic for non-JSON bodies
fn reply_data(reply: &EndpointReply) -> Result<Value, ClientError> {
    if reply.is_json() {
        return serde_json::from_str(&reply.body)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()));
    }

    tracing::warn!("Received non-JSON response: {}", reply.body);
    let preview: String = reply.body.chars().take(NON_JSON_PREVIEW_CHARS).collect();
    let ellipsis = if reply.body.chars().count() > NON_JSON_PREVIEW_CHARS {
        "..."
    } else {
        ""
    };
    Ok(json!({
        "error": format!("Server returned non-JSON response: {preview}{ellipsis}")
    }))
}

fn server_error_text(data: &Value, status: u16) -> String {
    let mut text = data
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Server error: {status}"));
    if let Some(message) = data
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        text.push_str(" - ");
        text.push_str(message);
    }
    text
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Snapshot of the client's connection state for troubleshooting
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDiagnostics {
    /// `None` when the endpoint was supplied directly rather than by URL
    pub api_url: Option<String>,
    pub loading: bool,
    pub test_mode: bool,
    pub last_error: Option<ClientError>,
}

pub struct ChatClient {
    endpoint: Arc<dyn ChatEndpoint>,
    api_url: Option<String>,
    loading: AtomicBool,
    last_error: Mutex<Option<ClientError>>,
    test_delay: Option<Duration>,
}

impl ChatClient {
    pub fn new(endpoint: Arc<dyn ChatEndpoint>) -> Self {
        Self {
            endpoint,
            api_url: None,
            loading: AtomicBool::new(false),
            last_error: Mutex::new(None),
            test_delay: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let endpoint = HttpChatEndpoint::new(config.client.api_url.clone(), config.client_timeout())?;
        let api_url = endpoint.url().to_string();
        let mut client = Self::new(Arc::new(endpoint));
        client.api_url = Some(api_url);
        Ok(if config.client.test_mode {
            client.with_test_mode(Duration::from_millis(config.client.test_delay_ms))
        } else {
            client
        })
    }

    /// Answer locally after `delay` instead of calling the endpoint
    pub fn with_test_mode(mut self, delay: Duration) -> Self {
        self.test_delay = Some(delay);
        self
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<ClientError> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    pub fn diagnostics(&self) -> ClientDiagnostics {
        ClientDiagnostics {
            api_url: self.api_url.clone(),
            loading: self.is_loading(),
            test_mode: self.test_delay.is_some(),
            last_error: self.last_error(),
        }
    }

    fn record_error(&self, error: Option<ClientError>) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = error;
        }
    }

    /// Send one user turn and return the text to display.
    ///
    /// `model_id` defaults to `gpt-4o` and `system_prompt` to the first
    /// persona's prompt.
    pub async fn send_message(
        &self,
        message: &str,
        model_id: Option<&str>,
        system_prompt: Option<&str>,
        user_profile: Option<&UserProfile>,
    ) -> String {
        let _loading = LoadingGuard::start(&self.loading);
        self.record_error(None);

        if let Some(delay) = self.test_delay {
            tokio::time::sleep(delay).await;
            return format!("This is a test response. You asked: \"{message}\"");
        }

        let model_id = model_id.unwrap_or(DEFAULT_MODEL_ID);
        let system_prompt = system_prompt.unwrap_or(default_system_prompt());

        match self
            .exchange(message, model_id, system_prompt, user_profile)
            .await
        {
            Ok(content) => content,
            Err(err) => self.fallback_for(err),
        }
    }

    async fn exchange(
        &self,
        message: &str,
        model_id: &str,
        system_prompt: &str,
        user_profile: Option<&UserProfile>,
    ) -> Result<String, ClientError> {
        let uses_completion_tokens = uses_special_params(model_id);
        tracing::debug!(model = model_id, uses_completion_tokens, "Composing chat request");

        let body = ChatRequestBody {
            message: Some(message.to_string()),
            model_id: Some(model_id.to_string()),
            system_prompt: Some(system_prompt.to_string()),
            user_profile: user_profile.cloned(),
            uses_completion_tokens: Some(uses_completion_tokens),
        };

        let reply = self.endpoint.post_chat(&body).await?;
        let data = reply_data(&reply)?;

        if !reply.is_success() {
            tracing::error!(status = reply.status, "API error response: {}", data);
            return Err(ClientError::Server(server_error_text(&data, reply.status)));
        }

        match data.get("content").and_then(Value::as_str) {
            Some(content) if !content.is_empty() => Ok(content.to_string()),
            _ => {
                tracing::warn!("API response missing content property: {}", data);
                Ok(FALLBACK_CONTENT.to_string())
            }
        }
    }

    fn fallback_for(&self, err: ClientError) -> String {
        let connectivity = err.is_connectivity();
        if connectivity {
            tracing::error!(
                "CORS error: the server is not reachable or is not allowing requests from this origin ({})",
                err
            );
        } else {
            tracing::error!("API error: {}", err);
        }

        let reply = if connectivity {
            CONNECTIVITY_REPLY.to_string()
        } else {
            format!(
                "I'm sorry, I couldn't process your request due to a technical issue. Please try again later. (Error: {err})"
            )
        };
        self.record_error(Some(err));
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{AppState, router};
    use crate::models::{Choice, CompletionMessage, CompletionResponse, EducationLevel, Role};
    use crate::service::ChatService;
    use crate::transport::{MockTransport, Transport};

    fn json_reply(status: u16, body: Value) -> EndpointReply {
        EndpointReply {
            status,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: body.to_string(),
        }
    }

    fn client_returning(reply: Result<EndpointReply, ClientError>) -> ChatClient {
        let mut endpoint = MockChatEndpoint::new();
        endpoint
            .expect_post_chat()
            .times(1)
            .returning(move |_| reply.clone());
        ChatClient::new(Arc::new(endpoint))
    }

    #[tokio::test]
    async fn request_carries_defaults_and_special_flag() {
        let mut endpoint = MockChatEndpoint::new();
        endpoint
            .expect_post_chat()
            .times(1)
            .withf(|body| {
                body.model_id.as_deref() == Some("gpt-4o")
                    && body.system_prompt.as_deref() == Some(default_system_prompt())
                    && body.uses_completion_tokens == Some(false)
            })
            .returning(|_| Ok(json_reply(200, json!({ "content": "hi" }))));
        endpoint
            .expect_post_chat()
            .times(1)
            .withf(|body| {
                body.model_id.as_deref() == Some("o3-mini")
                    && body.uses_completion_tokens == Some(true)
                    && body.user_profile.as_ref().map(|p| p.education_level)
                        == Some(EducationLevel::HighSchool)
            })
            .returning(|_| Ok(json_reply(200, json!({ "content": "hello" }))));

        let client = ChatClient::new(Arc::new(endpoint));
        assert_eq!(client.send_message("hi", None, None, None).await, "hi");

        let profile = UserProfile {
            education_level: EducationLevel::HighSchool,
            learning_style: String::new(),
            interests: vec![],
            additional_info: String::new(),
        };
        let reply = client
            .send_message("hi", Some("o3-mini"), Some("prompt"), Some(&profile))
            .await;
        assert_eq!(reply, "hello");
        assert!(client.last_error().is_none());
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn failed_to_fetch_is_connectivity() {
        let client = client_returning(Err(ClientError::Network(
            "TypeError: Failed to fetch".to_string(),
        )));
        let reply = client.send_message("hello", None, None, None).await;
        assert_eq!(reply, CONNECTIVITY_REPLY);
        assert!(client.last_error().is_some_and(|e| e.is_connectivity()));
    }

    #[tokio::test]
    async fn other_network_failures_are_generic() {
        let client = client_returning(Err(ClientError::Network("body decode failed".to_string())));
        let reply = client.send_message("hello", None, None, None).await;
        assert_eq!(
            reply,
            "I'm sorry, I couldn't process your request due to a technical issue. Please try again later. (Error: body decode failed)"
        );
    }

    #[tokio::test]
    async fn server_error_joins_error_and_message() {
        let client = client_returning(Ok(json_reply(
            500,
            json!({ "error": "OpenAI API error", "message": "quota exceeded", "type": "insufficient_quota" }),
        )));
        let reply = client.send_message("hello", None, None, None).await;
        assert!(reply.ends_with("(Error: OpenAI API error - quota exceeded)"));
        assert_eq!(
            client.last_error(),
            Some(ClientError::Server("OpenAI API error - quota exceeded".to_string()))
        );
    }

    #[tokio::test]
    async fn server_error_without_body_fields_uses_status() {
        let client = client_returning(Ok(json_reply(502, json!({}))));
        let reply = client.send_message("hello", None, None, None).await;
        assert!(reply.ends_with("(Error: Server error: 502)"));
    }

    #[tokio::test]
    async fn non_json_error_is_truncated() {
        let html = "x".repeat(150);
        let client = client_returning(Ok(EndpointReply {
            status: 504,
            content_type: Some("text/html".to_string()),
            body: html,
        }));
        let reply = client.send_message("hello", None, None, None).await;
        let expected = format!("Server returned non-JSON response: {}...", "x".repeat(100));
        assert!(reply.ends_with(&format!("(Error: {expected})")));
    }

    #[tokio::test]
    async fn success_without_content_uses_fallback() {
        let client = client_returning(Ok(json_reply(200, json!({ "other": 1 }))));
        let reply = client.send_message("hello", None, None, None).await;
        assert_eq!(reply, FALLBACK_CONTENT);
        assert!(client.last_error().is_none());
    }

    #[tokio::test]
    async fn diagnostics_report_url_and_last_failure() {
        let mut config = Config::default();
        config.client.api_url = "http://127.0.0.1:9/api/chat".to_string();
        let client = ChatClient::from_config(&config).unwrap();
        let before = client.diagnostics();
        assert_eq!(before.api_url.as_deref(), Some("http://127.0.0.1:9/api/chat"));
        assert!(!before.loading);
        assert!(!before.test_mode);
        assert_eq!(before.last_error, None);

        let client = client_returning(Ok(json_reply(503, json!({ "error": "busy" }))));
        client.send_message("hello", None, None, None).await;
        let after = client.diagnostics();
        assert_eq!(after.api_url, None);
        assert_eq!(after.last_error, Some(ClientError::Server("busy".to_string())));
    }

    #[tokio::test]
    async fn test_mode_skips_the_network() {
        let endpoint = MockChatEndpoint::new();
        let client = ChatClient::new(Arc::new(endpoint)).with_test_mode(Duration::from_millis(1));
        let reply = client.send_message("what is pi?", None, None, None).await;
        assert_eq!(reply, "This is a test response. You asked: \"what is pi?\"");
    }

    struct SlowEndpoint;

    #[async_trait]
    impl ChatEndpoint for SlowEndpoint {
        async fn post_chat(&self, _body: &ChatRequestBody) -> Result<EndpointReply, ClientError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json_reply(200, json!({ "content": "done" })))
        }
    }

    #[tokio::test]
    async fn loading_flag_spans_the_call() {
        let client = ChatClient::new(Arc::new(SlowEndpoint));
        assert!(!client.is_loading());

        let observer = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.is_loading()
        };
        let (reply, loading_mid_call) =
            tokio::join!(client.send_message("hi", None, None, None), observer);

        assert_eq!(reply, "done");
        assert!(loading_mid_call);
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn unreachable_server_gets_connectivity_reply() {
        // Reserve a port, then free it so nothing is listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint =
            HttpChatEndpoint::new(format!("http://{addr}/api/chat"), Duration::from_secs(5)).unwrap();
        let client = ChatClient::new(Arc::new(endpoint));
        let reply = client.send_message("hello", None, None, None).await;
        assert_eq!(reply, CONNECTIVITY_REPLY);
        assert!(matches!(client.last_error(), Some(ClientError::Unreachable(_))));
    }

    #[tokio::test]
    async fn round_trip_through_the_relay() {
        let mut transport = MockTransport::new();
        transport
            .expect_chat()
            .times(1)
            .withf(|req| {
                req.model == "o1"
                    && req.messages[0].role == Role::Developer
                    && req.max_completion_tokens == Some(800)
                    && req.temperature.is_none()
            })
            .returning(|_| {
                Ok(CompletionResponse {
                    choices: vec![Choice {
                        message: Some(CompletionMessage {
                            content: Some("x = 5".to_string()),
                        }),
                    }],
                })
            });

        let service = ChatService::new(Some(Arc::new(transport) as Arc<dyn Transport>));
        let app = router(AppState::new(service, Arc::new(Config::default())));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoint =
            HttpChatEndpoint::new(format!("http://{addr}/api/chat"), Duration::from_secs(5)).unwrap();
        let client = ChatClient::new(Arc::new(endpoint));
        let reply = client
            .send_message("solve x + 5 = 10", Some("o1"), None, None)
            .await;
        assert_eq!(reply, "x = 5");
    }

    #[tokio::test]
    async fn relay_validation_error_surfaces_in_generic_reply() {
        let app = router(AppState::new(ChatService::new(None), Arc::new(Config::default())));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoint =
            HttpChatEndpoint::new(format!("http://{addr}/api/chat"), Duration::from_secs(5)).unwrap();
        let client = ChatClient::new(Arc::new(endpoint));
        let reply = client.send_message("hello", None, None, None).await;
        assert!(reply.ends_with("(Error: Server configuration error: API key is not set)"));
    }
}
