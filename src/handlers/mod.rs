/// HTTP handlers for the chat relay
pub mod chat;
pub mod cors;
pub mod status;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::config::Config;
use crate::service::ChatService;

/// Largest accepted request body; bigger bodies get a JSON 413
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: ChatService, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/chat",
            post(chat::chat)
                .options(cors::preflight)
                .fallback(chat::method_not_allowed),
        )
        .route(
            "/api/test",
            get(status::status)
                .options(cors::preflight)
                .fallback(status::status),
        )
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(cors::apply_cors_headers))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, CompletionMessage, CompletionRequest, CompletionResponse};
    use crate::transport::{MockTransport, Transport, UpstreamError};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct PanickingTransport;

    #[async_trait::async_trait]
    impl Transport for PanickingTransport {
        async fn chat(&self, _req: &CompletionRequest) -> Result<CompletionResponse, UpstreamError> {
            panic!("transport exploded")
        }
    }

    fn app_with(transport: Option<Arc<dyn Transport>>) -> Router {
        let mut config = Config::default();
        config.server.environment = "test".to_string();
        router(AppState::new(ChatService::new(transport), Arc::new(config)))
    }

    fn app(mock: Option<MockTransport>) -> Router {
        app_with(mock.map(|t| Arc::new(t) as Arc<dyn Transport>))
    }

    fn post_chat(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn read_body(response: axum::response::Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&read_body(response).await).unwrap()
    }

    fn assert_cors(response: &axum::response::Response) {
        let h = response.headers();
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_METHODS], cors::ALLOW_METHODS);
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(h.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }

    fn valid_body() -> String {
        json!({
            "message": "What is photosynthesis?",
            "modelId": "gpt-4o",
            "systemPrompt": "You are Dr. Darwin."
        })
        .to_string()
    }

    #[tokio::test]
    async fn options_preflight_is_empty_200_with_cors() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/chat")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            let response = app(None)
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri("/api/chat")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_cors(&response);
            let body = read_json(response).await;
            assert_eq!(body["error"], "Method not allowed");
            assert_eq!(body["method"], method.as_str());
        }
    }

    #[tokio::test]
    async fn missing_message_is_400() {
        let body = json!({ "modelId": "gpt-4o", "systemPrompt": "s" }).to_string();
        let response = app(None).oneshot(post_chat(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_cors(&response);
        assert_eq!(read_json(response).await["error"], "message is required");
    }

    #[tokio::test]
    async fn missing_body_is_400() {
        let response = app(None).oneshot(post_chat(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "Request body is empty");
    }

    #[tokio::test]
    async fn oversized_body_is_json_413() {
        let body = format!(r#"{{"message":"{}"}}"#, "a".repeat(MAX_BODY_BYTES));
        let response = app(None).oneshot(post_chat(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_cors(&response);
        assert_eq!(read_json(response).await["error"], "Request body too large");
    }

    #[tokio::test]
    async fn missing_api_key_is_500() {
        let response = app(None).oneshot(post_chat(valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await["error"],
            "Server configuration error: API key is not set"
        );
    }

    #[tokio::test]
    async fn success_wraps_content() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(1).returning(|_| {
            Ok(CompletionResponse {
                choices: vec![Choice {
                    message: Some(CompletionMessage {
                        content: Some("Plants turn light into sugar.".to_string()),
                    }),
                }],
            })
        });

        let response = app(Some(mock)).oneshot(post_chat(valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        assert_eq!(
            read_json(response).await,
            json!({ "content": "Plants turn light into sugar." })
        );
    }

    #[tokio::test]
    async fn empty_completion_uses_fallback_text() {
        let mut mock = MockTransport::new();
        mock.expect_chat()
            .times(1)
            .returning(|_| Ok(CompletionResponse::default()));

        let response = app(Some(mock)).oneshot(post_chat(valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await["content"],
            "Sorry, I couldn't generate a response."
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_500_with_details() {
        let mut mock = MockTransport::new();
        mock.expect_chat().times(1).returning(|_| {
            Err(UpstreamError {
                message: "You exceeded your current quota".to_string(),
                error_type: Some("insufficient_quota".to_string()),
                code: Some("insufficient_quota".to_string()),
                param: None,
                status: Some(429),
            })
        });

        let response = app(Some(mock)).oneshot(post_chat(valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "OpenAI API error");
        assert_eq!(body["message"], "You exceeded your current quota");
        assert_eq!(body["type"], "insufficient_quota");
        assert_eq!(body["code"], "insufficient_quota");
    }

    #[tokio::test]
    async fn panic_in_service_still_answers_json_500() {
        let response = app_with(Some(Arc::new(PanickingTransport)))
            .oneshot(post_chat(valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(
            body["error"],
            "An unexpected error occurred while processing your request"
        );
    }

    #[tokio::test]
    async fn status_endpoint_reports_configuration() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/api/test?check=1")
                    .header(header::USER_AGENT, "study-tests")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        let body = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["environment"], "test");
        assert_eq!(body["apiKeyConfigured"], false);
        assert_eq!(body["cors"]["allowCredentials"], true);
        assert_eq!(body["request"]["method"], "GET");
        assert_eq!(body["request"]["url"], "/api/test?check=1");
        assert_eq!(body["request"]["headers"]["user-agent"], "study-tests");
        assert!(body["request"]["headers"]["origin"].is_null());
        assert!(body.get("env").is_none());
    }

    #[tokio::test]
    async fn status_answers_post_and_preflight() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["request"]["method"], "POST");

        let response = app(None)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(read_body(response).await.is_empty());
    }
}
