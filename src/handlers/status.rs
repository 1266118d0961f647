use axum::{
    Json,
    extract::State,
    http::{HeaderMap, Method, Uri, header},
};
use chrono::Utc;
use serde::Serialize;

use super::AppState;
use super::cors::{ALLOW_METHODS, ALLOW_ORIGIN};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub api_key_configured: bool,
    pub version: &'static str,
    pub cors: CorsReport,
    pub request: RequestReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsReport {
    pub allow_origin: &'static str,
    pub allow_methods: &'static str,
    pub allow_credentials: bool,
}

#[derive(Debug, Serialize)]
pub struct RequestReport {
    pub method: String,
    pub url: String,
    pub headers: EchoedHeaders,
}

#[derive(Debug, Serialize)]
pub struct EchoedHeaders {
    pub origin: Option<String>,
    pub referer: Option<String>,
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
    #[serde(rename = "content-type")]
    pub content_type: Option<String>,
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `/api/test`: diagnostic payload for any method except the `OPTIONS` preflight
pub async fn status(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<StatusReport> {
    tracing::info!("Test endpoint called with method: {}", method);
    let api_key_configured = state.service.is_configured();

    Json(StatusReport {
        status: "ok",
        message: "StudyFast API is running",
        timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        environment: state.config.server.environment.clone(),
        api_key_configured,
        version: env!("CARGO_PKG_VERSION"),
        cors: CorsReport {
            allow_origin: ALLOW_ORIGIN,
            allow_methods: ALLOW_METHODS,
            allow_credentials: true,
        },
        request: RequestReport {
            method: method.to_string(),
            url: uri.to_string(),
            headers: EchoedHeaders {
                origin: header_value(&headers, header::ORIGIN),
                referer: header_value(&headers, header::REFERER),
                user_agent: header_value(&headers, header::USER_AGENT),
                content_type: header_value(&headers, header::CONTENT_TYPE),
            },
        },
    })
}
