use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{Method, StatusCode},
};

use super::AppState;
use crate::error::ApiError;
use crate::models::ChatReply;
use crate::service::validate_request;

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let body = body.map_err(|rejection| {
        tracing::warn!("Rejected chat request body: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;
    let request = validate_request(&body)?;
    tracing::info!(
        model = %request.model_id,
        has_profile = request.user_profile.is_some(),
        "Received chat request"
    );

    // Run on its own task so a panic below still produces a JSON 500
    let service = state.service.clone();
    let content = tokio::spawn(async move { service.respond(&request).await })
        .await
        .map_err(|e| {
            tracing::error!("Unexpected error processing chat request: {}", e);
            ApiError::Internal(e.to_string())
        })??;

    Ok(Json(ChatReply { content }))
}

/// Any method on `/api/chat` other than `POST` and `OPTIONS`
pub async fn method_not_allowed(method: Method) -> ApiError {
    tracing::info!("Received {} request, only POST allowed", method);
    ApiError::MethodNotAllowed(method)
}
