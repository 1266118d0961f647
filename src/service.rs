use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{ChatRequest, ChatRequestBody};
use crate::params::{ParameterSet, Rejection};
use crate::prompt::assemble_system_prompt;
use crate::transport::Transport;

pub const FALLBACK_CONTENT: &str = "Sorry, I couldn't generate a response.";

/// Parse and validate a raw `/api/chat` body.
///
/// Fields are checked in the order `message`, `modelId`, `systemPrompt`;
/// empty strings count as missing.
pub fn validate_request(body: &[u8]) -> Result<ChatRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("Request body is empty".to_string()));
    }

    let parsed: Option<ChatRequestBody> = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let Some(body) = parsed else {
        return Err(ApiError::BadRequest("Request body is empty".to_string()));
    };

    fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
        value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
    }

    Ok(ChatRequest {
        message: required(body.message, "message")?,
        model_id: required(body.model_id, "modelId")?,
        system_prompt: required(body.system_prompt, "systemPrompt")?,
        user_profile: body.user_profile,
        uses_completion_tokens: body.uses_completion_tokens.unwrap_or(false),
    })
}

/// Stateless relay between validated chat requests and the completion provider
#[derive(Clone)]
pub struct ChatService {
    transport: Option<Arc<dyn Transport>>,
}

impl ChatService {
    /// `None` means no API key is configured; every request then answers 500.
    pub fn new(transport: Option<Arc<dyn Transport>>) -> Self {
        Self { transport }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn respond(&self, request: &ChatRequest) -> Result<String, ApiError> {
        let Some(transport) = self.transport.as_ref() else {
            tracing::error!("OPENAI_API_KEY is not set; rejecting chat request");
            return Err(ApiError::MissingApiKey);
        };

        let system_prompt =
            assemble_system_prompt(&request.system_prompt, request.user_profile.as_ref());
        let params = ParameterSet::for_model(&request.model_id, request.uses_completion_tokens);

        tracing::info!(
            model = %request.model_id,
            uses_completion_tokens = request.uses_completion_tokens,
            role = ?params.prompt_role,
            token_field = ?params.token_field,
            "Calling completion provider"
        );

        let first = params.build_request(&request.model_id, &system_prompt, &request.message);
        let err = match transport.chat(&first).await {
            Ok(response) => return Ok(content_or_fallback(response.first_content())),
            Err(e) => e,
        };

        tracing::warn!(error = %err, code = ?err.code, param = ?err.param, "Completion provider rejected request");

        let Some(rejection) = Rejection::classify(&err) else {
            return Err(ApiError::Upstream(err));
        };

        let retry_params = params.corrected_for(rejection);
        tracing::info!(
            ?rejection,
            role = ?retry_params.prompt_role,
            token_field = ?retry_params.token_field,
            temperature = ?retry_params.temperature,
            "Retrying once with corrected parameters"
        );

        let retry = retry_params.build_request(&request.model_id, &system_prompt, &request.message);
        match transport.chat(&retry).await {
            Ok(response) => {
                tracing::info!("Completion provider accepted retry");
                Ok(content_or_fallback(response.first_content()))
            }
            Err(retry_err) => {
                tracing::error!(error = %retry_err, "Retry also failed");
                Err(ApiError::UpstreamRetry(retry_err))
            }
        }
    }
}

fn content_or_fallback(content: Option<&str>) -> String {
    content.unwrap_or(FALLBACK_CONTENT).to_string()
}
