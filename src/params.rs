//! Per-model request shaping for the completion provider.
//!
//! Reasoning models (`o1`, `o3-mini`) reject `max_tokens`, the `system`
//! role and any temperature. When the provider reports one of those
//! mismatches, [`Rejection`] names it and [`ParameterSet::corrected_for`]
//! yields the parameters for the single retry.

use crate::catalog::uses_special_params;
use crate::models::{ChatMessage, CompletionRequest, ResponseFormat, Role};
use crate::transport::UpstreamError;

pub const MAX_OUTPUT_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenField {
    MaxTokens,
    MaxCompletionTokens,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub prompt_role: Role,
    pub token_field: TokenField,
    pub temperature: Option<f32>,
}

impl ParameterSet {
    /// Initial parameters for `model_id`
    pub fn for_model(model_id: &str, uses_completion_tokens: bool) -> Self {
        if uses_special_params(model_id) || uses_completion_tokens {
            Self {
                prompt_role: Role::Developer,
                token_field: TokenField::MaxCompletionTokens,
                temperature: None,
            }
        } else {
            Self {
                prompt_role: Role::System,
                token_field: TokenField::MaxTokens,
                temperature: Some(DEFAULT_TEMPERATURE),
            }
        }
    }

    /// Parameters for the retry after the provider rejected `self`
    pub fn corrected_for(self, rejection: Rejection) -> Self {
        match rejection {
            Rejection::Temperature => Self {
                temperature: None,
                ..self
            },
            Rejection::TokenField => Self {
                prompt_role: Role::Developer,
                token_field: TokenField::MaxCompletionTokens,
                temperature: None,
            },
            Rejection::Role => Self {
                prompt_role: Role::Developer,
                ..self
            },
        }
    }

    pub fn build_request(&self, model_id: &str, system_prompt: &str, message: &str) -> CompletionRequest {
        let (max_tokens, max_completion_tokens) = match self.token_field {
            TokenField::MaxTokens => (Some(MAX_OUTPUT_TOKENS), None),
            TokenField::MaxCompletionTokens => (None, Some(MAX_OUTPUT_TOKENS)),
        };

        CompletionRequest {
            model: model_id.to_string(),
            messages: vec![
                ChatMessage {
                    role: self.prompt_role,
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: message.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens,
            max_completion_tokens,
            response_format: ResponseFormat::text(),
        }
    }
}

/// Provider errors that earn exactly one corrected retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Temperature,
    TokenField,
    Role,
}

impl Rejection {
    /// Classify an upstream failure.
    ///
    /// The structured `param` field wins when the provider sends one.
    /// Otherwise the message text is matched in a fixed order, which keeps
    /// compatibility with providers that only report prose.
    pub fn classify(err: &UpstreamError) -> Option<Self> {
        if let Some(param) = err.param.as_deref() {
            match param {
                "temperature" => return Some(Rejection::Temperature),
                "max_tokens" | "max_completion_tokens" => return Some(Rejection::TokenField),
                p if p.starts_with("messages") && p.ends_with(".role") => {
                    return Some(Rejection::Role);
                }
                _ => {}
            }
        }
        Self::from_message(&err.message)
    }

    pub fn from_message(message: &str) -> Option<Self> {
        if message.contains("temperature") {
            Some(Rejection::Temperature)
        } else if message.contains("max_tokens") && message.contains("max_completion_tokens") {
            Some(Rejection::TokenField)
        } else if message.contains("system") && message.contains("developer") {
            Some(Rejection::Role)
        } else {
            None
        }
    }
}
