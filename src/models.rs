use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Provider error codes arrive as strings, integers or null depending on the backend
pub(crate) fn deserialize_flexible_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleCode {
        Int(i64),
        Float(f64),
        String(String),
    }

    let value = Option::<FlexibleCode>::deserialize(deserializer)?;
    Ok(value.map(|code| match code {
        FlexibleCode::Int(i) => i.to_string(),
        FlexibleCode::Float(f) => f.to_string(),
        FlexibleCode::String(s) => s,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    University,
    Professional,
}

impl EducationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "high_school",
            EducationLevel::University => "university",
            EducationLevel::Professional => "professional",
        }
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EducationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high_school" | "high school" => Ok(EducationLevel::HighSchool),
            "university" => Ok(EducationLevel::University),
            "professional" => Ok(EducationLevel::Professional),
            other => Err(format!("unknown education level: {other}")),
        }
    }
}

/// Student profile appended to the system prompt as plain text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub education_level: EducationLevel,
    #[serde(default)]
    pub learning_style: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub additional_info: String,
}

/// Body of `POST /api/chat` as it travels on the wire.
///
/// Every field is optional here so the endpoint can report which one is
/// missing instead of failing deserialization as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses_completion_tokens: Option<bool>,
}

/// A chat request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub model_id: String,
    pub system_prompt: String,
    pub user_profile: Option<UserProfile>,
    pub uses_completion_tokens: bool,
}

/// Success body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry of a persona's stored chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Assistant)
    }
}

// Completion provider message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
}

// Completion provider chat message format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn text() -> Self {
        Self {
            kind: "text".to_string(),
        }
    }
}

// Completion provider request format. Exactly one of the token fields is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

// Completion provider response format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Text of the first choice, if the provider produced any
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_uses_camel_case_fields() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "educationLevel": "high_school",
            "learningStyle": "visual",
            "interests": ["math"],
            "additionalInfo": ""
        }))
        .unwrap();
        assert_eq!(profile.education_level, EducationLevel::HighSchool);
        assert_eq!(profile.interests, vec!["math".to_string()]);
    }

    #[test]
    fn completion_request_omits_unset_fields() {
        let req = CompletionRequest {
            model: "o1".to_string(),
            messages: vec![ChatMessage {
                role: Role::Developer,
                content: "be brief".to_string(),
            }],
            temperature: None,
            max_tokens: None,
            max_completion_tokens: Some(800),
            response_format: ResponseFormat::text(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["max_completion_tokens"], 800);
        assert_eq!(json["messages"][0]["role"], "developer");
        assert_eq!(json["response_format"]["type"], "text");
    }

    #[test]
    fn first_content_skips_null_and_empty() {
        let null: CompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        }))
        .unwrap();
        assert_eq!(null.first_content(), None);

        let empty: CompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": "" } }]
        }))
        .unwrap();
        assert_eq!(empty.first_content(), None);

        let none: CompletionResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(none.first_content(), None);
    }
}
