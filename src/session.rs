//! One student's chat session: the selected persona and model, the visible
//! history, and persistence of both history and the message ledger.

use std::sync::Arc;

use crate::catalog::{AI_MODELS, AiModel, PERSONAS, Persona, find_model, find_persona};
use crate::client::{ChatClient, ClientDiagnostics};
use crate::error::{Result, StudyError};
use crate::models::{StoredMessage, UserProfile};
use crate::progress::{AchievementProgress, ProgressSummary, achievement_progress, summarize};
use crate::storage::StudyStorage;

pub struct StudySession {
    client: Arc<ChatClient>,
    storage: StudyStorage,
    persona: &'static Persona,
    model: &'static AiModel,
    messages: Vec<StoredMessage>,
}

impl StudySession {
    /// Starts on the first persona and model; call [`open_persona`](Self::open_persona) to load history
    pub fn new(client: Arc<ChatClient>, storage: StudyStorage) -> Self {
        Self {
            client,
            storage,
            persona: &PERSONAS[0],
            model: &AI_MODELS[0],
            messages: Vec::new(),
        }
    }

    pub fn persona(&self) -> &'static Persona {
        self.persona
    }

    pub fn model(&self) -> &'static AiModel {
        self.model
    }

    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    pub fn diagnostics(&self) -> ClientDiagnostics {
        self.client.diagnostics()
    }

    /// Switch to `persona_id` and load its saved history.
    ///
    /// An empty history is seeded with the persona's welcome message, which
    /// is only written to storage with the first sent message.
    pub async fn open_persona(&mut self, persona_id: &str) -> Result<()> {
        let persona = find_persona(persona_id)
            .ok_or_else(|| StudyError::NotFound(format!("persona '{persona_id}'")))?;

        let mut messages = self.storage.get_chats(persona.id).await?;
        if messages.is_empty() {
            messages.push(StoredMessage::assistant(persona.welcome_message()));
        }

        tracing::debug!(persona = persona.id, messages = messages.len(), "Opened persona");
        self.persona = persona;
        self.messages = messages;
        Ok(())
    }

    pub async fn select_persona(&mut self, persona_id: &str) -> Result<&'static Persona> {
        self.open_persona(persona_id).await?;
        Ok(self.persona)
    }

    pub fn select_model(&mut self, model_id: &str) -> Result<&'static AiModel> {
        let model = find_model(model_id)
            .ok_or_else(|| StudyError::NotFound(format!("model '{model_id}'")))?;
        self.model = model;
        Ok(model)
    }

    /// Send one turn. Blank input is ignored and yields `None`.
    ///
    /// An unreadable ledger or profile does not stop the turn: the count is
    /// skipped and the prompt goes out without student context.
    pub async fn send(&mut self, text: &str) -> Result<Option<String>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let persona_id = self.persona.id;
        self.messages.push(StoredMessage::user(text));
        if let Err(e) = self.storage.increment_message_count(persona_id).await {
            tracing::warn!(persona = persona_id, "Failed to update message count: {}", e);
        }
        self.storage.save_chats(persona_id, &self.messages).await?;

        let profile = self.storage.get_user_profile().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read user profile, sending without it: {}", e);
            None
        });
        let reply = self
            .client
            .send_message(
                text,
                Some(self.model.id),
                Some(self.persona.system_prompt),
                profile.as_ref(),
            )
            .await;

        self.messages.push(StoredMessage::assistant(reply.clone()));
        self.storage.save_chats(persona_id, &self.messages).await?;
        Ok(Some(reply))
    }

    /// Switch to `persona_id` and send its sample question at `index`
    pub async fn ask_sample(&mut self, persona_id: &str, index: usize) -> Result<Option<String>> {
        let persona = find_persona(persona_id)
            .ok_or_else(|| StudyError::NotFound(format!("persona '{persona_id}'")))?;
        let question = persona.sample_questions.get(index).ok_or_else(|| {
            StudyError::NotFound(format!(
                "sample question {} for persona '{}' (it has {})",
                index + 1,
                persona.id,
                persona.sample_questions.len()
            ))
        })?;

        if self.persona.id != persona.id {
            self.open_persona(persona.id).await?;
        }
        self.send(question).await
    }

    pub async fn user_profile(&self) -> Result<Option<UserProfile>> {
        self.storage.get_user_profile().await
    }

    pub async fn save_user_profile(&self, profile: &UserProfile) -> Result<()> {
        self.storage.save_user_profile(profile).await
    }

    /// Achievement progress with the current persona
    pub async fn progress(&self) -> Result<AchievementProgress> {
        let counts = self.storage.get_message_counts().await?;
        let count = counts.get(self.persona.id).copied().unwrap_or(0);
        Ok(achievement_progress(count))
    }

    pub async fn summary(&self) -> Result<ProgressSummary> {
        Ok(summarize(&self.storage.get_message_counts().await?))
    }

    /// Wipe all stored data and start the current persona over
    pub async fn reset(&mut self) -> Result<()> {
        self.storage.clear_all_data().await?;
        let persona_id = self.persona.id;
        self.open_persona(persona_id).await
    }
}
