//! crates/notatnik_core/src/coach/mod.rs
//!
//! The AI coach: turns a note, the user's message and the conversation so far
//! into a single generation request against the selected model.

pub mod prompt;
pub mod selector;

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::ChatTurn;
use crate::ports::{ModelInfo, ProviderError};
pub use prompt::build_coach_prompt;
pub use selector::{ModelSelector, DEFAULT_CANDIDATE_MODELS};

/// Failures surfaced to callers of the coach.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoachError {
    #[error("The AI service is not configured")]
    NotConfigured,
    #[error("The AI provider rejected the API key")]
    InvalidCredential,
    #[error("The AI provider request quota was exceeded")]
    QuotaExceeded,
    #[error("AI model '{model}' is not available. {hint}")]
    ModelNotFound { model: String, hint: String },
    #[error("The AI service failed to respond, please try again")]
    Transient(String),
}

impl From<ProviderError> for CoachError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredential => CoachError::InvalidCredential,
            ProviderError::QuotaExceeded => CoachError::QuotaExceeded,
            ProviderError::ModelNotFound(model) => CoachError::ModelNotFound {
                model,
                hint: "Select one of the candidate models reported by the AI models endpoint."
                    .to_string(),
            },
            ProviderError::Other(detail) => CoachError::Transient(detail),
        }
    }
}

/// Snapshot of the coach configuration for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachStatus {
    pub available: bool,
    pub preferred_model: String,
    pub active_model: Option<String>,
    pub candidate_models: Vec<String>,
}

#[derive(Clone)]
pub struct CoachService {
    selector: Option<Arc<ModelSelector>>,
    configured_model: String,
}

impl CoachService {
    /// A coach backed by a model selector.
    pub fn new(selector: Arc<ModelSelector>, configured_model: String) -> Self {
        Self {
            selector: Some(selector),
            configured_model,
        }
    }

    /// A coach without an API credential; every request fails with `NotConfigured`.
    pub fn unavailable(configured_model: String) -> Self {
        Self {
            selector: None,
            configured_model,
        }
    }

    pub fn is_available(&self) -> bool {
        self.selector.is_some()
    }

    fn selector(&self) -> Result<&ModelSelector, CoachError> {
        self.selector.as_deref().ok_or(CoachError::NotConfigured)
    }

    /// Probes the configured model, falling back through the candidates.
    pub async fn initialize(&self) -> Result<String, CoachError> {
        Ok(self.selector()?.initialize().await?)
    }

    pub async fn status(&self) -> CoachStatus {
        match &self.selector {
            Some(selector) => CoachStatus {
                available: true,
                preferred_model: selector.preferred_model().await,
                active_model: selector.active_model().await,
                candidate_models: selector.candidates().to_vec(),
            },
            None => CoachStatus {
                available: false,
                preferred_model: self.configured_model.clone(),
                active_model: None,
                candidate_models: Vec::new(),
            },
        }
    }

    /// Switches the preferred model at runtime and returns the model now active.
    pub async fn select_model(&self, model: &str) -> Result<String, CoachError> {
        let active = self.selector()?.set_preferred(model).await?;
        info!(requested = model, active = %active, "coach model switched");
        Ok(active)
    }

    /// Models the provider reports as reachable with the configured key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, CoachError> {
        Ok(self.selector()?.list_models().await?)
    }

    /// Sends `prompt` straight to `model`, bypassing fallback and leaving the
    /// active model unchanged.
    pub async fn try_model(&self, model: &str, prompt: &str) -> Result<String, CoachError> {
        let text = self.selector()?.generate_with(model, prompt).await?;
        info!(model, "direct model test succeeded");
        Ok(text)
    }

    pub async fn get_chat_response(
        &self,
        note_title: &str,
        note_content: &str,
        user_message: &str,
        history: &[ChatTurn],
    ) -> Result<String, CoachError> {
        let selector = self.selector()?;
        let prompt = build_coach_prompt(note_title, note_content, user_message, history);

        let text = selector.generate(&prompt).await.map_err(|e| {
            error!(error = %e, "coach generation failed");
            CoachError::from(e)
        })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(CoachError::Transient("empty response".to_string()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sender;
    use crate::mock::ScriptedModel;

    fn coach(model: Arc<ScriptedModel>) -> CoachService {
        let selector = ModelSelector::new(
            model,
            "primary".to_string(),
            vec!["backup".to_string()],
        );
        CoachService::new(Arc::new(selector), "primary".to_string())
    }

    #[tokio::test]
    async fn unavailable_coach_reports_not_configured() {
        let coach = CoachService::unavailable("gemini-1.5-flash".to_string());
        assert!(!coach.is_available());
        assert_eq!(
            coach.get_chat_response("t", "c", "m", &[]).await,
            Err(CoachError::NotConfigured)
        );
        let status = coach.status().await;
        assert!(!status.available);
        assert_eq!(status.preferred_model, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn chat_response_sends_the_built_prompt() {
        let model = Arc::new(ScriptedModel::new());
        let coach = coach(model.clone());
        let history = vec![ChatTurn {
            sender: Sender::User,
            text: "earlier".to_string(),
        }];

        let reply = coach
            .get_chat_response("Title", "Body", "Now?", &history)
            .await
            .unwrap();

        assert_eq!(reply, "primary says: ok");
        let (model_name, prompt) = model.calls().await.pop().unwrap();
        assert_eq!(model_name, "primary");
        assert_eq!(prompt, build_coach_prompt("Title", "Body", "Now?", &history));
    }

    #[tokio::test]
    async fn provider_failures_map_to_the_coach_taxonomy() {
        let model = Arc::new(ScriptedModel::new());
        let coach = coach(model.clone());
        coach.initialize().await.unwrap();

        model.fail_next("primary", ProviderError::QuotaExceeded).await;
        assert_eq!(
            coach.get_chat_response("t", "c", "m", &[]).await,
            Err(CoachError::QuotaExceeded)
        );

        model
            .fail_next("primary", ProviderError::Other("boom".into()))
            .await;
        assert!(matches!(
            coach.get_chat_response("t", "c", "m", &[]).await,
            Err(CoachError::Transient(_))
        ));

        model
            .break_model("primary", ProviderError::ModelNotFound("primary".into()))
            .await;
        model
            .break_model("backup", ProviderError::ModelNotFound("backup".into()))
            .await;
        assert!(matches!(
            coach.get_chat_response("t", "c", "m", &[]).await,
            Err(CoachError::ModelNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn status_reflects_the_selector() {
        let model = Arc::new(ScriptedModel::new());
        let coach = coach(model);
        assert_eq!(coach.select_model("backup").await.unwrap(), "backup");

        let status = coach.status().await;
        assert!(status.available);
        assert_eq!(status.preferred_model, "backup");
        assert_eq!(status.active_model.as_deref(), Some("backup"));
        assert_eq!(status.candidate_models, vec!["backup".to_string()]);
    }

    #[tokio::test]
    async fn listing_and_direct_tests_need_a_configured_coach() {
        let coach = CoachService::unavailable("gemini-1.5-flash".to_string());
        assert_eq!(coach.list_models().await, Err(CoachError::NotConfigured));
        assert_eq!(
            coach.try_model("gemini-pro", "ping").await,
            Err(CoachError::NotConfigured)
        );
    }

    #[tokio::test]
    async fn listing_reports_the_provider_catalog() {
        let model = Arc::new(ScriptedModel::new());
        model.set_catalog(&["primary", "backup"]).await;
        let coach = coach(model.clone());

        let names: Vec<String> = coach
            .list_models()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["primary", "backup"]);

        model.fail_listing(ProviderError::InvalidCredential).await;
        assert_eq!(coach.list_models().await, Err(CoachError::InvalidCredential));
    }

    #[tokio::test]
    async fn direct_model_test_maps_provider_failures() {
        let model = Arc::new(ScriptedModel::new());
        let coach = coach(model.clone());
        assert_eq!(coach.try_model("other", "ping").await.unwrap(), "other says: ok");

        model
            .break_model("gone", ProviderError::ModelNotFound("gone".into()))
            .await;
        assert!(matches!(
            coach.try_model("gone", "ping").await,
            Err(CoachError::ModelNotFound { model, .. }) if model == "gone"
        ));
        assert_eq!(coach.status().await.active_model, None);
    }
}
