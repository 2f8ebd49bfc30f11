//! crates/notatnik_core/src/coach/selector.rs
//!
//! Runtime selection of the generative model.
//!
//! The selector owns the preferred model, the ordered candidate list and the
//! currently active model. It is built once per process and shared through
//! `Arc`. Scans (probing candidates one by one) are serialized by `scan`; a
//! caller that waited for another caller's scan reuses its outcome instead of
//! probing again.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::prompt::PROBE_PROMPT;
use crate::ports::{GenerativeModel, ModelInfo, ProviderError};

/// Fallback models, most preferred first.
pub const DEFAULT_CANDIDATE_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-flash-8b",
    "gemini-2.0-flash",
    "gemini-1.5-pro",
    "gemini-pro",
];

pub struct ModelSelector {
    client: Arc<dyn GenerativeModel>,
    preferred: RwLock<String>,
    candidates: Vec<String>,
    active: RwLock<Option<String>>,
    scan: Mutex<()>,
}

impl ModelSelector {
    pub fn new(
        client: Arc<dyn GenerativeModel>,
        preferred: String,
        candidates: Vec<String>,
    ) -> Self {
        Self {
            client,
            preferred: RwLock::new(preferred),
            candidates,
            active: RwLock::new(None),
            scan: Mutex::new(()),
        }
    }

    pub async fn active_model(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    pub async fn preferred_model(&self) -> String {
        self.preferred.read().await.clone()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Probes the preferred model and, if it fails, walks the candidate list.
    /// Returns the adopted model.
    pub async fn initialize(&self) -> Result<String, ProviderError> {
        let _scan = self.scan.lock().await;
        let preferred = self.preferred_model().await;

        match self.client.generate(&preferred, PROBE_PROMPT).await {
            Ok(_) => {
                self.adopt(&preferred).await;
                Ok(preferred)
            }
            Err(err) if is_fatal(&err) => {
                warn!(model = %preferred, error = %err, "model probe failed");
                *self.active.write().await = None;
                Err(err)
            }
            Err(err) => {
                warn!(
                    model = %preferred,
                    error = %err,
                    "preferred model unavailable, trying candidates"
                );
                self.walk_candidates(&preferred).await
            }
        }
    }

    /// Replaces the preferred model and re-initializes.
    pub async fn set_preferred(&self, model: &str) -> Result<String, ProviderError> {
        *self.preferred.write().await = model.to_string();
        self.initialize().await
    }

    /// Generates with the active model. If the provider reports the model as
    /// missing, performs one fallback scan and retries the request once.
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let model = match self.active_model().await {
            Some(model) => model,
            None => self.initialize().await?,
        };

        match self.client.generate(&model, prompt).await {
            Err(ProviderError::ModelNotFound(_)) => {
                warn!(model = %model, "active model disappeared, rescanning");
                let replacement = self.rescan(&model).await?;
                self.client.generate(&replacement, prompt).await
            }
            other => other,
        }
    }

    /// Models the provider reports for the configured credential.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.client.list_models().await
    }

    /// Generates with `model` directly. The active model is left untouched.
    pub async fn generate_with(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        self.client.generate(model, prompt).await
    }

    async fn rescan(&self, failed: &str) -> Result<String, ProviderError> {
        let _scan = self.scan.lock().await;
        if let Some(current) = self.active_model().await {
            if current != failed {
                // Another request already replaced the model while we waited.
                return Ok(current);
            }
        }
        self.walk_candidates(failed).await
    }

    /// Callers must hold `scan`.
    async fn walk_candidates(&self, failed: &str) -> Result<String, ProviderError> {
        let mut last_error = ProviderError::ModelNotFound(failed.to_string());

        for candidate in self.candidates.iter().filter(|c| c.as_str() != failed) {
            match self.client.generate(candidate, PROBE_PROMPT).await {
                Ok(_) => {
                    self.adopt(candidate).await;
                    return Ok(candidate.clone());
                }
                Err(err) if is_fatal(&err) => {
                    warn!(model = %candidate, error = %err, "aborting model scan");
                    last_error = err;
                    break;
                }
                Err(err) => {
                    warn!(model = %candidate, error = %err, "candidate model rejected");
                    last_error = err;
                }
            }
        }

        *self.active.write().await = None;
        Err(last_error)
    }

    async fn adopt(&self, model: &str) {
        info!(model, "adopted generative model");
        *self.active.write().await = Some(model.to_string());
    }
}

/// Errors that no other model would fix.
fn is_fatal(err: &ProviderError) -> bool {
    matches!(
        err,
        ProviderError::InvalidCredential | ProviderError::QuotaExceeded
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedModel;

    fn candidates() -> Vec<String> {
        vec!["alpha".into(), "beta".into(), "gamma".into()]
    }

    fn selector(model: Arc<ScriptedModel>, preferred: &str) -> ModelSelector {
        ModelSelector::new(model, preferred.to_string(), candidates())
    }

    #[tokio::test]
    async fn working_preferred_model_is_adopted_directly() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "preferred");

        assert_eq!(selector.initialize().await.unwrap(), "preferred");
        assert_eq!(selector.active_model().await.as_deref(), Some("preferred"));
        assert_eq!(model.models_called().await, vec!["preferred"]);
    }

    #[tokio::test]
    async fn failed_preferred_model_falls_back_to_first_working_candidate() {
        let model = Arc::new(ScriptedModel::new());
        model
            .break_model("preferred", ProviderError::ModelNotFound("preferred".into()))
            .await;
        model
            .break_model("alpha", ProviderError::Other("503".into()))
            .await;
        let selector = selector(model.clone(), "preferred");

        assert_eq!(selector.initialize().await.unwrap(), "beta");
        assert_eq!(
            model.models_called().await,
            vec!["preferred", "alpha", "beta"]
        );
    }

    #[tokio::test]
    async fn invalid_credential_stops_the_scan() {
        let model = Arc::new(ScriptedModel::new());
        model
            .break_model("preferred", ProviderError::ModelNotFound("preferred".into()))
            .await;
        model
            .break_model("alpha", ProviderError::InvalidCredential)
            .await;
        let selector = selector(model.clone(), "preferred");

        assert_eq!(
            selector.initialize().await,
            Err(ProviderError::InvalidCredential)
        );
        assert_eq!(selector.active_model().await, None);
        assert_eq!(model.models_called().await, vec!["preferred", "alpha"]);
    }

    #[tokio::test]
    async fn model_not_found_during_use_rescans_once_and_retries_once() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "alpha");
        selector.initialize().await.unwrap();

        model
            .break_model("alpha", ProviderError::ModelNotFound("alpha".into()))
            .await;
        let reply = selector.generate("hello").await.unwrap();

        assert_eq!(reply, "beta says: ok");
        assert_eq!(selector.active_model().await.as_deref(), Some("beta"));
        // probe on alpha, request on alpha, probe on beta, retried request on beta
        let calls = model.calls().await;
        let expected = vec![
            ("alpha".to_string(), PROBE_PROMPT.to_string()),
            ("alpha".to_string(), "hello".to_string()),
            ("beta".to_string(), PROBE_PROMPT.to_string()),
            ("beta".to_string(), "hello".to_string()),
        ];
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn retry_happens_only_once() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "alpha");
        selector.initialize().await.unwrap();

        // Probes keep succeeding but the real request is rejected everywhere.
        model
            .reject_prompt("hello", ProviderError::ModelNotFound("any".into()))
            .await;

        let err = selector.generate("hello").await.unwrap_err();
        assert_eq!(err, ProviderError::ModelNotFound("any".into()));
        assert_eq!(
            model.models_called().await,
            vec!["alpha", "alpha", "beta", "beta"]
        );
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "alpha");
        selector.initialize().await.unwrap();

        model.fail_next("alpha", ProviderError::QuotaExceeded).await;
        assert_eq!(
            selector.generate("hello").await,
            Err(ProviderError::QuotaExceeded)
        );
        assert_eq!(model.models_called().await, vec!["alpha", "alpha"]);
    }

    #[tokio::test]
    async fn generate_initializes_lazily() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "alpha");

        assert_eq!(selector.generate("hi").await.unwrap(), "alpha says: ok");
        assert_eq!(model.models_called().await, vec!["alpha", "alpha"]);
    }

    #[tokio::test]
    async fn set_preferred_switches_the_active_model() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "alpha");
        selector.initialize().await.unwrap();

        assert_eq!(selector.set_preferred("gamma").await.unwrap(), "gamma");
        assert_eq!(selector.preferred_model().await, "gamma");
        assert_eq!(selector.active_model().await.as_deref(), Some("gamma"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rescans_probe_once() {
        let model = Arc::new(ScriptedModel::new());
        let selector = Arc::new(selector(model.clone(), "alpha"));
        selector.initialize().await.unwrap();
        model
            .break_model("alpha", ProviderError::ModelNotFound("alpha".into()))
            .await;

        let (a, b) = tokio::join!(selector.generate("one"), selector.generate("two"));
        assert_eq!(a.unwrap(), "beta says: ok");
        assert_eq!(b.unwrap(), "beta says: ok");

        let probes = model
            .calls()
            .await
            .into_iter()
            .filter(|(m, p)| m == "beta" && p == PROBE_PROMPT)
            .count();
        assert_eq!(probes, 1);
    }

    #[tokio::test]
    async fn direct_generation_does_not_change_the_active_model() {
        let model = Arc::new(ScriptedModel::new());
        let selector = selector(model.clone(), "preferred");
        selector.initialize().await.unwrap();

        let reply = selector.generate_with("gamma", "ping").await.unwrap();
        assert_eq!(reply, "gamma says: ok");
        assert_eq!(selector.active_model().await.as_deref(), Some("preferred"));

        model.break_model("beta", ProviderError::QuotaExceeded).await;
        assert_eq!(
            selector.generate_with("beta", "ping").await,
            Err(ProviderError::QuotaExceeded)
        );
        assert_eq!(selector.active_model().await.as_deref(), Some("preferred"));
    }
}
