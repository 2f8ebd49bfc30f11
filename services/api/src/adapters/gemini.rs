//! services/api/src/adapters/gemini.rs
//!
//! REST client for the Gemini `generateContent` endpoint, implementing the
//! `GenerativeModel` port. Provider failures are classified into the port's
//! error taxonomy so the model selector can decide whether to fall back.

use async_trait::async_trait;
use notatnik_core::ports::{GenerativeModel, ModelInfo, ProviderError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MODEL_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<RemoteModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<RemoteModel> for ModelInfo {
    fn from(model: RemoteModel) -> Self {
        let name = match model.name.strip_prefix("models/") {
            Some(bare) => bare.to_string(),
            None => model.name,
        };
        ModelInfo {
            name,
            methods: model.supported_generation_methods,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn models_endpoint(&self) -> String {
        format!("{}/models?pageSize={}", self.base_url, MODEL_PAGE_SIZE)
    }
}

/// Maps a non-success provider response onto the port taxonomy.
fn classify_failure(status: StatusCode, body: &str, model: &str) -> ProviderError {
    let (message, reason) = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| (e.error.message, e.error.status))
        .unwrap_or_else(|_| (body.to_string(), String::new()));

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("API_KEY_INVALID")
        || message.contains("API key not valid")
    {
        return ProviderError::InvalidCredential;
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || reason == "RESOURCE_EXHAUSTED"
        || body.contains("QUOTA_EXCEEDED")
    {
        return ProviderError::QuotaExceeded;
    }
    if status == StatusCode::NOT_FOUND {
        return ProviderError::ModelNotFound(model.to_string());
    }
    ProviderError::Other(format!("status {}: {}", status.as_u16(), message))
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let request_body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = classify_failure(status, &body, model);
            warn!(model, status = status.as_u16(), error = %failure, "Gemini request failed");
            return Err(failure);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("unreadable response: {e}")))?;
        debug!(model, "Gemini request succeeded");

        parsed
            .text()
            .ok_or_else(|| ProviderError::Other("response contained no text".to_string()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .get(self.models_endpoint())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = classify_failure(status, &body, "models");
            warn!(status = status.as_u16(), error = %failure, "Gemini model listing failed");
            return Err(failure);
        }

        let parsed: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("unreadable model list: {e}")))?;
        debug!(count = parsed.models.len(), "Gemini models listed");
        Ok(parsed.models.into_iter().map(ModelInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_are_recognised() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, body, "m"),
            ProviderError::InvalidCredential
        );
        assert_eq!(
            classify_failure(StatusCode::FORBIDDEN, "", "m"),
            ProviderError::InvalidCredential
        );
    }

    #[test]
    fn quota_and_missing_models_are_recognised() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, body, "m"),
            ProviderError::QuotaExceeded
        );
        assert_eq!(
            classify_failure(StatusCode::NOT_FOUND, "{}", "gemini-pro"),
            ProviderError::ModelNotFound("gemini-pro".to_string())
        );
    }

    #[test]
    fn other_failures_keep_the_provider_message() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        assert_eq!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, body, "m"),
            ProviderError::Other("status 503: The model is overloaded.".to_string())
        );
    }

    #[test]
    fn response_text_joins_the_first_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":" there"}],"role":"model"}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Hello there"));

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(blocked.text(), None);
    }

    #[test]
    fn endpoint_uses_the_configured_base() {
        let client = GeminiClient::new(
            "key".to_string(),
            "https://generativelanguage.googleapis.com/v1beta/".to_string(),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn model_list_strips_the_resource_prefix() {
        let body = r#"{"models":[
            {"name":"models/gemini-1.5-flash","supportedGenerationMethods":["generateContent","countTokens"]},
            {"name":"models/embedding-001","supportedGenerationMethods":["embedContent"]},
            {"name":"tunedModels/mine"}
        ],"nextPageToken":"abc"}"#;
        let parsed: ListModelsResponse = serde_json::from_str(body).unwrap();
        let models: Vec<ModelInfo> = parsed.models.into_iter().map(ModelInfo::from).collect();

        assert_eq!(models[0].name, "gemini-1.5-flash");
        assert_eq!(models[0].methods, vec!["generateContent", "countTokens"]);
        assert_eq!(models[1].name, "embedding-001");
        assert_eq!(models[2].name, "tunedModels/mine");
        assert!(models[2].methods.is_empty());

        let empty: ListModelsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.models.is_empty());
    }

    #[test]
    fn models_endpoint_requests_a_full_page() {
        let client = GeminiClient::new("key".to_string(), "http://localhost:9/v1beta".to_string())
            .unwrap();
        assert_eq!(
            client.models_endpoint(),
            "http://localhost:9/v1beta/models?pageSize=1000"
        );
    }
}
