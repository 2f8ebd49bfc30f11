//! services/api/src/web/extract.rs
//!
//! `ApiJson<T>`: the JSON body extractor used by every handler.
//!
//! Compared to `axum::Json` it answers malformed bodies with the API's own 400
//! envelope, strips `<script>` blocks from and trims every top-level string
//! field, and logs the body at debug level with passwords redacted.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::ApiError;

static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script tag pattern is valid")
});

const REDACTED: &str = "[REDACTED]";

pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                ApiError::BadRequest(e.body_text())
            }
        })?;

        let mut value: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ApiError::MalformedJson(e.to_string()))?
        };

        sanitize(&mut value);
        debug!(body = %redacted(&value), "request body");

        serde_json::from_value(value)
            .map(ApiJson)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
    }
}

/// Strips script blocks from and trims every top-level string field.
pub fn sanitize(value: &mut Value) {
    if let Value::Object(fields) = value {
        for field in fields.values_mut() {
            if let Value::String(text) = field {
                let cleaned = SCRIPT_TAG.replace_all(text, "").trim().to_string();
                *text = cleaned;
            }
        }
    }
}

/// A copy of the body safe to log.
fn redacted(value: &Value) -> Value {
    let mut copy = value.clone();
    if let Value::Object(fields) = &mut copy {
        for (key, field) in fields.iter_mut() {
            if key.to_ascii_lowercase().contains("password") {
                *field = Value::String(REDACTED.to_string());
            }
        }
    }
    copy
}
