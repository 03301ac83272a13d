//! Comment moderation gate.
//!
//! The gate is fail-closed: anything short of a well-formed verdict from the
//! classifier is reported as [`ModerationError::Unavailable`], never as "safe".

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Classifier output for one piece of text. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModerationVerdict {
    pub is_safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ModerationVerdict {
    pub fn safe() -> Self {
        Self { is_safe: true, reason: None }
    }

    pub fn flagged(reason: impl Into<String>) -> Self {
        Self { is_safe: false, reason: Some(reason.into()) }
    }

    /// A reason only accompanies an unsafe verdict, and a blank one counts as missing.
    pub fn normalized(self) -> Self {
        if self.is_safe {
            return Self::safe();
        }
        let reason = self.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        Self { is_safe: false, reason }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ModerationError {
    #[error("moderation service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Moderator: Send + Sync {
    /// Exactly one verdict per call; no retries.
    async fn moderate(&self, text: &str) -> Result<ModerationVerdict, ModerationError>;
}

pub const POLICY_PROMPT: &str = "You are a content moderator for a family-friendly website about cultural heritage.
Analyze the following text and determine if it is appropriate. Content should be considered unsafe if it contains hate speech, harassment, sexually explicit material, or dangerous content.
Provide a reason only if the content is flagged as not safe.";

pub fn build_prompt(text: &str) -> String {
    format!("{POLICY_PROMPT}\n\nText to analyze: {text}")
}

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound on one classifier round trip; a stalled call counts as an outage.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for a Gemini-style `generateContent` endpoint asked for a JSON verdict.
#[derive(Clone)]
pub struct GenerativeModerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerativeModerator {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    fn request_body(text: &str) -> serde_json::Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(text) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "isSafe": { "type": "BOOLEAN", "description": "Whether the content is safe or not." },
                        "reason": { "type": "STRING", "description": "The reason why the content was flagged, if applicable." }
                    },
                    "required": ["isSafe"]
                }
            }
        })
    }

    fn parse_verdict(body: GenerateResponse) -> Result<ModerationVerdict, ModerationError> {
        let raw = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| ModerationError::Unavailable("response carried no output".into()))?;
        serde_json::from_str::<ModerationVerdict>(raw.trim())
            .map(ModerationVerdict::normalized)
            .map_err(|e| ModerationError::Unavailable(format!("unparsable verdict: {e}")))
    }
}

#[async_trait]
impl Moderator for GenerativeModerator {
    async fn moderate(&self, text: &str) -> Result<ModerationVerdict, ModerationError> {
        debug!(model = %self.model, text_len = text.len(), "requesting moderation verdict");
        let call = async {
            let resp = self
                .client
                .post(self.endpoint())
                .query(&[("key", self.api_key.as_str())])
                .json(&Self::request_body(text))
                .send()
                .await
                .map_err(|e| ModerationError::Unavailable(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                warn!(%status, "moderation service rejected request");
                return Err(ModerationError::Unavailable(format!("status {status}")));
            }
            let body = resp
                .json::<GenerateResponse>()
                .await
                .map_err(|e| ModerationError::Unavailable(e.to_string()))?;
            Ok::<_, ModerationError>(body)
        };
        let body = tokio::time::timeout(REQUEST_TIMEOUT, call)
            .await
            .map_err(|_| ModerationError::Unavailable("request timed out".into()))??;
        Self::parse_verdict(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> GenerateResponse {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .unwrap()
    }

    #[test]
    fn safe_verdict_drops_reason() {
        let v = ModerationVerdict { is_safe: true, reason: Some("fine".into()) }.normalized();
        assert_eq!(v, ModerationVerdict::safe());
    }

    #[test]
    fn blank_reason_on_unsafe_verdict_is_missing() {
        let v = ModerationVerdict { is_safe: false, reason: Some("  ".into()) }.normalized();
        assert_eq!(v.reason, None);
        assert!(!v.is_safe);
    }

    #[test]
    fn parses_structured_output() {
        let v = GenerativeModerator::parse_verdict(response(r#"{"isSafe":false,"reason":"harassment"}"#)).unwrap();
        assert_eq!(v, ModerationVerdict::flagged("harassment"));
    }

    #[test]
    fn missing_or_garbled_output_is_unavailable() {
        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(GenerativeModerator::parse_verdict(empty).is_err());
        assert!(GenerativeModerator::parse_verdict(response("looks fine to me")).is_err());
        assert!(GenerativeModerator::parse_verdict(response(r#"{"reason":"x"}"#)).is_err());
    }

    #[test]
    fn prompt_embeds_policy_and_text() {
        let p = build_prompt("What a beautiful tradition!");
        assert!(p.contains("hate speech, harassment, sexually explicit material, or dangerous content"));
        assert!(p.ends_with("Text to analyze: What a beautiful tradition!"));
    }
}
