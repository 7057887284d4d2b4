//! Request shaping and response extraction per provider kind
//!
//! Pure functions only: no I/O, no clocks. The engine turns an
//! `ExecutionRequest` into a `ProviderRequest` here and turns the raw
//! response body back into text.

use serde_json::{Value, json};
use shared::ExecutionRequest;

use crate::error::ProviderFailure;
use crate::types::{ProviderKind, ProviderRequest, ProviderSpec};

const ANTHROPIC_VERSION: &str = "2023-06-01";

impl ProviderKind {
    /// Provider-native JSON payload
    pub fn shape_request(&self, model: &str, request: &ExecutionRequest) -> Value {
        match self {
            ProviderKind::OpenAiCompatible | ProviderKind::Cohere => json!({
                "model": model,
                "messages": [
                    { "role": "system", "content": request.system_message },
                    { "role": "user", "content": request.user_prompt }
                ],
                "max_tokens": request.max_tokens,
                "temperature": request.temperature
            }),
            ProviderKind::Anthropic => json!({
                "model": model,
                "system": request.system_message,
                "messages": [
                    { "role": "user", "content": request.user_prompt }
                ],
                "max_tokens": request.max_tokens,
                "temperature": request.temperature
            }),
            ProviderKind::Gemini => json!({
                "systemInstruction": {
                    "parts": [{ "text": request.system_message }]
                },
                "contents": [
                    { "role": "user", "parts": [{ "text": request.user_prompt }] }
                ],
                "generationConfig": {
                    "maxOutputTokens": request.max_tokens,
                    "temperature": request.temperature
                }
            }),
        }
    }

    /// Authentication and content-type headers
    pub fn headers(&self, secret: &str) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        match self {
            ProviderKind::OpenAiCompatible | ProviderKind::Cohere => {
                headers.push(("Authorization".to_string(), format!("Bearer {secret}")));
            }
            ProviderKind::Anthropic => {
                headers.push(("x-api-key".to_string(), secret.to_string()));
                headers.push(("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()));
            }
            ProviderKind::Gemini => {
                headers.push(("x-goog-api-key".to_string(), secret.to_string()));
            }
        }
        headers
    }

    /// Pull the generated text out of a 2xx body
    pub fn extract_text(&self, body: &str) -> Result<String, ProviderFailure> {
        let parsed: Value = serde_json::from_str(body)
            .map_err(|e| ProviderFailure::Extraction(format!("invalid JSON: {e}")))?;

        let text = match self {
            ProviderKind::OpenAiCompatible => parsed
                .get("choices")
                .and_then(|choices| choices.get(0))
                .and_then(|choice| choice.get("message"))
                .and_then(|message| message.get("content"))
                .and_then(|content| content.as_str()),
            ProviderKind::Anthropic => parsed
                .get("content")
                .and_then(|content| content.get(0))
                .and_then(|item| item.get("text"))
                .and_then(|text| text.as_str()),
            ProviderKind::Gemini => parsed
                .get("candidates")
                .and_then(|candidates| candidates.get(0))
                .and_then(|candidate| candidate.get("content"))
                .and_then(|content| content.get("parts"))
                .and_then(|parts| parts.get(0))
                .and_then(|part| part.get("text"))
                .and_then(|text| text.as_str()),
            ProviderKind::Cohere => parsed
                .get("message")
                .and_then(|message| message.get("content"))
                .and_then(|content| content.get(0))
                .and_then(|item| item.get("text"))
                .and_then(|text| text.as_str())
                // v1 chat responses carry the text at the top level
                .or_else(|| parsed.get("text").and_then(|text| text.as_str())),
        };

        match text {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            Some(_) => Err(ProviderFailure::Extraction("empty text".to_string())),
            None => Err(ProviderFailure::Extraction(format!("no text in {self:?} response"))),
        }
    }
}

/// Build the outbound call for `spec` with a resolved secret
pub fn build_provider_request(spec: &ProviderSpec, request: &ExecutionRequest, secret: &str) -> ProviderRequest {
    ProviderRequest {
        provider_id: spec.id.clone(),
        endpoint: spec.endpoint.clone(),
        headers: spec.kind.headers(secret),
        body: spec.kind.shape_request(&spec.model, request),
        timeout: spec.timeout,
    }
}
