//! Test fixtures and data for fallback engine tests
//!
//! This module provides consistent test data and fixtures used across all test suites.

use fallback::{ProviderKind, ProviderSpec};
use shared::ExecutionRequest;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const TASK_TYPE: &'static str = "integration";
    pub const SYSTEM_MESSAGE: &'static str = "You are a concise assistant.";
    pub const PROMPT: &'static str = "Name one prime number.";
    pub const SECRET: &'static str = "test-secret";

    /// Breaker settings used unless a test overrides them
    pub const FAILURE_THRESHOLD: u32 = 3;
    pub const RECOVERY_SECS: u64 = 300;

    /// OpenAI-compatible provider whose credential ref is `<ID>_KEY`
    pub fn provider(id: &str, priority: i32) -> ProviderSpec {
        ProviderSpec::new(
            id,
            ProviderKind::OpenAiCompatible,
            format!("http://{id}.invalid/v1/chat/completions"),
            Self::credential_ref(id),
            "test-model",
        )
        .with_priority(priority)
    }

    pub fn credential_ref(id: &str) -> String {
        format!("{}_KEY", id.to_uppercase())
    }

    /// Cache-enabled request with the standard prompt
    pub fn request() -> ExecutionRequest {
        ExecutionRequest::new(Self::TASK_TYPE, Self::SYSTEM_MESSAGE, Self::PROMPT)
    }

    pub fn uncached_request() -> ExecutionRequest {
        Self::request().with_cache(false)
    }

    /// Well-formed OpenAI chat completion body
    pub fn openai_body(text: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    /// Well-formed Anthropic messages body
    pub fn anthropic_body(text: &str) -> String {
        serde_json::json!({
            "id": "msg_test",
            "type": "message",
            "content": [{ "type": "text", "text": text }]
        })
        .to_string()
    }

    /// 2xx body with no text where the extractor looks
    pub fn unexpected_body() -> String {
        serde_json::json!({ "result": "something else" }).to_string()
    }
}
