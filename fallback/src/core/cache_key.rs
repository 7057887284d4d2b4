//! Deterministic cache key over the normalized request

use sha2::{Digest, Sha256};
use shared::ExecutionRequest;

/// Lowercase hex SHA-256 of system message, prompt, max tokens and temperature.
///
/// Leading/trailing whitespace is ignored. Text fields are length-prefixed so
/// no content can shift a field boundary, and the temperature is hashed by
/// its exact bits. Task type and the cache flag are not part of the key.
pub fn cache_key(request: &ExecutionRequest) -> String {
    let mut hasher = Sha256::new();
    for field in [request.system_message.trim(), request.user_prompt.trim()] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.update(request.max_tokens.to_le_bytes());
    // -0.0 and 0.0 are the same temperature
    let temperature = if request.temperature == 0.0 { 0.0f32 } else { request.temperature };
    hasher.update(temperature.to_bits().to_le_bytes());
    hex::encode(hasher.finalize())
}
