//! Credential sources
//!
//! A missing or blank secret is reported as `None`; callers treat that as
//! "provider not configured", never as an error.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::traits::CredentialSource;

/// Resolves credential references as process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialSource;

impl EnvCredentialSource {
    pub fn new() -> Self {
        Self
    }

    /// Load a `.env` file from the current or a parent directory, if any.
    ///
    /// Variables already present in the environment win over the file.
    pub fn load_dotenv() {
        let _ = dotenvy::dotenv();
    }
}

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn resolve(&self, credential_ref: &str) -> Option<String> {
        std::env::var(credential_ref)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Fixed in-memory credentials, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialSource {
    secrets: HashMap<String, String>,
}

impl StaticCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential_ref: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(credential_ref.into(), secret.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticCredentialSource {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            secrets: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn resolve(&self, credential_ref: &str) -> Option<String> {
        self.secrets
            .get(credential_ref)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
