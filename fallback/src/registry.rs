//! Provider registry
//!
//! Built once at process start and shared by every caller. The list is
//! sorted by priority (stable, so ties keep registration order) and never
//! mutated afterwards.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{FallbackError, FallbackResult};
use crate::traits::CredentialSource;
use crate::types::{ProviderKind, ProviderSpec};

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    specs: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    /// Build from specs in registration order; ids must be unique
    pub fn new(specs: Vec<ProviderSpec>) -> FallbackResult<Self> {
        {
            let mut seen = HashSet::new();
            for spec in &specs {
                if !seen.insert(spec.id.as_str()) {
                    return Err(FallbackError::DuplicateProvider { id: spec.id.clone() });
                }
            }
        }

        let mut specs = specs;
        specs.sort_by_key(|spec| spec.priority);
        Ok(Self { specs })
    }

    /// Load a JSON array of provider specs
    pub fn from_json(json: &str) -> FallbackResult<Self> {
        let specs: Vec<ProviderSpec> = serde_json::from_str(json)?;
        Self::new(specs)
    }

    /// Load a JSON array of provider specs from disk
    pub async fn from_file(path: &Path) -> FallbackResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FallbackError::ProviderFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::from_json(&content).map_err(|e| FallbackError::ProviderFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Built-in catalog, cheapest and fastest first
    pub fn default_catalog() -> Vec<ProviderSpec> {
        vec![
            ProviderSpec::new(
                "groq",
                ProviderKind::OpenAiCompatible,
                "https://api.groq.com/openai/v1/chat/completions",
                "GROQ_API_KEY",
                "llama-3.3-70b-versatile",
            )
            .with_priority(10),
            ProviderSpec::new(
                "gemini",
                ProviderKind::Gemini,
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent",
                "GEMINI_API_KEY",
                "gemini-2.0-flash",
            )
            .with_priority(20),
            ProviderSpec::new(
                "openrouter",
                ProviderKind::OpenAiCompatible,
                "https://openrouter.ai/api/v1/chat/completions",
                "OPENROUTER_API_KEY",
                "meta-llama/llama-3.3-70b-instruct:free",
            )
            .with_priority(30)
            .with_timeout(Duration::from_secs(60)),
            ProviderSpec::new(
                "mistral",
                ProviderKind::OpenAiCompatible,
                "https://api.mistral.ai/v1/chat/completions",
                "MISTRAL_API_KEY",
                "mistral-small-latest",
            )
            .with_priority(40),
            ProviderSpec::new(
                "cohere",
                ProviderKind::Cohere,
                "https://api.cohere.com/v2/chat",
                "COHERE_API_KEY",
                "command-r",
            )
            .with_priority(50),
            ProviderSpec::new(
                "openai",
                ProviderKind::OpenAiCompatible,
                "https://api.openai.com/v1/chat/completions",
                "OPENAI_API_KEY",
                "gpt-4o-mini",
            )
            .with_priority(60),
            ProviderSpec::new(
                "anthropic",
                ProviderKind::Anthropic,
                "https://api.anthropic.com/v1/messages",
                "ANTHROPIC_API_KEY",
                "claude-3-5-haiku-latest",
            )
            .with_priority(70),
        ]
    }

    pub fn with_default_catalog() -> FallbackResult<Self> {
        Self::new(Self::default_catalog())
    }

    /// Providers in ascending priority order
    pub fn list(&self) -> &[ProviderSpec] {
        &self.specs
    }

    pub fn get(&self, id: &str) -> Option<&ProviderSpec> {
        self.specs.iter().find(|spec| spec.id == id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// True iff the credential resolves to a non-empty secret right now
    pub async fn is_configured<C: CredentialSource + ?Sized>(&self, spec: &ProviderSpec, credentials: &C) -> bool {
        credentials.resolve(&spec.credential_ref).await.is_some()
    }
}
