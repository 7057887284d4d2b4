//! Result cache backends
//!
//! Expiry is logical: stale entries stay where they are and are simply not
//! returned. A later success for the same key overwrites the entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{FallbackError, FallbackResult};
use crate::traits::{Clock, ResultCache};
use crate::types::CacheEntry;

fn is_fresh(written_at: DateTime<Utc>, now: DateTime<Utc>, freshness: Duration) -> bool {
    match (now - written_at).to_std() {
        Ok(age) => age < freshness,
        // Written "in the future" (clock skew): still fresh
        Err(_) => true,
    }
}

/// One JSON document per key under a cache directory
pub struct FileResultCache {
    dir: PathBuf,
    freshness: Duration,
    clock: Arc<dyn Clock>,
}

impl FileResultCache {
    pub fn new(dir: impl Into<PathBuf>, freshness: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            freshness,
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> FallbackResult<PathBuf> {
        // Keys are hex digests; anything else could escape the directory
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FallbackError::Cache {
                message: format!("invalid cache key '{key}'"),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl ResultCache for FileResultCache {
    async fn get(&self, key: &str) -> FallbackResult<Option<CacheEntry>> {
        let path = self.entry_path(key)?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FallbackError::Io(e)),
        };

        let entry: CacheEntry = serde_json::from_str(&content).map_err(|e| FallbackError::Cache {
            message: format!("corrupt cache entry {}: {e}", path.display()),
        })?;

        if is_fresh(entry.written_at, self.clock.now(), self.freshness) {
            Ok(Some(entry))
        } else {
            debug!(key, "Ignoring stale cache entry");
            Ok(None)
        }
    }

    async fn put(&self, key: &str, provider_id: &str, response_text: &str) -> FallbackResult<()> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir).await?;

        let entry = CacheEntry {
            key: key.to_string(),
            provider_id: provider_id.to_string(),
            response_text: response_text.to_string(),
            written_at: self.clock.now(),
        };
        let content = serde_json::to_string_pretty(&entry)?;

        // Write-then-rename so readers never observe a half-written entry
        let tmp_path = self.dir.join(format!("{key}.json.{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp_path, content).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FallbackError::Io(e));
        }

        debug!(key, provider = provider_id, "💾 Cached response");
        Ok(())
    }
}

/// Process-local cache
pub struct InMemoryResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    freshness: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryResultCache {
    pub fn new(freshness: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness,
            clock,
        }
    }

    /// Number of stored entries, stale ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> FallbackResult<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        let now = self.clock.now();
        Ok(entries
            .get(key)
            .filter(|entry| is_fresh(entry.written_at, now, self.freshness))
            .cloned())
    }

    async fn put(&self, key: &str, provider_id: &str, response_text: &str) -> FallbackResult<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            provider_id: provider_id.to_string(),
            response_text: response_text.to_string(),
            written_at: self.clock.now(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}
