//! Command definition cache using moka
//!
//! Stacks tend to repeat the same few commands, and every load resolves every
//! command step. The cache sits in front of a [`CommandDefinitionLookup`] and
//! keeps successful lookups keyed by `(namespace, name)`. Failures are not
//! cached.

use crate::enrich::CommandDefinitionLookup;
use crate::error::LookupError;
use async_trait::async_trait;
use cstack_model::CommandInfo;
use moka::future::Cache;
use std::sync::Arc;
use tracing::trace;

/// Cache key: alias namespace (if any) and name
type DefinitionKey = (Option<String>, String);

/// Caching wrapper around a definition lookup
#[derive(Clone)]
pub struct CachingLookup {
    inner: Arc<dyn CommandDefinitionLookup>,
    cache: Cache<DefinitionKey, CommandInfo>,
}

impl std::fmt::Debug for CachingLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingLookup")
            .field("entry_count", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CachingLookup {
    /// Create a cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(inner: Arc<dyn CommandDefinitionLookup>, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(max_capacity),
        }
    }
}

#[async_trait]
impl CommandDefinitionLookup for CachingLookup {
    async fn command(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<CommandInfo, LookupError> {
        let key = (namespace.map(str::to_string), name.to_string());

        // Check cache first
        if let Some(cached) = self.cache.get(&key).await {
            trace!(command = name, "definition cache hit");
            return Ok(cached);
        }

        let info = self.inner.command(namespace, name).await?;
        self.cache.insert(key, info.clone()).await;
        Ok(info)
    }
}
