use log::debug;

use crate::cache::{BoundedCache, CacheStats};
use crate::config::VaultConfig;
use crate::error::Result;
use crate::graph::LinkGraph;
use crate::model::normalize_note_path;
use crate::store::NoteStore;

mod mutations;
mod queries;

#[cfg(test)]
mod tests;

pub use mutations::RenameOutcome;
pub use queries::{SearchMatch, SearchOptions, VaultStatistics};

/// The Vault acts as the high-level Facade over the note tree.
///
/// # Architecture Decision: Action vs Query Separation
///
/// *   **Actions (Write/Mutation)**: methods in `mutations.rs`. Every
///     operation that touches disk state runs its invalidation hooks here
///     (the affected content-cache entry, the whole query-result cache, and
///     the graph), so derived state never outlives the write that broke it.
///
/// *   **Queries (Read)**: methods in `queries.rs`. Reads go through the
///     content cache; graph queries consult the query-result cache first and
///     rebuild the graph only when a mutation marked it stale.
///
/// All derived state is owned here and passed explicitly; there is no
/// module-level cache.
pub struct Vault {
    store: NoteStore,
    content_cache: BoundedCache<String>,
    query_cache: BoundedCache<String>,
    graph: LinkGraph,
    config: VaultConfig,
}

impl Vault {
    pub fn open(config: VaultConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: NoteStore::new(&config.root),
            content_cache: BoundedCache::new(config.content_cache)?,
            query_cache: BoundedCache::new(config.query_cache)?,
            graph: LinkGraph::new(),
            config,
        })
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn content_cache_stats(&self) -> CacheStats {
        self.content_cache.stats()
    }

    pub fn query_cache_stats(&self) -> CacheStats {
        self.query_cache.stats()
    }

    /// Read-through the content cache: raw text keyed by normalized path.
    pub(crate) fn read_raw(&mut self, path: &str) -> Result<String> {
        let key = normalize_note_path(path);
        if let Some(cached) = self.content_cache.get(&key) {
            return Ok(cached.clone());
        }
        let raw = self.store.read(&key)?;
        self.content_cache.set(&key, raw.clone(), raw.len());
        Ok(raw)
    }

    /// Invalidation hook run by every mutation: drop the touched document
    /// from the content cache, drop every cached query result, and mark the
    /// graph stale.
    pub(crate) fn invalidate(&mut self, path: &str) {
        debug!("invalidating '{}'", path);
        self.content_cache.delete(path);
        self.query_cache.clear();
        self.graph.invalidate();
    }
}
