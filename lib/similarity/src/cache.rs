//! Embedding cache
//!
//! Item vectors keyed by item identity. Each entry remembers the token it was
//! computed under (catalog version and embedder fingerprint); an entry with a
//! different token is stale and recomputed on the next lookup.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shortlist_core::{CatalogItem, ItemId, TokenVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheToken {
    pub catalog_version: u64,
    pub embedder_fingerprint: u64,
}

#[derive(Debug, Clone)]
struct CachedVector {
    token: CacheToken,
    vector: Arc<TokenVector>,
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<AHashMap<ItemId, CachedVector>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached vector for `item` under `token`, computing it with `embed` on a
    /// miss. The computation runs without holding the lock; concurrent misses
    /// for one item both compute and the last insert wins with an equal value.
    pub fn get_or_embed<F>(&self, item: &CatalogItem, token: CacheToken, embed: F) -> Arc<TokenVector>
    where
        F: FnOnce(&CatalogItem) -> TokenVector,
    {
        if let Some(cached) = self.entries.read().get(&item.id) {
            if cached.token == token {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(&cached.vector);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = Arc::new(embed(item));
        self.entries.write().insert(
            item.id.clone(),
            CachedVector { token, vector: Arc::clone(&vector) },
        );
        vector
    }

    pub fn invalidate(&self, id: &ItemId) -> bool {
        self.entries.write().remove(id).is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
