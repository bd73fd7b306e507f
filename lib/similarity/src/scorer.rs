use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

use shortlist_core::{CatalogItem, ScoredCandidate, TokenVector};

use crate::cache::{CacheToken, EmbeddingCache};
use crate::embedder::ItemEmbedder;

/// Pools at least this large are embedded on the rayon pool
const PARALLEL_THRESHOLD: usize = 128;

#[derive(Debug, Clone, Default)]
pub struct ScoredPool {
    /// Candidates in ranking order
    pub candidates: Vec<ScoredCandidate>,
    /// Rows removed for having no overlap with the preference vector
    pub zero_dropped: usize,
}

/// Total ranking order: similarity desc, price asc (missing last), rows with
/// media first, value ratio asc (missing last), id asc
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    OrderedFloat(b.similarity)
        .cmp(&OrderedFloat(a.similarity))
        .then_with(|| ascending_missing_last(a.item.price(), b.item.price()))
        .then_with(|| b.item.has_media().cmp(&a.item.has_media()))
        .then_with(|| ascending_missing_last(a.item.value_ratio(), b.item.value_ratio()))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

fn ascending_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => OrderedFloat(a).cmp(&OrderedFloat(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Scores candidate pools against a preference vector through the embedding cache
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    embedder: Arc<ItemEmbedder>,
    cache: Arc<EmbeddingCache>,
}

impl SimilarityScorer {
    pub fn new(embedder: Arc<ItemEmbedder>, cache: Arc<EmbeddingCache>) -> Self {
        Self { embedder, cache }
    }

    pub fn embedder(&self) -> &ItemEmbedder {
        &self.embedder
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub fn token(&self, catalog_version: u64) -> CacheToken {
        CacheToken {
            catalog_version,
            embedder_fingerprint: self.embedder.fingerprint(),
        }
    }

    /// Item vector of a single row, cached
    pub fn item_vector(&self, item: &CatalogItem, catalog_version: u64) -> Arc<TokenVector> {
        self.cache
            .get_or_embed(item, self.token(catalog_version), |i| self.embedder.embed(i))
    }

    /// Score and sort the pool, dropping rows with zero similarity
    pub fn score_pool(&self, pool: &[Arc<CatalogItem>], preference: &TokenVector, catalog_version: u64) -> ScoredPool {
        let scored = self.score(pool, preference, catalog_version);
        let before = scored.len();
        let mut candidates: Vec<ScoredCandidate> = scored.into_iter().filter(|c| c.similarity > 0.0).collect();
        let zero_dropped = before - candidates.len();
        candidates.sort_by(compare_candidates);
        ScoredPool { candidates, zero_dropped }
    }

    /// Score and sort the pool keeping zero-similarity rows, which sort last
    pub fn rank_all(&self, pool: &[Arc<CatalogItem>], preference: &TokenVector, catalog_version: u64) -> Vec<ScoredCandidate> {
        let mut candidates = self.score(pool, preference, catalog_version);
        candidates.sort_by(compare_candidates);
        candidates
    }

    fn score(&self, pool: &[Arc<CatalogItem>], preference: &TokenVector, catalog_version: u64) -> Vec<ScoredCandidate> {
        let score_one = |item: &Arc<CatalogItem>| {
            let vector = self.item_vector(item, catalog_version);
            let similarity = preference.cosine_similarity(&vector);
            ScoredCandidate::new(Arc::clone(item), vector, similarity)
        };

        if pool.len() >= PARALLEL_THRESHOLD {
            pool.par_iter().map(score_one).collect()
        } else {
            pool.iter().map(score_one).collect()
        }
    }
}
