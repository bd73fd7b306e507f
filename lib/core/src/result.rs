use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{CatalogItem, ItemId, TokenVector};

/// A pool row with its item vector and similarity to the preference vector
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub item: Arc<CatalogItem>,
    pub vector: Arc<TokenVector>,
    pub similarity: f32,
    pub cluster: Option<usize>,
}

impl ScoredCandidate {
    pub fn new(item: Arc<CatalogItem>, vector: Arc<TokenVector>, similarity: f32) -> Self {
        Self { item, vector, similarity, cluster: None }
    }

    #[inline]
    pub fn id(&self) -> &ItemId {
        &self.item.id
    }
}

/// Stage of the relaxation ladder that produced the candidate pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tier")]
pub enum FallbackTier {
    Strict,
    Relaxed { dropped: Vec<String> },
    MustHaveOnly,
    FullCatalog,
}

impl FallbackTier {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, FallbackTier::Strict)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SingleQuery,
    MultiSegment,
}

/// Scoring signal that placed an entry at its rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSignal {
    Similarity,
    Diversity,
    KeywordRelevance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankOutcome {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub requested: usize,
    pub valid: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub generator_attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub request_id: Uuid,
    pub strategy_requested: StrategyKind,
    pub strategy_used: StrategyKind,
    pub fallback_tier: FallbackTier,
    pub pool_before_dedup: usize,
    pub pool_after_dedup: usize,
    pub zero_similarity_dropped: usize,
    pub media_filtered: usize,
    pub avoid_filtered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<SegmentStats>,
    pub diversity_clusters: usize,
    pub rerank: RerankOutcome,
    pub elapsed_ms: u64,
}

impl Diagnostics {
    pub fn new(request_id: Uuid, strategy: StrategyKind) -> Self {
        Self {
            request_id,
            strategy_requested: strategy,
            strategy_used: strategy,
            fallback_tier: FallbackTier::Strict,
            pool_before_dedup: 0,
            pool_after_dedup: 0,
            zero_similarity_dropped: 0,
            media_filtered: 0,
            avoid_filtered: 0,
            segments: None,
            diversity_clusters: 0,
            rerank: RerankOutcome::Skipped,
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedEntry {
    /// 1-based final position
    pub rank: usize,
    pub candidate: ScoredCandidate,
    pub signal: RankSignal,
    pub keyword_score: Option<f32>,
}

/// Final ordered output of one retrieval
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub entries: Vec<RankedEntry>,
    pub diagnostics: Diagnostics,
}

impl RankedResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<&ItemId> {
        self.entries.iter().map(|e| e.candidate.id()).collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.entries.iter().map(|e| e.candidate.item.as_ref())
    }
}
