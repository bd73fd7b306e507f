//! Retrieval engine facade
//!
//! One call runs the whole pipeline: strategy retrieval, the optional media
//! pre-filter, similarity scoring, clustered MMR, keyword re-ranking and
//! post-enrichment. Only programmer errors at the boundary and a catalog that
//! failed every call surface as [`EngineError`]; every other degradation is
//! reported through [`Diagnostics`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant as StdInstant;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use shortlist_catalog::CatalogStore;
use shortlist_core::{
    Diagnostics, FallbackTier, FilterSet, PreferenceSignal, RankedEntry, RankedResult, RawFilterSet, RerankOutcome,
};
use shortlist_similarity::{
    diversify, DiversityParams, EmbeddingCache, ItemEmbedder, PreferenceVectorizer, Reranked, SimilarityScorer,
};

use crate::config::{ConfigError, EngineConfig};
use crate::enrich::{enrich_items, MediaEnricher};
use crate::segment::SegmentGenerator;
use crate::strategy::{multi, single, Retrieval, RetrievalContext, Strategy};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Invalid(#[from] shortlist_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Parameters of one retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub filters: FilterSet,
    #[serde(default)]
    pub preferences: PreferenceSignal,
    /// Raw utterance text, used by keyword re-ranking
    #[serde(default)]
    pub utterance: String,
    pub k: usize,
    #[serde(default)]
    pub strategy: Strategy,
    /// Overrides the configured diversity parameters
    #[serde(default)]
    pub diversity: Option<DiversityParams>,
}

impl RetrievalRequest {
    pub fn new(filters: FilterSet, k: usize) -> Self {
        Self {
            filters,
            preferences: PreferenceSignal::default(),
            utterance: String::new(),
            k,
            strategy: Strategy::default(),
            diversity: None,
        }
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: PreferenceSignal) -> Self {
        self.preferences = preferences;
        self
    }

    #[must_use]
    pub fn with_utterance(mut self, utterance: impl Into<String>) -> Self {
        self.utterance = utterance.into();
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_diversity(mut self, diversity: DiversityParams) -> Self {
        self.diversity = Some(diversity);
        self
    }
}

/// A request in the string-valued shape produced by the NLU collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    #[serde(default)]
    pub filters: RawFilterSet,
    #[serde(default)]
    pub preferences: PreferenceSignal,
    #[serde(default)]
    pub utterance: String,
    pub k: usize,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub diversity: Option<DiversityParams>,
}

pub struct RetrievalEngineBuilder {
    catalog: Arc<dyn CatalogStore>,
    generator: Option<Arc<dyn SegmentGenerator>>,
    enricher: Option<Arc<dyn MediaEnricher>>,
    cache: Option<Arc<EmbeddingCache>>,
    config: EngineConfig,
}

impl RetrievalEngineBuilder {
    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn SegmentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn enricher(mut self, enricher: Arc<dyn MediaEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Share an embedding cache between engines
    #[must_use]
    pub fn cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<RetrievalEngine> {
        self.config.validate()?;

        let weights = Arc::new(self.config.weights.clone());
        let vectorizer = PreferenceVectorizer::new(Arc::clone(&weights));
        let embedder = Arc::new(ItemEmbedder::new(weights));
        let cache = self.cache.unwrap_or_default();
        let scorer = SimilarityScorer::new(embedder, cache);

        Ok(RetrievalEngine {
            catalog: self.catalog,
            generator: self.generator,
            enricher: self.enricher,
            vectorizer,
            scorer,
            config: self.config,
        })
    }
}

pub struct RetrievalEngine {
    catalog: Arc<dyn CatalogStore>,
    generator: Option<Arc<dyn SegmentGenerator>>,
    enricher: Option<Arc<dyn MediaEnricher>>,
    vectorizer: PreferenceVectorizer,
    scorer: SimilarityScorer,
    config: EngineConfig,
}

impl RetrievalEngine {
    pub fn builder(catalog: Arc<dyn CatalogStore>) -> RetrievalEngineBuilder {
        RetrievalEngineBuilder {
            catalog,
            generator: None,
            enricher: None,
            cache: None,
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        self.scorer.cache()
    }

    /// Normalize a raw request and retrieve. Entries that fail normalization
    /// are dropped with a warning.
    pub async fn retrieve_raw(&self, raw: RawRequest) -> Result<RankedResult> {
        let (filters, rejected) = FilterSet::from_raw(&raw.filters, &self.config.normalization);
        for error in &rejected {
            warn!(error = %error, "dropped filter entry");
        }
        let request = RetrievalRequest {
            filters,
            preferences: raw.preferences,
            utterance: raw.utterance,
            k: raw.k,
            strategy: raw.strategy,
            diversity: raw.diversity,
        };
        self.retrieve(request).await
    }

    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RankedResult> {
        let diversity = self.check(&request)?;
        let request_id = Uuid::new_v4();
        let span = info_span!("retrieve", %request_id, k = request.k, strategy = ?request.strategy.kind());
        self.run(request, diversity, request_id).instrument(span).await
    }

    fn check(&self, request: &RetrievalRequest) -> Result<DiversityParams> {
        let max = self.config.retrieval.row_ceiling;
        if request.k == 0 || request.k > max {
            return Err(shortlist_core::Error::InvalidK { max, actual: request.k }.into());
        }
        if let Strategy::MultiSegment { segments: Some(0) } = request.strategy {
            return Err(shortlist_core::Error::InvalidSegmentCount.into());
        }
        let diversity = request.diversity.unwrap_or(self.config.diversity);
        diversity.validate()?;
        request.filters.base_condition()?;
        Ok(diversity)
    }

    async fn run(&self, request: RetrievalRequest, diversity: DiversityParams, request_id: Uuid) -> Result<RankedResult> {
        let started = StdInstant::now();
        let mut diagnostics = Diagnostics::new(request_id, request.strategy.kind());

        let preference = self.vectorizer.vectorize(&request.filters, &request.preferences.normalized());
        let ctx = RetrievalContext {
            catalog: Arc::clone(&self.catalog),
            filters: &request.filters,
            preference: &preference,
            scorer: &self.scorer,
            config: &self.config,
            deadline: Instant::now() + self.config.retrieval.overall_timeout(),
        };

        let retrieval = match request.strategy {
            Strategy::SingleQuery => single::retrieve(&ctx).await?,
            Strategy::MultiSegment { segments } => {
                let requested = segments.unwrap_or(self.config.retrieval.segment_count);
                multi::retrieve(&ctx, self.generator.as_ref(), requested).await?
            }
        };
        let Retrieval { mut pool, tier, rows_before_dedup, avoid_filtered, strategy_used, segments, health } = retrieval;

        if pool.is_empty() && health.is_down() {
            let error = health.last_error.unwrap_or_else(|| "every catalog call failed".to_string());
            return Err(EngineError::CatalogUnavailable(error));
        }
        diagnostics.strategy_used = strategy_used;
        diagnostics.pool_before_dedup = rows_before_dedup;
        diagnostics.pool_after_dedup = pool.len();
        diagnostics.avoid_filtered = avoid_filtered;
        diagnostics.segments = segments;
        debug!(tier = ?tier, pool = pool.len(), "candidate pool ready");

        if self.config.enrichment.photos_required {
            if let Some(enricher) = &self.enricher {
                pool = self.enrich(Arc::clone(enricher), pool).await;
            }
            let before = pool.len();
            pool.retain(|item| item.has_media());
            diagnostics.media_filtered = before - pool.len();
        }

        let version = self.catalog.version().0;
        // only the last-resort tier keeps rows with no preference overlap
        let candidates = if tier == FallbackTier::FullCatalog {
            self.scorer.rank_all(&pool, &preference, version)
        } else {
            let scored = self.scorer.score_pool(&pool, &preference, version);
            if scored.zero_dropped > 0 {
                debug!(dropped = scored.zero_dropped, kept = scored.candidates.len(), "dropped zero-similarity rows");
            }
            diagnostics.zero_similarity_dropped = scored.zero_dropped;
            scored.candidates
        };
        diagnostics.fallback_tier = tier;

        let diversified = diversify(candidates, request.k, &diversity);
        diagnostics.diversity_clusters = diversified.clusters;

        let (mut ranked, outcome) = if self.config.rerank.enabled && !request.utterance.trim().is_empty() {
            self.config.rerank.reranker().rerank(diversified.picks, &request.utterance)
        } else {
            let kept = diversified
                .picks
                .into_iter()
                .map(|(candidate, signal)| Reranked { candidate, signal, keyword_score: None })
                .collect();
            (kept, RerankOutcome::Skipped)
        };
        diagnostics.rerank = outcome;

        if !self.config.enrichment.photos_required {
            if let Some(enricher) = &self.enricher {
                let items = ranked.iter().map(|r| Arc::clone(&r.candidate.item)).collect();
                let enriched = self.enrich(Arc::clone(enricher), items).await;
                for (entry, item) in ranked.iter_mut().zip(enriched) {
                    entry.candidate.item = item;
                }
            }
        }

        ranked.retain(|r| {
            let excluded = request.filters.avoid_list.excludes(&r.candidate.item);
            if excluded {
                warn!(item = %r.candidate.id(), "excluded row reached the final ranking");
            }
            !excluded
        });

        let entries: Vec<RankedEntry> = ranked
            .into_iter()
            .enumerate()
            .map(|(pos, r)| RankedEntry {
                rank: pos + 1,
                candidate: r.candidate,
                signal: r.signal,
                keyword_score: r.keyword_score,
            })
            .collect();

        diagnostics.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            results = entries.len(),
            tier = ?diagnostics.fallback_tier,
            pool = diagnostics.pool_after_dedup,
            elapsed_ms = diagnostics.elapsed_ms,
            "retrieval complete"
        );
        Ok(RankedResult { entries, diagnostics })
    }

    async fn enrich(
        &self,
        enricher: Arc<dyn MediaEnricher>,
        items: Vec<Arc<shortlist_core::CatalogItem>>,
    ) -> Vec<Arc<shortlist_core::CatalogItem>> {
        let cfg = &self.config.enrichment;
        enrich_items(enricher, items, cfg.parallelism, cfg.item_timeout()).await.items
    }
}
