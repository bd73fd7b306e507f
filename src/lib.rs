//! # Shortlist
//!
//! Candidate retrieval, ranking and diversification for structured product
//! catalogs.
//!
//! Given hard constraints, exclusions and soft preferences, Shortlist pulls a
//! candidate pool from a catalog store, ranks it by similarity to the stated
//! preferences, diversifies it with clustered maximal marginal relevance and
//! lightly re-ranks it by keyword relevance to the user's utterance.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shortlist::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), EngineError> {
//! let catalog = InMemoryCatalog::from_items([
//!     CatalogItem::new("vin-1").with_attr("body_style", "suv").with_attr("make", "honda"),
//!     CatalogItem::new("vin-2").with_attr("body_style", "suv").with_attr("make", "toyota"),
//! ]);
//! let engine = RetrievalEngine::builder(Arc::new(catalog)).build()?;
//!
//! let mut raw = RawFilterSet::default();
//! raw.must_have.insert("body_style".into(), "suv".into());
//! raw.avoid_list.push(RawAvoidRule { category: "make:toyota".into(), sub: None });
//!
//! let result = engine
//!     .retrieve_raw(RawRequest {
//!         filters: raw,
//!         preferences: PreferenceSignal::default(),
//!         utterance: "reliable family suv".into(),
//!         k: 10,
//!         strategy: Strategy::SingleQuery,
//!         diversity: None,
//!     })
//!     .await?;
//! assert!(result.items().all(|item| item.text("make") != Some("toyota")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `shortlist-core` - Filter sets, catalog rows, token vectors, BM25, results
//! - `shortlist-catalog` - Catalog store trait and the in-memory store
//! - `shortlist-similarity` - Vectorizer, embedder and cache, scorer, MMR, re-ranker
//! - `shortlist-retrieval` - Strategies, segment validation, enrichment, the engine

pub mod permute;

pub use permute::DomainPermutations;
pub use shortlist_catalog::{load_json, CatalogError, CatalogStore, CatalogVersion, InMemoryCatalog};
pub use shortlist_core::{
    AvoidList, AvoidRule, CatalogItem, Constraint, Diagnostics, Error, FallbackTier, FieldMatch, FilterSet, GeoPoint,
    ItemId, MediaAsset, Normalizer, PreferenceSignal, RankSignal, RankedEntry, RankedResult, RawAvoidRule,
    RawFilterSet, RawValue, RerankOutcome, Result, SegmentStats, StrategyKind, TokenVector,
};
pub use shortlist_retrieval::{
    EngineConfig, EngineError, MediaEnricher, RawRequest, ResultView, RetrievalEngine, RetrievalRequest,
    SegmentGenerator, Strategy,
};
pub use shortlist_similarity::{DiversityParams, EmbeddingCache, WeightTable};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CatalogItem, CatalogStore, Constraint, DiversityParams, EngineConfig, EngineError, FallbackTier, FilterSet,
        InMemoryCatalog, PreferenceSignal, RankedResult, RawAvoidRule, RawFilterSet, RawRequest, ResultView,
        RetrievalEngine, RetrievalRequest, Strategy,
    };
}
