//! # Shortlist Retrieval
//!
//! Candidate retrieval and the end-to-end ranking pipeline.
//!
//! - [`strategy`] - Single-Query and Multi-Segment retrieval with fallback tiers
//! - [`segment`] - Validation and repair of generated segments
//! - [`enrich`] - Bounded media enrichment
//! - [`engine`] - [`RetrievalEngine`], the public retrieval operation
//! - [`explain`] - Serializable result views
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shortlist_catalog::InMemoryCatalog;
//! use shortlist_core::{CatalogItem, Constraint, FilterSet};
//! use shortlist_retrieval::{RetrievalEngine, RetrievalRequest};
//!
//! # async fn run() -> Result<(), shortlist_retrieval::EngineError> {
//! let catalog = InMemoryCatalog::from_items([
//!     CatalogItem::new("vin-1").with_attr("body_style", "suv").with_attr("make", "honda"),
//! ]);
//! let engine = RetrievalEngine::builder(Arc::new(catalog)).build()?;
//!
//! let filters = FilterSet::new().with_must_have("body_style", Constraint::Exact("suv".into()));
//! let result = engine.retrieve(RetrievalRequest::new(filters, 10)).await?;
//! println!("{} results, tier {:?}", result.len(), result.diagnostics.fallback_tier);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod enrich;
pub mod explain;
pub mod segment;
pub mod strategy;

pub use config::{
    ConfigError, EngineConfig, EnrichmentConfig, PrimaryScope, RerankConfig, RetrievalConfig, SegmentConfig,
};
pub use engine::{EngineError, RawRequest, RetrievalEngine, RetrievalEngineBuilder, RetrievalRequest};
pub use enrich::{enrich_items, EnrichError, EnrichOutcome, MediaEnricher};
pub use explain::{EntryView, ResultStats, ResultView};
pub use segment::{Rejection, Segment, SegmentError, SegmentGenerator, SegmentValidator, Validation};
pub use strategy::{CatalogHealth, Retrieval, RetrievalContext, Strategy};
