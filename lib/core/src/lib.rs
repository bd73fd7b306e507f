//! # Shortlist Core
//!
//! Core data model for the Shortlist retrieval engine.
//!
//! This crate provides the types shared by every stage of the pipeline:
//!
//! - [`FilterSet`] - Normalized hard and soft constraints plus the [`AvoidList`]
//! - [`PreferenceSignal`] - Inferred soft preferences
//! - [`CatalogItem`] - A catalog row with a stable [`ItemId`]
//! - [`Predicate`] - Predicate language evaluated by catalog stores
//! - [`TokenVector`] - Sparse weighted token vector with cosine similarity
//! - [`BM25Index`] - Keyword scoring for the final re-ranking pass
//! - [`RankedResult`] and [`Diagnostics`] - Engine output
//!
//! ## Example
//!
//! ```rust
//! use shortlist_core::{FilterSet, RawFilterSet, Normalizer, Predicate, Filter, CatalogItem};
//!
//! let mut raw = RawFilterSet::default();
//! raw.must_have.insert("Body Type".to_string(), "SUV".into());
//! raw.constraints.insert("price".to_string(), "0-30000".into());
//!
//! let (filters, rejected) = FilterSet::from_raw(&raw, &Normalizer::default());
//! assert!(rejected.is_empty());
//!
//! let predicate = Predicate::new(filters.base_condition().unwrap());
//! let item = CatalogItem::new("vin-1").with_attr("body_style", "suv").normalized();
//! assert!(predicate.matches(&item));
//! ```

pub mod bm25;
pub mod error;
pub mod filter;
pub mod filterset;
pub mod item;
pub mod normalize;
pub mod preference;
pub mod result;
pub mod vector;

pub use bm25::BM25Index;
pub use error::{Error, Result};
pub use filter::{Filter, FilterCondition, Predicate};
pub use filterset::{AvoidList, AvoidRule, Constraint, FieldMatch, FilterSet, RawAvoidRule, RawFilterSet, RawValue};
pub use item::{AttrValue, CatalogItem, GeoPoint, ItemId, MediaAsset};
pub use normalize::{normalize_text, parse_number, Normalizer};
pub use preference::{BudgetSensitivity, PreferenceSignal};
pub use result::{
    Diagnostics, FallbackTier, RankSignal, RankedEntry, RankedResult, RerankOutcome, ScoredCandidate, SegmentStats,
    StrategyKind,
};
pub use vector::TokenVector;
