//! # Shortlist Similarity
//!
//! Token-space similarity for catalog rows.
//!
//! ## Features
//!
//! - **Weight Table**: Declarative per-attribute weights, numeric bins and preference expansions
//! - **Preference Vectorizer**: FilterSet + PreferenceSignal to a sparse token vector
//! - **Item Embedder**: Catalog row to a token vector in the same space, cached per catalog version
//! - **Scorer**: Cosine scoring with a total tie-break order
//! - **Diversifier**: Clustered maximal marginal relevance
//! - **Re-ranker**: BM25 keyword relevance against the raw utterance
//!
//! ## Example
//!
//! ```rust
//! use shortlist_similarity::{ItemEmbedder, PreferenceVectorizer, WeightTable};
//! use shortlist_core::{CatalogItem, Constraint, FilterSet, PreferenceSignal};
//! use std::sync::Arc;
//!
//! let weights = Arc::new(WeightTable::default());
//! let filters = FilterSet::new().with_constraint("make", Constraint::Exact("honda".into()));
//!
//! let preference = PreferenceVectorizer::new(Arc::clone(&weights)).vectorize(&filters, &PreferenceSignal::default());
//! let item = ItemEmbedder::new(weights).embed(&CatalogItem::new("vin-1").with_attr("make", "honda"));
//!
//! assert!(preference.cosine_similarity(&item) > 0.99);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ WeightTable │────>│  Embedder   │────>│    Cache    │
//! │  (tokens)   │     │ (item→v)    │     │ (version)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!       │                                        │
//!       │  ┌─────────────┐     ┌─────────────┐   │
//!       └─>│ Vectorizer  │────>│   Scorer    │<──┘
//!          │ (request→v) │     │  (cosine)   │
//!          └─────────────┘     └─────────────┘
//!                                     │
//!                              ┌─────────────┐     ┌─────────────┐
//!                              │ Diversifier │────>│  Reranker   │
//!                              │   (MMR)     │     │   (BM25)    │
//!                              └─────────────┘     └─────────────┘
//! ```

pub mod bins;
pub mod cache;
pub mod diversity;
pub mod embedder;
pub mod rerank;
pub mod scorer;
pub mod vectorizer;
pub mod weights;

pub use cache::{CacheToken, EmbeddingCache};
pub use diversity::{assign_clusters, diversify, Diversified, DiversityParams};
pub use embedder::{EmbedderBuilder, ItemEmbedder};
pub use rerank::{KeywordReranker, RerankError, Reranked};
pub use scorer::{compare_candidates, ScoredPool, SimilarityScorer};
pub use vectorizer::PreferenceVectorizer;
pub use weights::{PriceTiers, SchemaError, WeightTable};
