use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use shortlist_core::{CatalogItem, Predicate};

use crate::Result;

/// Monotonic catalog revision; any row change produces a new version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogVersion(pub u64);

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Read access to the product catalog.
///
/// Implementations must return rows in a stable order for a given catalog
/// version so that retrieval stays deterministic.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Rows matching `predicate`, at most `limit`
    async fn query(&self, predicate: &Predicate, limit: usize) -> Result<Vec<Arc<CatalogItem>>>;

    /// Number of rows matching `predicate`
    async fn count(&self, predicate: &Predicate) -> Result<usize>;

    /// Unfiltered page of rows starting at `offset`
    async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Arc<CatalogItem>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn version(&self) -> CatalogVersion;
}
