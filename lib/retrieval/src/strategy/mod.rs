//! Candidate retrieval strategies
//!
//! Both strategies produce a deduplicated, exclusion-filtered candidate pool
//! together with the fallback tier that produced it. Catalog failures are
//! absorbed per query and tallied in [`CatalogHealth`]; a query still pending
//! at the retrieval deadline reads as empty.

pub mod multi;
pub mod single;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::warn;

use shortlist_catalog::{CatalogError, CatalogStore};
use shortlist_core::{
    CatalogItem, FallbackTier, FilterSet, ItemId, Predicate, Result, SegmentStats, StrategyKind, TokenVector,
};
use shortlist_similarity::SimilarityScorer;

use crate::config::EngineConfig;

/// Strategy selector of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    SingleQuery,
    MultiSegment {
        /// Segments to request; the configured `segment_count` when absent
        #[serde(default)]
        segments: Option<usize>,
    },
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::SingleQuery => StrategyKind::SingleQuery,
            Strategy::MultiSegment { .. } => StrategyKind::MultiSegment,
        }
    }
}

/// Shared inputs of one retrieval
pub struct RetrievalContext<'a> {
    pub catalog: Arc<dyn CatalogStore>,
    pub filters: &'a FilterSet,
    pub preference: &'a TokenVector,
    pub scorer: &'a SimilarityScorer,
    pub config: &'a EngineConfig,
    /// End of the caller-visible time budget
    pub deadline: Instant,
}

/// Tally of catalog calls made during one retrieval
#[derive(Debug, Clone, Default)]
pub struct CatalogHealth {
    pub succeeded: usize,
    pub failed: usize,
    /// Calls abandoned at the retrieval deadline
    pub timed_out: usize,
    pub last_error: Option<String>,
}

impl CatalogHealth {
    pub fn record<T>(&mut self, result: std::result::Result<T, CatalogError>, what: &str) -> Option<T> {
        match result {
            Ok(value) => {
                self.succeeded += 1;
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, query = what, "catalog query failed, treating as empty");
                self.failed += 1;
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// Await `call` until `deadline`, then record it
    pub async fn bounded<T, F>(&mut self, deadline: Instant, what: &str, call: F) -> Option<T>
    where
        F: Future<Output = std::result::Result<T, CatalogError>>,
    {
        match timeout_at(deadline, call).await {
            Ok(result) => self.record(result, what),
            Err(_) => {
                warn!(query = what, "catalog query still pending at the deadline, treating as empty");
                self.timed_out += 1;
                None
            }
        }
    }

    /// Every catalog call failed
    pub fn is_down(&self) -> bool {
        self.failed > 0 && self.succeeded == 0
    }
}

/// Candidate pool produced by a strategy
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub pool: Vec<Arc<CatalogItem>>,
    pub tier: FallbackTier,
    /// Rows received after exclusion filtering, duplicates included
    pub rows_before_dedup: usize,
    pub avoid_filtered: usize,
    pub strategy_used: StrategyKind,
    pub segments: Option<SegmentStats>,
    pub health: CatalogHealth,
}

/// Accumulates rows in arrival order, first occurrence of an id wins
#[derive(Debug, Default)]
pub(crate) struct PoolBuilder {
    seen: AHashSet<ItemId>,
    pool: Vec<Arc<CatalogItem>>,
    rows: usize,
    avoid_filtered: usize,
}

impl PoolBuilder {
    pub(crate) fn extend(&mut self, rows: Vec<Arc<CatalogItem>>, filters: &FilterSet) {
        for row in rows {
            if filters.avoid_list.excludes(&row) {
                self.avoid_filtered += 1;
                continue;
            }
            self.rows += 1;
            if self.seen.insert(row.id.clone()) {
                self.pool.push(row);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub(crate) fn finish(self, tier: FallbackTier, strategy_used: StrategyKind, health: CatalogHealth) -> Retrieval {
        Retrieval {
            pool: self.pool,
            tier,
            rows_before_dedup: self.rows,
            avoid_filtered: self.avoid_filtered,
            strategy_used,
            segments: None,
            health,
        }
    }
}

/// must_have ∧ ¬avoid, capped at `row_ceiling`
pub(crate) async fn must_have_only(
    ctx: &RetrievalContext<'_>,
    pool: &mut PoolBuilder,
    health: &mut CatalogHealth,
) -> Result<()> {
    let predicate = Predicate::new(ctx.filters.base_condition()?);
    let rows = ctx.catalog.query(&predicate, ctx.config.retrieval.row_ceiling);
    if let Some(rows) = health.bounded(ctx.deadline, "must_have_only", rows).await {
        pool.extend(rows, ctx.filters);
    }
    Ok(())
}

/// Full-catalog fallback: scan every page, drop excluded rows, keep the
/// `row_ceiling` rows closest to the preference vector. Zero-similarity rows
/// are kept so that a non-empty catalog never yields an empty pool. Scanning
/// stops at the deadline with the pages fetched so far.
pub(crate) async fn full_catalog(ctx: &RetrievalContext<'_>, pool: &mut PoolBuilder, health: &mut CatalogHealth) {
    let page = ctx.config.retrieval.full_scan_page;
    let mut scanned: Vec<Arc<CatalogItem>> = Vec::new();
    let mut offset = 0;

    loop {
        let rows = ctx.catalog.scan(offset, page);
        let Some(rows) = health.bounded(ctx.deadline, "full_scan", rows).await else {
            break;
        };
        let fetched = rows.len();
        scanned.extend(rows.into_iter().filter(|row| {
            let excluded = ctx.filters.avoid_list.excludes(row);
            if excluded {
                pool.avoid_filtered += 1;
            }
            !excluded
        }));
        if fetched < page {
            break;
        }
        offset += fetched;
    }

    let version = ctx.catalog.version().0;
    let mut ranked = ctx.scorer.rank_all(&scanned, ctx.preference, version);
    ranked.truncate(ctx.config.retrieval.row_ceiling);
    pool.extend(ranked.into_iter().map(|c| c.item).collect(), ctx.filters);
}
