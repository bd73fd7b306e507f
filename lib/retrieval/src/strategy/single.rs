use tracing::{debug, info};

use shortlist_core::{FallbackTier, Predicate, Result, StrategyKind};

use super::{full_catalog, must_have_only, CatalogHealth, PoolBuilder, Retrieval, RetrievalContext};
use crate::config::PrimaryScope;

/// Single-Query retrieval with the relaxation ladder:
/// strict, relaxed (one soft constraint dropped at a time), must-have only,
/// full catalog.
pub async fn retrieve(ctx: &RetrievalContext<'_>) -> Result<Retrieval> {
    let mut health = CatalogHealth::default();
    let ceiling = ctx.config.retrieval.row_ceiling;

    let mut soft: Vec<&str> = match ctx.config.retrieval.primary_scope {
        PrimaryScope::MustHave => Vec::new(),
        PrimaryScope::MustHaveAndFilters => ctx.filters.constraints.keys().map(String::as_str).collect(),
    };

    let mut pool = PoolBuilder::default();
    let predicate = Predicate::new(ctx.filters.condition_with(soft.iter().copied())?);
    if let Some(rows) = health.bounded(ctx.deadline, "strict", ctx.catalog.query(&predicate, ceiling)).await {
        pool.extend(rows, ctx.filters);
    }
    if !pool.is_empty() {
        debug!(rows = pool.pool.len(), "strict tier matched");
        return Ok(pool.finish(FallbackTier::Strict, StrategyKind::SingleQuery, health));
    }

    if !soft.is_empty() {
        let mut dropped: Vec<String> = Vec::new();
        while !soft.is_empty() {
            let Some(victim) = least_selective(ctx, &soft, &mut health).await? else {
                break;
            };
            soft.retain(|attr| *attr != victim);
            dropped.push(victim.to_string());
            if soft.is_empty() {
                break;
            }

            let predicate = Predicate::new(ctx.filters.condition_with(soft.iter().copied())?);
            if let Some(rows) = health.bounded(ctx.deadline, "relaxed", ctx.catalog.query(&predicate, ceiling)).await {
                pool.extend(rows, ctx.filters);
            }
            if !pool.is_empty() {
                info!(tier = "relaxed", dropped = ?dropped, "relaxed soft constraints");
                return Ok(pool.finish(FallbackTier::Relaxed { dropped }, StrategyKind::SingleQuery, health));
            }
        }

        must_have_only(ctx, &mut pool, &mut health).await?;
        if !pool.is_empty() {
            info!(tier = "must_have_only", "fell back to must-have constraints");
            return Ok(pool.finish(FallbackTier::MustHaveOnly, StrategyKind::SingleQuery, health));
        }
    }

    full_catalog(ctx, &mut pool, &mut health).await;
    info!(tier = "full_catalog", rows = pool.pool.len(), "fell back to full catalog");
    Ok(pool.finish(FallbackTier::FullCatalog, StrategyKind::SingleQuery, health))
}

/// The remaining soft constraint matching the most rows on its own; ties go
/// to the attribute name
async fn least_selective<'s>(
    ctx: &RetrievalContext<'_>,
    soft: &[&'s str],
    health: &mut CatalogHealth,
) -> Result<Option<&'s str>> {
    let mut best: Option<(usize, &'s str)> = None;
    for &attr in soft {
        let predicate = Predicate::new(ctx.filters.condition_with([attr])?);
        let count = health.bounded(ctx.deadline, "count", ctx.catalog.count(&predicate)).await.unwrap_or(0);
        let better = match best {
            None => true,
            Some((best_count, best_attr)) => count > best_count || (count == best_count && attr < best_attr),
        };
        if better {
            best = Some((count, attr));
        }
    }
    Ok(best.map(|(_, attr)| attr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use async_trait::async_trait;
    use shortlist_catalog::{CatalogStore, CatalogVersion, InMemoryCatalog};
    use shortlist_core::{CatalogItem, Constraint, FilterSet, TokenVector};
    use shortlist_similarity::{EmbeddingCache, ItemEmbedder, SimilarityScorer, WeightTable};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::from_items([
            CatalogItem::new("1").with_attr("body_style", "suv").with_attr("make", "honda").with_attr("color", "red"),
            CatalogItem::new("2").with_attr("body_style", "suv").with_attr("make", "mazda").with_attr("color", "blue"),
            CatalogItem::new("3").with_attr("body_style", "suv").with_attr("make", "kia").with_attr("color", "blue"),
            CatalogItem::new("4").with_attr("body_style", "sedan").with_attr("make", "honda"),
        ]))
    }

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(
            Arc::new(ItemEmbedder::new(Arc::new(WeightTable::default()))),
            Arc::new(EmbeddingCache::new()),
        )
    }

    /// Never answers
    struct Stalled;

    #[async_trait]
    impl CatalogStore for Stalled {
        async fn query(&self, _: &Predicate, _: usize) -> shortlist_catalog::Result<Vec<Arc<CatalogItem>>> {
            std::future::pending().await
        }

        async fn count(&self, _: &Predicate) -> shortlist_catalog::Result<usize> {
            std::future::pending().await
        }

        async fn scan(&self, _: usize, _: usize) -> shortlist_catalog::Result<Vec<Arc<CatalogItem>>> {
            std::future::pending().await
        }

        fn len(&self) -> usize {
            0
        }

        fn version(&self) -> CatalogVersion {
            CatalogVersion(0)
        }
    }

    async fn run_on(
        catalog: Arc<dyn CatalogStore>,
        filters: &FilterSet,
        scope: PrimaryScope,
        budget: Duration,
    ) -> Retrieval {
        let mut config = EngineConfig::default();
        config.retrieval.primary_scope = scope;
        let scorer = scorer();
        let preference = TokenVector::new();
        let ctx = RetrievalContext {
            catalog,
            filters,
            preference: &preference,
            scorer: &scorer,
            config: &config,
            deadline: Instant::now() + budget,
        };
        retrieve(&ctx).await.unwrap()
    }

    async fn run(filters: &FilterSet, scope: PrimaryScope) -> Retrieval {
        run_on(catalog(), filters, scope, Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn test_must_have_scope_ignores_soft_constraints() {
        let filters = FilterSet::new()
            .with_must_have("body_style", Constraint::Exact("suv".into()))
            .with_constraint("make", Constraint::Exact("tesla".into()));
        let r = run(&filters, PrimaryScope::MustHave).await;
        assert_eq!(r.tier, FallbackTier::Strict);
        assert_eq!(r.pool.len(), 3);
    }

    #[tokio::test]
    async fn test_relaxes_least_selective_first() {
        // color=blue matches two suvs, make=honda one
        let filters = FilterSet::new()
            .with_must_have("body_style", Constraint::Exact("suv".into()))
            .with_constraint("make", Constraint::Exact("honda".into()))
            .with_constraint("color", Constraint::Exact("blue".into()));
        let r = run(&filters, PrimaryScope::MustHaveAndFilters).await;
        assert_eq!(r.tier, FallbackTier::Relaxed { dropped: vec!["color".into()] });
        assert_eq!(r.pool.len(), 1);
        assert_eq!(r.pool[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn test_falls_back_to_must_have_only() {
        let filters = FilterSet::new()
            .with_must_have("body_style", Constraint::Exact("suv".into()))
            .with_constraint("make", Constraint::Exact("tesla".into()));
        let r = run(&filters, PrimaryScope::MustHaveAndFilters).await;
        assert_eq!(r.tier, FallbackTier::MustHaveOnly);
        assert_eq!(r.pool.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_must_have_match_scans_catalog() {
        let filters = FilterSet::new().with_must_have("body_style", Constraint::Exact("truck".into()));
        let r = run(&filters, PrimaryScope::MustHave).await;
        assert_eq!(r.tier, FallbackTier::FullCatalog);
        assert_eq!(r.pool.len(), 4);
    }

    #[tokio::test]
    async fn test_stalled_catalog_ends_at_deadline() {
        let filters = FilterSet::new()
            .with_must_have("body_style", Constraint::Exact("suv".into()))
            .with_constraint("make", Constraint::Exact("honda".into()))
            .with_constraint("color", Constraint::Exact("blue".into()));
        let run = run_on(Arc::new(Stalled), &filters, PrimaryScope::MustHaveAndFilters, Duration::from_millis(50));
        let r = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("retrieval must finish once the deadline passes");

        assert!(r.pool.is_empty());
        assert_eq!(r.tier, FallbackTier::FullCatalog);
        assert!(r.health.timed_out >= 4);
        assert_eq!(r.health.failed, 0);
        assert!(!r.health.is_down());
    }
}
