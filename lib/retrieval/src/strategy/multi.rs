use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at};
use tracing::{debug, info, warn};

use shortlist_core::{CatalogItem, FallbackTier, Predicate, Result, SegmentStats, StrategyKind};

use super::{full_catalog, must_have_only, single, CatalogHealth, PoolBuilder, Retrieval, RetrievalContext};
use crate::segment::{required_valid, Segment, SegmentGenerator, SegmentValidator};

enum SegmentOutcome {
    Rows(Vec<Arc<CatalogItem>>),
    Failed(String),
    TimedOut,
}

/// Multi-Segment retrieval: generate `requested` segments, query them
/// concurrently and merge the results in segment order.
pub async fn retrieve(
    ctx: &RetrievalContext<'_>,
    generator: Option<&Arc<dyn SegmentGenerator>>,
    requested: usize,
) -> Result<Retrieval> {
    let mut stats = SegmentStats { requested, ..SegmentStats::default() };

    let Some(generator) = generator else {
        warn!("no segment generator configured, using single-query retrieval");
        return fallback_to_single(ctx, stats).await;
    };

    let Some(segments) = generate_valid(ctx, &**generator, requested, &mut stats).await else {
        warn!(attempts = stats.generator_attempts, "segment generation failed, using single-query retrieval");
        return fallback_to_single(ctx, stats).await;
    };

    let mut health = CatalogHealth::default();
    let outcomes = execute(ctx, &segments).await?;

    let mut pool = PoolBuilder::default();
    for (idx, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(SegmentOutcome::Rows(rows)) => {
                stats.succeeded += 1;
                health.succeeded += 1;
                debug!(segment = idx, rows = rows.len(), "segment returned");
                pool.extend(rows, ctx.filters);
            }
            Some(SegmentOutcome::Failed(error)) => {
                stats.failed += 1;
                health.failed += 1;
                warn!(segment = idx, error = %error, "segment query failed");
                health.last_error = Some(error);
            }
            Some(SegmentOutcome::TimedOut) | None => {
                stats.timed_out += 1;
                warn!(segment = idx, "segment timed out");
            }
        }
    }

    let tier = if !pool.is_empty() {
        FallbackTier::Strict
    } else {
        must_have_only(ctx, &mut pool, &mut health).await?;
        if !pool.is_empty() {
            FallbackTier::MustHaveOnly
        } else {
            full_catalog(ctx, &mut pool, &mut health).await;
            FallbackTier::FullCatalog
        }
    };
    info!(tier = ?tier, succeeded = stats.succeeded, failed = stats.failed, timed_out = stats.timed_out, "segments merged");

    let mut retrieval = pool.finish(tier, StrategyKind::MultiSegment, health);
    retrieval.segments = Some(stats);
    Ok(retrieval)
}

async fn fallback_to_single(ctx: &RetrievalContext<'_>, stats: SegmentStats) -> Result<Retrieval> {
    let mut retrieval = single::retrieve(ctx).await?;
    retrieval.segments = Some(stats);
    Ok(retrieval)
}

/// Ask the generator until a response has enough valid segments. A generator
/// still pending at the deadline ends the attempts.
async fn generate_valid(
    ctx: &RetrievalContext<'_>,
    generator: &dyn SegmentGenerator,
    requested: usize,
    stats: &mut SegmentStats,
) -> Option<Vec<Segment>> {
    let needed = required_valid(requested, &ctx.config.segments);
    let validator = SegmentValidator::new(ctx.filters, &ctx.config.normalization, &ctx.config.segments);

    for attempt in 0..=ctx.config.segments.max_retries {
        stats.generator_attempts += 1;
        let raw = match timeout_at(ctx.deadline, generator.generate(ctx.filters, requested)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(attempt, error = %e, "segment generator failed");
                continue;
            }
            Err(_) => {
                warn!(attempt, "segment generator still pending at the deadline");
                return None;
            }
        };

        let validation = validator.validate(raw, requested);
        stats.valid = stats.valid.max(validation.accepted.len());
        if validation.accepted.len() >= needed {
            stats.valid = validation.accepted.len();
            debug!(
                attempt,
                valid = validation.accepted.len(),
                rejected = validation.rejected.len(),
                repaired = validation.repaired,
                "segments accepted"
            );
            return Some(validation.accepted);
        }
        warn!(attempt, valid = validation.accepted.len(), needed, "too few valid segments");
    }
    None
}

/// Run every segment query on a bounded pool. Results are indexed by segment;
/// `None` marks a segment still running at the deadline.
async fn execute(ctx: &RetrievalContext<'_>, segments: &[Segment]) -> Result<Vec<Option<SegmentOutcome>>> {
    let retrieval = &ctx.config.retrieval;
    let semaphore = Arc::new(Semaphore::new(retrieval.parallelism));
    let mut set: JoinSet<(usize, SegmentOutcome)> = JoinSet::new();

    for (idx, segment) in segments.iter().enumerate() {
        let soft = segment.filters.constraints.keys().map(String::as_str);
        let predicate = Predicate::new(segment.filters.condition_with(soft)?);
        let catalog = Arc::clone(&ctx.catalog);
        let semaphore = Arc::clone(&semaphore);
        let limit = retrieval.rows_per_segment;
        let per_segment = retrieval.segment_timeout();

        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (idx, SegmentOutcome::Failed("worker pool closed".to_string()));
            };
            let outcome = match timeout(per_segment, catalog.query(&predicate, limit)).await {
                Ok(Ok(rows)) => SegmentOutcome::Rows(rows),
                Ok(Err(e)) => SegmentOutcome::Failed(e.to_string()),
                Err(_) => SegmentOutcome::TimedOut,
            };
            (idx, outcome)
        });
    }

    let mut outcomes: Vec<Option<SegmentOutcome>> = (0..segments.len()).map(|_| None).collect();
    loop {
        match timeout_at(ctx.deadline, set.join_next()).await {
            Ok(Some(Ok((idx, outcome)))) => outcomes[idx] = Some(outcome),
            Ok(Some(Err(e))) => warn!(error = %e, "segment task aborted"),
            Ok(None) => break,
            Err(_) => {
                warn!(pending = set.len(), "overall deadline reached, abandoning segments");
                set.abort_all();
                break;
            }
        }
    }
    Ok(outcomes)
}
