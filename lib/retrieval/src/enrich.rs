//! Media enrichment
//!
//! Items lacking media are sent to a [`MediaEnricher`] on a bounded worker
//! pool, each fetch under its own timeout. A failed or late fetch leaves the
//! item untouched; callers decide whether media-less items survive.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use shortlist_core::{CatalogItem, MediaAsset};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnrichError {
    #[error("Media service unavailable: {0}")]
    Unavailable(String),
    #[error("No media for item {0}")]
    NotFound(String),
}

/// Source of photos and other media for catalog rows
#[async_trait]
pub trait MediaEnricher: Send + Sync {
    async fn fetch_media(&self, item: &CatalogItem) -> Result<Vec<MediaAsset>, EnrichError>;
}

#[derive(Debug, Clone, Default)]
pub struct EnrichOutcome {
    /// Same order as the input
    pub items: Vec<Arc<CatalogItem>>,
    pub enriched: usize,
    pub failed: usize,
    pub timed_out: usize,
}

enum Fetch {
    Media(Vec<MediaAsset>),
    Failed,
    TimedOut,
}

pub async fn enrich_items(
    enricher: Arc<dyn MediaEnricher>,
    items: Vec<Arc<CatalogItem>>,
    parallelism: usize,
    item_timeout: Duration,
) -> EnrichOutcome {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set: JoinSet<(usize, Fetch)> = JoinSet::new();

    for (idx, item) in items.iter().enumerate() {
        if item.has_media() {
            continue;
        }
        let item = Arc::clone(item);
        let enricher = Arc::clone(&enricher);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (idx, Fetch::Failed);
            };
            let fetch = match timeout(item_timeout, enricher.fetch_media(&item)).await {
                Ok(Ok(media)) => Fetch::Media(media),
                Ok(Err(e)) => {
                    debug!(item = %item.id, error = %e, "media fetch failed");
                    Fetch::Failed
                }
                Err(_) => Fetch::TimedOut,
            };
            (idx, fetch)
        });
    }

    let mut outcome = EnrichOutcome { items, ..EnrichOutcome::default() };
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, Fetch::Media(media))) => {
                if media.is_empty() {
                    continue;
                }
                let mut item = CatalogItem::clone(&outcome.items[idx]);
                item.media = media;
                outcome.items[idx] = Arc::new(item);
                outcome.enriched += 1;
            }
            Ok((_, Fetch::Failed)) => outcome.failed += 1,
            Ok((_, Fetch::TimedOut)) => outcome.timed_out += 1,
            Err(e) => {
                warn!(error = %e, "media task aborted");
                outcome.failed += 1;
            }
        }
    }

    if outcome.failed > 0 || outcome.timed_out > 0 {
        warn!(failed = outcome.failed, timed_out = outcome.timed_out, "media enrichment incomplete");
    }
    outcome
}
