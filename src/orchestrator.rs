//! Fetch orchestration
//!
//! Drives the two concurrency-bounded stages of a run: (a) one task per
//! enabled source, (b) one asset-localization task per fetched item. Both
//! stages buffer results by index so completion order never leaks into
//! output order. A source that exhausts its retries is recorded as failed
//! and the run continues; the orchestrator itself only errors when the run
//! is cancelled.

use crate::assets::AssetStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sources;
use crate::types::{FetchOutcome, Item};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the fetch and localize stages for every enabled source
///
/// Returns one [`FetchOutcome`] per enabled source, in configuration order,
/// with every successful item's images localized through `store`.
///
/// # Errors
/// Only [`Error::Cancelled`]; per-source and per-image failures are recorded
/// in the outcomes and the store's failure counter instead of propagating.
pub async fn fetch_all(
    client: &reqwest::Client,
    config: &Config,
    store: &AssetStore,
    cancel: &CancellationToken,
) -> Result<Vec<FetchOutcome>> {
    let outcomes = fetch_stage(client, config, cancel).await;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let outcomes = localize_stage(outcomes, store, config.workers.asset_workers, cancel).await;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    Ok(outcomes)
}

/// Stage (a): fetch every enabled source under the source worker pool
async fn fetch_stage(
    client: &reqwest::Client,
    config: &Config,
    cancel: &CancellationToken,
) -> Vec<FetchOutcome> {
    // buffered() preserves configuration order regardless of which source
    // resolves first
    stream::iter(config.enabled_sources())
        .map(|source| async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(crate::error::SourceFetchError::Cancelled {
                    source_id: source.id.clone(),
                }),
                result = sources::fetch_source(
                    client,
                    source,
                    &config.retry,
                    config.workers.source_workers,
                ) => result,
            };

            match &result {
                Ok(items) => {
                    info!(source = %source.id, items = items.len(), "source fetched");
                }
                Err(e) => {
                    warn!(source = %source.id, error = %e, "source failed, continuing");
                }
            }

            FetchOutcome {
                source_id: source.id.clone(),
                display_name: source.display_name().to_string(),
                kind: source.kind,
                result,
            }
        })
        .buffered(config.workers.source_workers.max(1))
        .collect()
        .await
}

/// Stage (b): localize every item's images under the asset worker pool
///
/// Items are pulled out of their outcomes with (source, item) coordinates,
/// processed with `buffer_unordered`, and re-placed by coordinate, so the
/// adapter-delivered order survives arbitrary completion interleaving.
async fn localize_stage(
    mut outcomes: Vec<FetchOutcome>,
    store: &AssetStore,
    workers: usize,
    cancel: &CancellationToken,
) -> Vec<FetchOutcome> {
    let mut tasks: Vec<(usize, usize, Item)> = Vec::new();
    for (source_idx, outcome) in outcomes.iter_mut().enumerate() {
        if let Ok(items) = &mut outcome.result {
            for (item_idx, item) in std::mem::take(items).into_iter().enumerate() {
                tasks.push((source_idx, item_idx, item));
            }
        }
    }

    let localized: Vec<(usize, usize, Item)> = stream::iter(tasks)
        .map(|(source_idx, item_idx, mut item)| async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = store.localize_item(&mut item) => {
                    if let Err(e) = result {
                        // the item survives with its image references dropped
                        warn!(item = %item.id, error = %e, "keeping item without images");
                    }
                }
            }
            (source_idx, item_idx, item)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut by_source: BTreeMap<usize, Vec<(usize, Item)>> = BTreeMap::new();
    for (source_idx, item_idx, item) in localized {
        by_source.entry(source_idx).or_default().push((item_idx, item));
    }
    for (source_idx, mut pairs) in by_source {
        pairs.sort_by_key(|(item_idx, _)| *item_idx);
        if let Ok(items) = &mut outcomes[source_idx].result {
            *items = pairs.into_iter().map(|(_, item)| item).collect();
        }
    }

    outcomes
}
