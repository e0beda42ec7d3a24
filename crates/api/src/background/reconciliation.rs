//! Periodic reconciliation of abandoned generations.
//!
//! A run lost to a crash or restart leaves its record `pending` or
//! `processing`. This job fails such records once they pass the stale cutoff
//! and drops expired entries from the content caches.

use std::time::Duration;

use reverie_pipeline::GenerationService;
use tokio_util::sync::CancellationToken;

/// Run the reconciliation loop until `cancel` is triggered.
pub async fn run(service: GenerationService, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Generation reconciliation job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Generation reconciliation job stopping");
                break;
            }
            _ = interval.tick() => {
                match service.reconcile_stale().await {
                    Ok(0) => tracing::debug!("Reconciliation: no stale generations"),
                    Ok(failed) => tracing::info!(failed, "Reconciliation: failed stale generations"),
                    Err(e) => tracing::error!(error = %e, "Reconciliation: sweep failed"),
                }

                let purged = service.purge_caches();
                if purged > 0 {
                    tracing::debug!(purged, "Reconciliation: purged expired cache entries");
                }
            }
        }
    }
}
