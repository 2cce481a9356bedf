//! The Outbox Cleanup Task (§4.7 `cleanup_outbox`, §5): a periodic sweep
//! per configured endpoint alias, shaped after the teacher's
//! `tenant::tasks` background-loop pattern — `tokio::select!` between a
//! `CancellationToken` and a sleep, with exponential backoff after an
//! unexpected failure.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utils::backoff;

use crate::metrics::Metrics;
use crate::repository::DataRepository;

/// How often a healthy sweep re-runs for a given alias. The spec's
/// `cache_timeout` controls the age threshold within a sweep, not the
/// sweep's own period.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub async fn cleanup_loop(
    repository: DataRepository,
    alias: String,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            info!(alias, "cleanup loop shutting down");
            return;
        }

        match repository.cleanup_outbox(&alias).await {
            Ok(removed) => {
                consecutive_failures = 0;
                info!(alias, removed, "outbox cleanup sweep completed");
                metrics.outbox_objects_removed.inc_by(removed as u64);
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(alias, error = %e, "outbox cleanup sweep failed");
                backoff::exponential_backoff(
                    consecutive_failures,
                    backoff::DEFAULT_BASE_BACKOFF_SECONDS,
                    backoff::DEFAULT_MAX_BACKOFF_SECONDS,
                    &cancel,
                )
                .await;
                continue;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
            _ = cancel.cancelled() => {
                info!(alias, "cleanup loop shutting down");
                return;
            }
        }
    }
}
