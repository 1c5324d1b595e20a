//! Background session cleanup.
//!
//! Owns its schedule and its shutdown: the sweeper is spawned once at
//! startup and stops when the process-wide cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::SessionManager;

/// Minimum sweep interval; anything lower just hammers the store.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically deletes expired and revoked session rows.
pub struct SessionSweeper {
    manager: Arc<SessionManager>,
    sweep_interval: Duration,
    shutdown: CancellationToken,
}

impl SessionSweeper {
    /// Create a sweeper. The interval is clamped to a minimum of 60s.
    pub fn new(
        manager: Arc<SessionManager>,
        sweep_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            sweep_interval: sweep_interval.max(MIN_SWEEP_INTERVAL),
            shutdown,
        }
    }

    /// Run until the shutdown token fires.
    pub async fn run(self) {
        info!(
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Starting session sweeper"
        );

        let mut ticker = interval(self.sweep_interval);
        // The first tick completes immediately; skip it so startup isn't
        // a sweep.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Session sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Running session sweep");
                    match self.manager.cleanup_sessions().await {
                        Ok(removed) if removed > 0 => {
                            debug!(removed, "Session sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Session sweep failed"),
                    }
                }
            }
        }
    }
}
