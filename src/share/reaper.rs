//! Background sweep that deletes dead shares.
//!
//! The reaper never decides liveness itself: for every stored token it asks
//! [`ShareService::is_dead`] and purges the ones that are.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::lifecycle::ShareService;

/// Default time between sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval the reaper accepts.
const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// What a single sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Tokens examined.
    pub scanned: usize,
    /// Dead shares deleted.
    pub removed: usize,
    /// Dead shares that could not be deleted.
    pub failed: usize,
}

/// Periodic sweeper for revoked and expired shares.
pub struct Reaper {
    service: Arc<ShareService>,
    interval: Duration,
}

impl Reaper {
    pub fn new(service: Arc<ShareService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(MIN_REAP_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep once, now.
    pub async fn run_cycle(&self) -> ReapReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Sweep once, judging liveness at `now`.
    ///
    /// A share that fails to delete is logged and skipped; the sweep goes on.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> ReapReport {
        let mut report = ReapReport::default();

        let tokens = match self.service.known_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(error = %e, "Sweep could not enumerate shares");
                return report;
            }
        };

        for token in tokens {
            report.scanned += 1;
            if !self.service.is_dead(&token, now).await {
                continue;
            }
            match self.service.purge(&token).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(token = %token, error = %e, "Failed to delete dead share");
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                failed = report.failed,
                "Sweep finished"
            );
        } else {
            debug!(scanned = report.scanned, "Sweep finished, nothing to remove");
        }
        report
    }

    /// Run the sweep on a fixed interval until `shutdown` fires.
    ///
    /// The first sweep happens immediately, so shares that died while the
    /// process was down are reclaimed at startup.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Reaper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    _ = shutdown.recv() => {
                        info!("Reaper stopped");
                        break;
                    }
                }
            }
        })
    }
}
