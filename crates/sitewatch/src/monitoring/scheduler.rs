use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{error, info, warn};

use super::pool::ProbePool;
use crate::Result;
use crate::metrics::MetricsRecorder;
use crate::shutdown::Shutdown;
use crate::source::TargetSource;

/// Summary of one finished cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Drives probe cycles on a fixed interval.
///
/// Cycles never overlap: ticks that fall due while a cycle is still running are skipped
/// and the next cycle starts on the following interval boundary.
pub struct CheckerScheduler {
    source: Arc<dyn TargetSource>,
    pool: ProbePool,
    metrics: Arc<dyn MetricsRecorder>,
    interval: Duration,
}

impl CheckerScheduler {
    pub fn new(
        source: Arc<dyn TargetSource>,
        pool: ProbePool,
        metrics: Arc<dyn MetricsRecorder>,
        interval: Duration,
    ) -> Self {
        Self { source, pool, metrics, interval }
    }

    /// Run one cycle: fetch targets, probe the active ones, wait for all of them.
    ///
    /// If the target list cannot be fetched nothing is probed and the error is returned.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();

        let targets = match self.source.list_active_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                self.metrics.target_source_failed();
                return Err(e);
            }
        };

        let active: Vec<_> = targets.into_iter().filter(|t| t.active).collect();
        info!(count = active.len(), "Start checking sites");

        let results = self.pool.run_cycle(active).await;
        let succeeded = results.iter().filter(|r| r.success).count();
        let report = CycleReport {
            checked: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            elapsed: started.elapsed(),
        };

        self.metrics.cycle_completed(report.checked, report.elapsed);
        info!(
            sites_checked = report.checked,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Check cycle completed"
        );

        Ok(report)
    }

    /// Run cycles until `shutdown` fires. The first cycle starts immediately.
    ///
    /// A cycle already in progress when shutdown is requested runs to completion, but no
    /// new cycle is started afterwards.
    pub async fn run(&self, mut shutdown: Shutdown) {
        info!(
            interval_sec = self.interval.as_secs_f64(),
            workers = self.pool.workers(),
            "Checker service started"
        );

        let mut next_tick = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep_until(next_tick) => {}
            }
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Failed to get sites, skipping cycle");
            }

            let (next, skipped) = next_tick_after(next_tick, self.interval, Instant::now());
            if skipped > 0 {
                warn!(skipped, "Check cycle overran the interval, skipping ticks");
            }
            next_tick = next;
        }

        info!("Checker service stopped gracefully");
    }
}

/// Next tick strictly after `now` on the grid `previous + k * period`, and how many
/// grid points were passed over.
fn next_tick_after(previous: Instant, period: Duration, now: Instant) -> (Instant, u32) {
    if period.is_zero() {
        return (now, 0);
    }

    let next = previous + period;
    if next > now {
        return (next, 0);
    }

    let behind = now.duration_since(next).as_nanos() / period.as_nanos();
    let skipped = u32::try_from(behind + 1).unwrap_or(u32::MAX);
    (next + period * skipped, skipped)
}
