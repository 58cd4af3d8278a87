use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::checker::Prober;
use crate::channel::ResultPublisher;
use crate::metrics::MetricsRecorder;
use crate::types::{CheckResult, Target};

/// Worker count used when none is configured
pub const DEFAULT_WORKERS: usize = 25;

/// Fixed-size pool of probe workers sharing one work queue.
///
/// Finished results are handed to a single publish task through an unbounded queue, so a
/// slow transport or consumer never holds up probing. `run_cycle` returns once every
/// target of the batch has been probed, whether or not its result has been published yet.
/// Results reach the publisher in the order they were produced.
pub struct ProbePool {
    prober: Arc<dyn Prober>,
    publisher: Arc<dyn ResultPublisher>,
    metrics: Arc<dyn MetricsRecorder>,
    workers: usize,
    outbox: mpsc::UnboundedSender<CheckResult>,
    /// Taken by the first cycle, which starts the publish task
    pending_outbox: StdMutex<Option<mpsc::UnboundedReceiver<CheckResult>>>,
}

impl ProbePool {
    pub fn new(
        prober: Arc<dyn Prober>,
        publisher: Arc<dyn ResultPublisher>,
        metrics: Arc<dyn MetricsRecorder>,
        workers: usize,
    ) -> Self {
        let (outbox, pending) = mpsc::unbounded_channel();
        Self {
            prober,
            publisher,
            metrics,
            workers: workers.max(1),
            outbox,
            pending_outbox: StdMutex::new(Some(pending)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start the publish task on first use. It runs until the pool is dropped and the
    /// queue has drained.
    fn ensure_publisher(&self) {
        let pending = self
            .pending_outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut outbox) = pending else { return };

        let publisher = Arc::clone(&self.publisher);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            while let Some(result) = outbox.recv().await {
                if let Err(e) = publisher.publish(&result).await {
                    metrics.publish_failed();
                    warn!(url = %result.url, error = %e, "Failed to publish check result");
                }
            }
            debug!("Result publisher finished");
        });
    }

    /// Probe every target once and collect one result per target.
    pub async fn run_cycle(&self, targets: Vec<Target>) -> Vec<CheckResult> {
        let total = targets.len();
        if total == 0 {
            return Vec::new();
        }
        self.ensure_publisher();

        // both queues are sized to the whole batch
        let (job_tx, job_rx) = mpsc::channel::<Target>(total);
        for target in targets {
            if job_tx.try_send(target).is_err() {
                error!("Probe queue rejected a target");
            }
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<CheckResult>(total);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers.min(total) {
            let jobs = Arc::clone(&job_rx);
            let results = result_tx.clone();
            let outbox = self.outbox.clone();
            let prober = Arc::clone(&self.prober);
            let metrics = Arc::clone(&self.metrics);

            workers.spawn(async move {
                loop {
                    let next = jobs.lock().await.recv().await;
                    let Some(target) = next else { break };

                    let result = prober.probe(&target.url).await;
                    metrics.check_completed(&result);

                    if outbox.send(result.clone()).is_err() {
                        metrics.publish_failed();
                        warn!(url = %result.url, "Result publisher is gone, dropping result");
                    }

                    if results.send(result).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Probe worker finished");
            });
        }
        drop(result_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Probe worker terminated abnormally");
            }
        }

        let mut collected = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            collected.push(result);
        }
        collected
    }
}
