//! Parallel alert processing partitioned by URL.
//!
//! One reader pulls messages off the transport and routes each result to a worker chosen
//! by a hash of its URL. A URL therefore always lands on the same worker, which keeps
//! the read-decide-write sequence for that URL sequential without any locking.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::engine::{AlertEngine, READ_RETRY_DELAY};
use crate::channel::{Delivery, ResultConsumer};
use crate::shutdown::Shutdown;
use crate::types::CheckResult;

/// Messages buffered per shard before the reader waits
const SHARD_QUEUE_DEPTH: usize = 64;

/// Index of the shard responsible for `url`.
pub fn shard_for(url: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

pub struct ShardedAlertEngine {
    engine: Arc<AlertEngine>,
    shards: usize,
}

impl ShardedAlertEngine {
    pub fn new(engine: Arc<AlertEngine>, shards: usize) -> Self {
        Self { engine, shards: shards.max(1) }
    }

    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Consume until the channel closes or `shutdown` fires, then let every shard finish
    /// the results already routed to it.
    pub async fn run(&self, consumer: Arc<dyn ResultConsumer>, mut shutdown: Shutdown) {
        if self.shards == 1 {
            return self.engine.run(consumer, shutdown).await;
        }

        info!(shards = self.shards, "Listening for check results");

        let mut senders = Vec::with_capacity(self.shards);
        let mut workers = JoinSet::new();
        for shard in 0..self.shards {
            let (tx, mut rx) = mpsc::channel::<(Delivery, CheckResult)>(SHARD_QUEUE_DEPTH);
            senders.push(tx);

            let engine = Arc::clone(&self.engine);
            let consumer = Arc::clone(&consumer);
            workers.spawn(async move {
                while let Some((delivery, result)) = rx.recv().await {
                    engine.process(&result).await;
                    if let Err(e) = consumer.ack(&delivery).await {
                        warn!(shard, id = %delivery.id, error = %e, "Failed to acknowledge message");
                    }
                }
                debug!(shard, "Alert shard drained");
            });
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = consumer.next_delivery() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    let Some(result) = self.engine.decode(&delivery) else {
                        if let Err(e) = consumer.ack(&delivery).await {
                            warn!(id = %delivery.id, error = %e, "Failed to acknowledge message");
                        }
                        continue;
                    };
                    let shard = shard_for(&result.url, self.shards);
                    if senders[shard].send((delivery, result)).await.is_err() {
                        error!(shard, "Alert shard is gone, stopping reader");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Result channel closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Error reading message");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(READ_RETRY_DELAY) => {}
                    }
                }
            }
        }

        drop(senders);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Alert shard terminated abnormally");
            }
        }

        info!("Shutting down consumer...");
    }
}
