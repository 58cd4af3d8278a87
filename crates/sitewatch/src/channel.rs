//! Result channel between the checker and the alert engine.
//!
//! The transport carries serialized `CheckResult`s with at-least-once semantics: a
//! message stays eligible for redelivery until it has been acknowledged.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::types::CheckResult;
use crate::{Error, Result};

/// One message read from the transport, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transport-specific message id used for acknowledgement
    pub id: String,
    /// Raw message body, expected to be a JSON encoded `CheckResult`
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish(&self, result: &CheckResult) -> Result<()>;
}

#[async_trait]
pub trait ResultConsumer: Send + Sync {
    /// Suspend until the next message arrives. `Ok(None)` means the channel is closed and
    /// no further messages will ever arrive.
    async fn next_delivery(&self) -> Result<Option<Delivery>>;

    /// Mark a delivery as processed so it is not handed out again.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;
}

/// Create an in-process channel holding up to `capacity` unconsumed messages.
pub fn memory_channel(capacity: usize) -> (MemoryPublisher, MemoryConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        MemoryPublisher { tx },
        MemoryConsumer { rx: Mutex::new(rx), next_id: AtomicU64::new(1), acked: AtomicU64::new(0) },
    )
}

/// Sending half of the in-process channel.
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl MemoryPublisher {
    /// Enqueue an arbitrary payload, bypassing serialization.
    pub async fn publish_raw(&self, payload: Vec<u8>) -> Result<()> {
        self.tx.send(payload).await.map_err(|_| Error::Channel("consumer dropped".to_string()))
    }
}

#[async_trait]
impl ResultPublisher for MemoryPublisher {
    async fn publish(&self, result: &CheckResult) -> Result<()> {
        self.publish_raw(result.to_json()?).await
    }
}

/// Receiving half of the in-process channel.
#[derive(Debug)]
pub struct MemoryConsumer {
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    next_id: AtomicU64,
    acked: AtomicU64,
}

impl MemoryConsumer {
    /// Number of deliveries acknowledged so far.
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResultConsumer for MemoryConsumer {
    async fn next_delivery(&self) -> Result<Option<Delivery>> {
        let payload = self.rx.lock().await.recv().await;
        Ok(payload.map(|payload| Delivery {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
            payload,
        }))
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<()> {
        self.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
