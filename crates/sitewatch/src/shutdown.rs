//! Process-wide shutdown signal shared by the scheduler and the consumer loop.

use std::sync::Arc;

use tokio::sync::watch;

/// Sending half. Dropping it also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cheap to clone into every long-running task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx, _keepalive: None })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown { rx: self.tx.subscribe(), _keepalive: None }
    }
}

impl Shutdown {
    /// A signal that never fires, for callers that drive shutdown some other way.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { rx, _keepalive: Some(Arc::new(tx)) }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&mut self) {
        // An Err means the trigger was dropped, which is treated as a shutdown request.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
