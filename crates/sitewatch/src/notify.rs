use async_trait::async_trait;
use tracing::info;

use crate::Result;

/// Outbound sink for alert messages. Failures are reported, never retried by the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Notifier that writes every message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        info!(target: "sitewatch::alert", "{}", message);
        Ok(())
    }
}
