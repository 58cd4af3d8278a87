use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::decision::{AlertPolicy, Decision, decide};
use super::message::format_alert;
use crate::channel::{Delivery, ResultConsumer};
use crate::clock::Clock;
use crate::metrics::{AlertOutcome, MetricsRecorder};
use crate::notify::Notifier;
use crate::shutdown::Shutdown;
use crate::store::StateStore;
use crate::types::CheckResult;

/// Pause before reading again after the transport reported an error
pub const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Turns check results into notifications.
///
/// Each result is resolved completely (state read, decision, state write, notification)
/// before the next one is looked at, so two results for the same URL never race.
pub struct AlertEngine {
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn MetricsRecorder>,
    clock: Arc<dyn Clock>,
    policy: AlertPolicy,
}

impl AlertEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<dyn MetricsRecorder>,
        clock: Arc<dyn Clock>,
        policy: AlertPolicy,
    ) -> Self {
        Self { store, notifier, metrics, clock, policy }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Decode a delivery. Malformed payloads are logged, counted and dropped.
    pub fn decode(&self, delivery: &Delivery) -> Option<CheckResult> {
        match CheckResult::from_json(&delivery.payload) {
            Ok(result) => Some(result),
            Err(e) => {
                self.metrics.malformed_message();
                warn!(
                    id = %delivery.id,
                    error = %e,
                    raw = %String::from_utf8_lossy(&delivery.payload),
                    "Failed to parse check result, dropping message"
                );
                None
            }
        }
    }

    /// Decode and process one delivery. Returns `None` for a dropped message.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Option<AlertOutcome> {
        let result = self.decode(delivery)?;
        Some(self.process(&result).await)
    }

    /// Apply one result to the stored state of its URL and notify if warranted.
    ///
    /// The new state is persisted before the notifier runs. If the store cannot be read
    /// or written nothing is sent; if the notifier fails the stored state stands.
    pub async fn process(&self, result: &CheckResult) -> AlertOutcome {
        let url = result.url.as_str();
        let is_up = result.is_up();

        let previous = match self.store.get(url).await {
            Ok(previous) => previous,
            Err(e) => return self.skip(url, "read", &e),
        };

        let decision = decide(previous, is_up, self.clock.now(), &self.policy);

        if let Err(e) = self.store.set(url, decision.next_state()).await {
            return self.skip(url, "write", &e);
        }

        let kind = match decision {
            Decision::Suppress { .. } => {
                debug!(url = %url, status = result.status_code, "No alert sent, status unchanged");
                self.metrics.alert_decided(AlertOutcome::Suppressed);
                return AlertOutcome::Suppressed;
            }
            Decision::Send { kind, .. } => kind,
        };

        let message = format_alert(result, kind);
        match self.notifier.send(&message).await {
            Ok(()) => info!(url = %url, status = result.status_code, %kind, "Alert sent"),
            Err(e) => {
                self.metrics.notify_failed();
                error!(url = %url, %kind, error = %e, "Failed to deliver alert");
            }
        }

        self.metrics.alert_decided(AlertOutcome::Sent);
        AlertOutcome::Sent
    }

    fn skip(&self, url: &str, op: &str, e: &crate::Error) -> AlertOutcome {
        self.metrics.state_store_failed();
        self.metrics.alert_decided(AlertOutcome::Skipped);
        warn!(url = %url, op, error = %e, "State store unavailable, not alerting for this result");
        AlertOutcome::Skipped
    }

    /// Consume results until the channel closes or `shutdown` fires.
    ///
    /// Shutdown interrupts waiting for a message, never the processing of one.
    pub async fn run(&self, consumer: Arc<dyn ResultConsumer>, mut shutdown: Shutdown) {
        info!(
            cooldown_secs = self.policy.cooldown.num_seconds(),
            reminders = self.policy.reminders,
            "Listening for check results"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = consumer.next_delivery() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    self.handle_delivery(&delivery).await;
                    if let Err(e) = consumer.ack(&delivery).await {
                        warn!(id = %delivery.id, error = %e, "Failed to acknowledge message");
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

        info!("Shutting down consumer...");
    }
}
