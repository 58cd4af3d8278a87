//! Metrics capability injected into the checker and the alert engine.
//!
//! Components receive an `Arc<dyn MetricsRecorder>` at construction instead of touching
//! process-wide registries. Every hook has an empty default body, so a recorder only
//! implements what it exports.

use std::time::Duration;

use crate::types::CheckResult;

/// Outcome of one alert decision, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Sent,
    Suppressed,
    Skipped,
}

impl AlertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertOutcome::Sent => "sent",
            AlertOutcome::Suppressed => "suppressed",
            AlertOutcome::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for AlertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait MetricsRecorder: Send + Sync {
    /// A probe finished, successfully or not.
    fn check_completed(&self, _result: &CheckResult) {}

    /// A full cycle finished after probing `targets` targets.
    fn cycle_completed(&self, _targets: usize, _elapsed: Duration) {}

    /// The target list could not be fetched, so the cycle was skipped.
    fn target_source_failed(&self) {}

    /// A result could not be handed to the result channel.
    fn publish_failed(&self) {}

    fn alert_decided(&self, _outcome: AlertOutcome) {}

    fn state_store_failed(&self) {}

    fn malformed_message(&self) {}

    fn notify_failed(&self) {}
}

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Counts every hook invocation.
    #[derive(Debug, Default)]
    pub struct RecordingMetrics {
        pub inner: Mutex<Counts>,
    }

    #[derive(Debug, Default, Clone)]
    pub struct Counts {
        pub checks: usize,
        pub failed_checks: usize,
        pub cycles: Vec<usize>,
        pub source_failures: usize,
        pub publish_failures: usize,
        pub sent: usize,
        pub suppressed: usize,
        pub skipped: usize,
        pub store_failures: usize,
        pub malformed: usize,
        pub notify_failures: usize,
    }

    impl RecordingMetrics {
        pub fn snapshot(&self) -> Counts {
            self.inner.lock().unwrap().clone()
        }
    }

    impl MetricsRecorder for RecordingMetrics {
        fn check_completed(&self, result: &CheckResult) {
            let mut c = self.inner.lock().unwrap();
            c.checks += 1;
            if !result.success {
                c.failed_checks += 1;
            }
        }

        fn cycle_completed(&self, targets: usize, _elapsed: Duration) {
            self.inner.lock().unwrap().cycles.push(targets);
        }

        fn target_source_failed(&self) {
            self.inner.lock().unwrap().source_failures += 1;
        }

        fn publish_failed(&self) {
            self.inner.lock().unwrap().publish_failures += 1;
        }

        fn alert_decided(&self, outcome: AlertOutcome) {
            let mut c = self.inner.lock().unwrap();
            match outcome {
                AlertOutcome::Sent => c.sent += 1,
                AlertOutcome::Suppressed => c.suppressed += 1,
                AlertOutcome::Skipped => c.skipped += 1,
            }
        }

        fn state_store_failed(&self) {
            self.inner.lock().unwrap().store_failures += 1;
        }

        fn malformed_message(&self) {
            self.inner.lock().unwrap().malformed += 1;
        }

        fn notify_failed(&self) {
            self.inner.lock().unwrap().notify_failures += 1;
        }
    }
}
