//! sitewatch - probe-and-notify pipeline for HTTP uptime monitoring
//!
//! The checker side fetches targets, probes them with a bounded worker pool on a fixed
//! interval and publishes every result. The alert side consumes those results and turns
//! up/down changes into deduplicated, rate-limited notifications.
//!
//! Everything outside the pipeline (target registry, transport, state storage,
//! notification sink, metrics) is reached through the traits in [`source`], [`channel`],
//! [`store`], [`notify`] and [`metrics`].

pub mod alert;
pub mod channel;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod monitoring;
pub mod notify;
pub mod shutdown;
pub mod source;
pub mod store;
pub mod types;

pub use alert::{AlertEngine, AlertPolicy, ShardedAlertEngine};
pub use channel::{Delivery, ResultConsumer, ResultPublisher, memory_channel};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use metrics::{AlertOutcome, MetricsRecorder, NoopMetrics};
pub use monitoring::{CheckerScheduler, HttpProber, ProbePool, Prober};
pub use notify::{LogNotifier, Notifier};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use source::{StaticTargetSource, TargetSource};
pub use store::{MemoryStateStore, StateStore};
pub use types::{CheckResult, Target, TargetState};
