//! Alert decision engine
//!
//! Consumes check results, keeps one up/down record per URL in the state store and
//! decides which results become notifications.
pub mod decision;
pub mod engine;
pub mod message;
pub mod sharded;

pub use decision::{AlertKind, AlertPolicy, DEFAULT_COOLDOWN_MINUTES, Decision, decide};
pub use engine::AlertEngine;
pub use message::format_alert;
pub use sharded::ShardedAlertEngine;
