/// Probe side of the pipeline
///
/// This module is responsible for:
/// - Probing a single URL with a timed HTTP GET
/// - Fanning a target list out to a fixed pool of workers
/// - Scheduling non-overlapping cycles on a fixed interval
pub mod checker;
pub mod pool;
pub mod scheduler;

pub use checker::{HttpProber, Prober};
pub use pool::{DEFAULT_WORKERS, ProbePool};
pub use scheduler::{CheckerScheduler, CycleReport};
