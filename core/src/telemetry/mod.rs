pub mod log;
pub mod metrics;

pub use log::RoundLog;
pub use metrics::{LocatorMetrics, MetricsSnapshot};
