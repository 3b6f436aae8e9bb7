pub mod logging;
pub mod metrics;

pub use logging::StructuredLogger;
pub use metrics::{Metrics, MetricsSnapshot, QueryMetrics};
