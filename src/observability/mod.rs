pub mod logging;
pub mod metrics;

pub use logging::{abbreviate, display_key, init_logging, LogConfig, LogFormat};
pub use metrics::{get_metrics, init_metrics, LatencyTimer, Metrics, METRICS};
