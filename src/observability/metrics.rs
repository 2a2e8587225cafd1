use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for dedup decisions and storage round trips.
///
/// Recording goes through the `metrics` facade and is a no-op until a
/// recorder is installed with [`init_metrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Metrics
    }

    pub fn record_check(&self, kind: &'static str, duplicate: bool) {
        counter!("dedup_checks_total", "kind" => kind, "duplicate" => duplicate.to_string()).increment(1);
    }

    pub fn record_store(&self, success: bool) {
        counter!("dedup_stores_total", "success" => success.to_string()).increment(1);
    }

    pub fn record_write_back_failure(&self) {
        counter!("dedup_write_back_failures_total").increment(1);
    }

    pub fn record_storage_operation(&self, operation: &str, duration_ms: f64, success: bool) {
        counter!("dedup_storage_operations_total", "operation" => operation.to_string(), "success" => success.to_string()).increment(1);
        histogram!("dedup_storage_duration_ms", "operation" => operation.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    METRICS.get_or_init(Metrics::new);

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("dedup_checks_total", Unit::Count, "Total duplicate checks by kind and verdict");
    describe_counter!("dedup_stores_total", Unit::Count, "Total dedup records written");
    describe_counter!("dedup_write_back_failures_total", Unit::Count, "Best-effort writes that failed and were swallowed");
    describe_counter!("dedup_storage_operations_total", Unit::Count, "Total storage round trips");
    describe_histogram!("dedup_storage_duration_ms", Unit::Milliseconds, "Storage round trip latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
