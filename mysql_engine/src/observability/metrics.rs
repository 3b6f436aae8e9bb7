use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct QueryMetrics {
    pub query_count: u64,
    pub total_latency: Duration,
    pub min_latency: Duration,
    pub max_latency: Duration,
}

impl Default for QueryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self {
            query_count: 0,
            total_latency: Duration::ZERO,
            min_latency: Duration::MAX,
            max_latency: Duration::ZERO,
        }
    }

    pub fn record_query(&mut self, latency: Duration) {
        self.query_count += 1;
        self.total_latency += latency;

        if latency < self.min_latency {
            self.min_latency = latency;
        }
        if latency > self.max_latency {
            self.max_latency = latency;
        }
    }

    pub fn average_latency(&self) -> Duration {
        if self.query_count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.query_count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Point-in-time copy of a connection's counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub queries: QueryMetrics,
    pub prepares: u64,
    pub executes: u64,
    pub errors: u64,
}

/// Per-connection counters.
#[derive(Debug, Default)]
pub struct Metrics {
    query_metrics: Mutex<QueryMetrics>,
    prepare_count: AtomicU64,
    execute_count: AtomicU64,
    error_count: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self, latency: Duration) {
        if let Ok(mut metrics) = self.query_metrics.lock() {
            metrics.record_query(latency);
        }
    }

    pub fn record_prepare(&self) {
        self.prepare_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execute(&self) {
        self.execute_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let queries = self
            .query_metrics
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default();
        MetricsSnapshot {
            queries,
            prepares: self.prepare_count.load(Ordering::Relaxed),
            executes: self.execute_count.load(Ordering::Relaxed),
            errors: self.error_count.load(Ordering::Relaxed),
        }
    }
}
