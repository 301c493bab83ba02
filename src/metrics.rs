//! Prometheus metrics for the bridge.
//!
//! Counters are registered without the `_total` suffix; the text encoder
//! appends it.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Point-in-time copy of the counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples_written: u64,
    pub write_requests: u64,
    pub write_errors: u64,
    pub read_requests: u64,
    pub read_errors: u64,
}

/// Container for all bridge counters.
#[derive(Debug)]
pub struct BridgeMetrics {
    registry: Registry,

    /// Samples persisted by successful writes.
    pub samples_written: Counter,

    /// Remote-write requests received.
    pub write_requests: Counter,

    /// Remote-write requests that failed to decode or persist.
    pub write_errors: Counter,

    /// Remote-read requests received.
    pub read_requests: Counter,

    /// Remote-read requests that failed, excluding client cancellations.
    pub read_errors: Counter,
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let samples_written = Counter::default();
        registry.register(
            "samples_written",
            "Total number of samples written to the database",
            samples_written.clone(),
        );

        let write_requests = Counter::default();
        registry.register(
            "write_requests",
            "Total number of remote-write requests",
            write_requests.clone(),
        );

        let write_errors = Counter::default();
        registry.register(
            "write_errors",
            "Total number of failed remote-write requests",
            write_errors.clone(),
        );

        let read_requests = Counter::default();
        registry.register(
            "read_requests",
            "Total number of remote-read requests",
            read_requests.clone(),
        );

        let read_errors = Counter::default();
        registry.register(
            "read_errors",
            "Total number of failed remote-read requests",
            read_errors.clone(),
        );

        Self {
            registry,
            samples_written,
            write_requests,
            write_errors,
            read_requests,
            read_errors,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_written: self.samples_written.get(),
            write_requests: self.write_requests.get(),
            write_errors: self.write_errors.get(),
            read_requests: self.read_requests.get(),
            read_errors: self.read_errors.get(),
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_lists_all_counters() {
        let metrics = BridgeMetrics::new();
        let encoded = metrics.encode().unwrap();
        for name in [
            "samples_written_total",
            "write_requests_total",
            "write_errors_total",
            "read_requests_total",
            "read_errors_total",
        ] {
            assert!(encoded.contains(&format!("# TYPE {} counter", name.trim_end_matches("_total"))));
            assert!(encoded.contains(&format!("{} 0", name)), "missing {}", name);
        }
    }

    #[test]
    fn test_snapshot_tracks_increments() {
        let metrics = BridgeMetrics::new();
        metrics.write_requests.inc();
        metrics.samples_written.inc_by(42);

        let snap = metrics.snapshot();
        assert_eq!(snap.write_requests, 1);
        assert_eq!(snap.samples_written, 42);
        assert_eq!(snap.read_errors, 0);
    }
}
