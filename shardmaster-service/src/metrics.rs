//! Per-operation call metrics.
//!
//! Grounded on the original Python's `DecoratorUtils.timing_decorator` /
//! `calculate_statistics`, which wrapped every coordinator method to record
//! a call count, total elapsed time, and p99 latency per method name. This
//! is ambient observability (spec.md's Non-goals exclude metrics as an
//! external-facing concern, not the logging/metrics stack itself), so
//! rather than hand-rolling the percentile bookkeeping the Python version
//! did in pure lists, it's expressed with `prometheus::HistogramVec`: count
//! and sum come for free, and p99 is a `histogram_quantile` query over the
//! scraped buckets, which is how every other crate in this workspace that
//! depends on `prometheus` expects metrics to be consumed.

use std::time::Instant;

use prometheus::{HistogramVec, Registry};

pub struct CallMetrics {
    registry: Registry,
    latency: HistogramVec,
}

impl CallMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "shardmaster_call_duration_seconds",
                "Coordinator RPC call latency by operation",
            ),
            &["operation"],
        )
        .expect("static metric descriptor is well-formed");
        registry
            .register(Box::new(latency.clone()))
            .expect("metric registered exactly once");

        Self { registry, latency }
    }

    /// Times `f`, recording its duration under `operation`'s histogram
    /// regardless of whether `f` succeeds.
    pub fn time<T>(&self, operation: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.latency
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for CallMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_records_a_sample_under_the_operation_label() {
        let metrics = CallMetrics::new();
        metrics.time("write_file", || {
            std::thread::sleep(std::time::Duration::from_millis(1));
        });

        let families = metrics.registry().gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "shardmaster_call_duration_seconds")
            .expect("histogram family registered");
        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_histogram().get_sample_count(), 1);
    }
}
