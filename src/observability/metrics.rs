//! Metrics collection and exposition.

use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Suffix of the response-time histogram; used to scope bucket overrides.
const HISTOGRAM_SUFFIX: &str = "_response_time_seconds";

/// Install the Prometheus recorder and return the handle that renders
/// `GET /metrics`.
pub fn install_recorder(config: &MetricsConfig) -> Result<PrometheusHandle, BuildError> {
    let mut builder = PrometheusBuilder::new();
    if !config.buckets.is_empty() {
        builder = builder.set_buckets_for_metric(
            Matcher::Suffix(HISTOGRAM_SUFFIX.to_string()),
            &config.buckets,
        )?;
    }
    builder.install_recorder()
}

/// Recorder for the per-request counter and response-time histogram.
///
/// Label cardinality note: `route` is the full inbound URL including the
/// query string, mirroring the control-plane contract.
#[derive(Debug, Clone)]
pub struct Metrics {
    requests_total: String,
    response_time: String,
}

impl Metrics {
    pub fn new(prefix: &str) -> Self {
        Self {
            requests_total: format!("{prefix}_requests_total"),
            response_time: format!("{prefix}{HISTOGRAM_SUFFIX}"),
        }
    }

    /// Record one terminal response: elapsed seconds into the histogram and
    /// one increment of the transaction counter.
    pub fn collect(&self, status: StatusCode, method: &Method, route: &str, start: Instant) {
        let labels = [
            ("code", status.as_u16().to_string()),
            ("method", method.to_string()),
            ("route", route.to_string()),
        ];

        counter!(self.requests_total.clone(), &labels).increment(1);
        histogram!(self.response_time.clone(), &labels).record(start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_carry_prefix() {
        let metrics = Metrics::new("gateway");
        assert_eq!(metrics.requests_total, "gateway_requests_total");
        assert_eq!(metrics.response_time, "gateway_response_time_seconds");
    }
}
