//! Prometheus metrics for the conditional endpoint.
//!
//! Metric names follow `txproxy_txconditional_<metric>` for admission and
//! `txproxy_backend_rpc_client_<metric>` for calls to the backend. Each gateway
//! owns its registry so that independent instances (and tests) never share
//! counters.

use crate::domain::error::{FailureReason, GatewayError};
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Latency buckets for backend calls, in seconds
const BACKEND_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0,
];

/// Conditional endpoint metrics
#[derive(Clone)]
pub struct ConditionalMetrics {
    registry: Registry,
    requests: IntCounter,
    failures: IntCounterVec,
    cost: Histogram,
    backend: BackendMetrics,
}

impl ConditionalMetrics {
    /// Create and register all instruments in a fresh registry.
    pub fn new() -> Result<Self, GatewayError> {
        let registry = Registry::new();

        let requests = IntCounter::new(
            "txproxy_txconditional_requests",
            "Number of eth_sendRawTransactionConditional requests",
        )?;

        let failures = IntCounterVec::new(
            Opts::new(
                "txproxy_txconditional_failures",
                "Number of rejected eth_sendRawTransactionConditional requests",
            ),
            &["reason"],
        )?;

        // Costs range from 0 to the protocol maximum of 1000
        let cost = Histogram::with_opts(
            HistogramOpts::new(
                "txproxy_txconditional_cost",
                "Cost of accepted transaction conditionals",
            )
            .buckets(exponential_buckets(1.0, 2.0, 11)?),
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(cost.clone()))?;

        // Pre-create every label so dashboards see zeroes instead of gaps
        for reason in FailureReason::ALL {
            failures.with_label_values(&[reason.as_label()]);
        }

        let backend = BackendMetrics::register(&registry)?;

        Ok(Self {
            registry,
            requests,
            failures,
            cost,
            backend,
        })
    }

    /// Instruments for calls to the backend
    pub fn backend(&self) -> &BackendMetrics {
        &self.backend
    }

    /// Record a request at pipeline entry
    pub fn record_request(&self) {
        self.requests.inc();
    }

    /// Record a rejection
    pub fn record_failure(&self, reason: FailureReason) {
        self.failures.with_label_values(&[reason.as_label()]).inc();
    }

    /// Record the cost of an accepted conditional
    pub fn observe_cost(&self, cost: u64) {
        self.cost.observe(cost as f64);
    }

    pub fn requests(&self) -> u64 {
        self.requests.get()
    }

    pub fn failures(&self, reason: FailureReason) -> u64 {
        self.failures.with_label_values(&[reason.as_label()]).get()
    }

    /// Total failures across all reasons
    pub fn total_failures(&self) -> u64 {
        FailureReason::ALL.iter().map(|r| self.failures(*r)).sum()
    }

    /// Number of observed costs
    pub fn cost_count(&self) -> u64 {
        self.cost.get_sample_count()
    }

    /// Sum of observed costs
    pub fn cost_sum(&self) -> f64 {
        self.cost.get_sample_sum()
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, GatewayError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

/// RPC client metrics for the backend connection, labelled by method.
#[derive(Clone)]
pub struct BackendMetrics {
    requests: IntCounterVec,
    responses: IntCounterVec,
    duration: HistogramVec,
}

impl BackendMetrics {
    fn register(registry: &Registry) -> Result<Self, GatewayError> {
        let requests = IntCounterVec::new(
            Opts::new(
                "txproxy_backend_rpc_client_requests_total",
                "Total RPC requests initiated to the backend",
            ),
            &["method"],
        )?;

        let responses = IntCounterVec::new(
            Opts::new(
                "txproxy_backend_rpc_client_responses_total",
                "Total RPC responses received from the backend",
            ),
            &["method", "error"],
        )?;

        let duration = HistogramVec::new(
            HistogramOpts::new(
                "txproxy_backend_rpc_client_request_duration_seconds",
                "Duration of backend RPC requests",
            )
            .buckets(BACKEND_DURATION_BUCKETS.to_vec()),
            &["method"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(responses.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            requests,
            responses,
            duration,
        })
    }

    /// Record a call about to be sent
    pub fn record_request(&self, method: &str) {
        self.requests.with_label_values(&[method]).inc();
    }

    /// Record a finished call. `error` is `none` on success.
    pub fn record_response(&self, method: &str, error: &str, elapsed: Duration) {
        self.responses.with_label_values(&[method, error]).inc();
        self.duration
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn requests(&self, method: &str) -> u64 {
        self.requests.with_label_values(&[method]).get()
    }

    pub fn responses(&self, method: &str, error: &str) -> u64 {
        self.responses.with_label_values(&[method, error]).get()
    }

    /// Number of timed calls for `method`
    pub fn duration_count(&self, method: &str) -> u64 {
        self.duration.with_label_values(&[method]).get_sample_count()
    }
}

impl std::fmt::Debug for BackendMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendMetrics").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ConditionalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalMetrics")
            .field("requests", &self.requests())
            .field("failures", &self.total_failures())
            .field("cost_count", &self.cost_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_start_at_zero() {
        let metrics = ConditionalMetrics::new().unwrap();
        assert_eq!(metrics.requests(), 0);
        assert_eq!(metrics.total_failures(), 0);
        assert_eq!(metrics.cost_count(), 0);
    }

    #[test]
    fn test_failures_partitioned_by_reason() {
        let metrics = ConditionalMetrics::new().unwrap();
        metrics.record_failure(FailureReason::RateLimited);
        metrics.record_failure(FailureReason::RateLimited);
        metrics.record_failure(FailureReason::Backend);

        assert_eq!(metrics.failures(FailureReason::RateLimited), 2);
        assert_eq!(metrics.failures(FailureReason::Backend), 1);
        assert_eq!(metrics.failures(FailureReason::Disabled), 0);
        assert_eq!(metrics.total_failures(), 3);
    }

    #[test]
    fn test_cost_observations() {
        let metrics = ConditionalMetrics::new().unwrap();
        metrics.observe_cost(10);
        metrics.observe_cost(5);
        assert_eq!(metrics.cost_count(), 2);
        assert_eq!(metrics.cost_sum(), 15.0);
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = ConditionalMetrics::new().unwrap();
        let b = ConditionalMetrics::new().unwrap();
        a.record_request();
        assert_eq!(a.requests(), 1);
        assert_eq!(b.requests(), 0);
    }

    #[test]
    fn test_encode_text_format() {
        let metrics = ConditionalMetrics::new().unwrap();
        metrics.record_request();
        metrics.record_failure(FailureReason::MissingAuth);

        let text = metrics.encode().unwrap();
        assert!(text.contains("txproxy_txconditional_requests 1"));
        assert!(text.contains("txproxy_txconditional_failures{reason=\"missing_auth\"} 1"));
        assert!(text.contains("txproxy_txconditional_failures{reason=\"backend\"} 0"));
        assert!(text.contains("txproxy_txconditional_cost_count 0"));
    }

    #[test]
    fn test_backend_calls_recorded_by_method() {
        let metrics = ConditionalMetrics::new().unwrap();
        let backend = metrics.backend();
        backend.record_request("eth_sendRawTransactionConditional");
        backend.record_response(
            "eth_sendRawTransactionConditional",
            "-32003",
            Duration::from_millis(20),
        );

        assert_eq!(backend.requests("eth_sendRawTransactionConditional"), 1);
        assert_eq!(backend.responses("eth_sendRawTransactionConditional", "-32003"), 1);
        assert_eq!(backend.responses("eth_sendRawTransactionConditional", "none"), 0);
        assert_eq!(backend.duration_count("eth_sendRawTransactionConditional"), 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains(
            "txproxy_backend_rpc_client_requests_total{method=\"eth_sendRawTransactionConditional\"} 1"
        ));
        // Backend calls are not admission requests
        assert!(text.contains("txproxy_txconditional_requests 0"));
    }
}
