//! Prometheus metrics.
//!
//! - HTTP request duration histogram and request counter
//! - authorization decision counter, recorded by `Ability::enforce`
//! - error counter by code, recorded whenever an `AppError` is built
//!
//! The recorder is process-global; [`init_metrics`] installs it once and
//! hands back the handle the `/metrics` route renders from.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for request durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
}

/// Renders the installed recorder; empty when metrics are disabled.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("installed", &self.prometheus.is_some())
            .finish()
    }
}

impl MetricsHandle {
    /// A handle with no recorder behind it.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus.is_some()
    }

    /// All metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

/// Install the Prometheus recorder.
///
/// # Errors
///
/// Fails on invalid buckets or when a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> anyhow::Result<MetricsHandle> {
    if !config.enabled {
        return Ok(MetricsHandle::disabled());
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!("Metrics initialized");

    Ok(MetricsHandle {
        prometheus: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_counter!(
        "saas_authorization_decisions_total",
        "Authorization decisions by action, resource type and outcome"
    );
    describe_counter!("saas_errors_total", "Application errors by code");
}

/// Request duration histogram for HTTP requests.
pub struct RequestDurationHistogram;

impl RequestDurationHistogram {
    pub fn record(method: &str, route: &str, status_code: u16, duration_seconds: f64) {
        let labels = [
            ("method", method.to_string()),
            ("route", route.to_string()),
            ("status", status_code.to_string()),
        ];
        histogram!("http_request_duration_seconds", &labels).record(duration_seconds);
        counter!("http_requests_total", &labels).increment(1);
    }

    /// Start a timer that records on [`RequestTimer::finish`].
    pub fn start(method: &str, route: &str) -> RequestTimer {
        RequestTimer {
            start: Instant::now(),
            method: method.to_string(),
            route: route.to_string(),
        }
    }
}

/// Timer for one in-flight request.
pub struct RequestTimer {
    start: Instant,
    method: String,
    route: String,
}

impl RequestTimer {
    pub fn finish(self, status_code: u16) {
        RequestDurationHistogram::record(
            &self.method,
            &self.route,
            status_code,
            self.start.elapsed().as_secs_f64(),
        );
    }
}
