//! Prometheus metrics registry for the fleet telemetry service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the scheduler, the handlers and [`track_http_metrics`].
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry,
};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Total number of provider polling attempts (success + failure).
    pub polls_total: Counter,
    /// Total number of failed provider polling attempts.
    pub poll_errors_total: Counter,
    /// Vehicles in the latest fleet snapshot.
    pub vehicles_tracked: Gauge,
    /// GPS pushes accepted by the ingest endpoint.
    pub pushes_received_total: Counter,
    /// Pushes deleted by retention pruning.
    pub pushes_pruned_total: Counter,
    /// Mileage reports computed, labelled by data source.
    pub reports_generated_total: CounterVec,
    /// Mileage reports served from cache.
    pub report_cache_hits_total: Counter,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let polls_total = Counter::with_opts(Opts::new(
            "fleet_telemetry_polls_total",
            "Total GPS provider polling attempts",
        ))?;

        let poll_errors_total = Counter::with_opts(Opts::new(
            "fleet_telemetry_poll_errors_total",
            "Failed GPS provider polling attempts",
        ))?;

        let vehicles_tracked = Gauge::with_opts(Opts::new(
            "fleet_telemetry_vehicles_tracked",
            "Vehicles in the latest fleet snapshot",
        ))?;

        let pushes_received_total = Counter::with_opts(Opts::new(
            "fleet_telemetry_pushes_received_total",
            "GPS pushes stored by the ingest endpoint",
        ))?;

        let pushes_pruned_total = Counter::with_opts(Opts::new(
            "fleet_telemetry_pushes_pruned_total",
            "GPS pushes deleted by retention pruning",
        ))?;

        let reports_generated_total = CounterVec::new(
            Opts::new(
                "fleet_telemetry_reports_generated_total",
                "Mileage reports computed, by data source",
            ),
            &["source"],
        )?;

        let report_cache_hits_total = Counter::with_opts(Opts::new(
            "fleet_telemetry_report_cache_hits_total",
            "Mileage reports served from cache",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "fleet_telemetry_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "fleet_telemetry_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(poll_errors_total.clone()))?;
        registry.register(Box::new(vehicles_tracked.clone()))?;
        registry.register(Box::new(pushes_received_total.clone()))?;
        registry.register(Box::new(pushes_pruned_total.clone()))?;
        registry.register(Box::new(reports_generated_total.clone()))?;
        registry.register(Box::new(report_cache_hits_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            polls_total,
            poll_errors_total,
            vehicles_tracked,
            pushes_received_total,
            pushes_pruned_total,
            reports_generated_total,
            report_cache_hits_total,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}

/// `GET /metrics`
pub async fn metrics_handler(State(metrics): State<Arc<AppMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            Body::from(body),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics error").into_response()
        }
    }
}

/// Middleware recording request count and latency. Paths are labelled by
/// their route template so `/vehicles/profiles/B1` and `/B2` share a series.
pub async fn track_http_metrics(
    State(metrics): State<Arc<AppMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();
    metrics
        .http_request_duration
        .observe(started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_register_without_error() {
        let metrics = AppMetrics::new();
        assert!(metrics.is_ok(), "AppMetrics::new() failed: {:?}", metrics.err());
    }

    #[test]
    fn render_contains_incremented_counter() {
        let metrics = AppMetrics::new().unwrap();
        metrics.pushes_received_total.inc();
        let output = metrics.render().unwrap();
        assert!(output.contains("fleet_telemetry_pushes_received_total 1"));
    }

    #[test]
    fn counters_and_gauges_track_values() {
        let metrics = AppMetrics::new().unwrap();
        metrics.polls_total.inc_by(3.0);
        metrics.poll_errors_total.inc();
        metrics.vehicles_tracked.set(12.0);
        assert!((metrics.polls_total.get() - 3.0).abs() < f64::EPSILON);
        assert!((metrics.poll_errors_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.vehicles_tracked.get() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_counter_is_labelled_by_source() {
        let metrics = AppMetrics::new().unwrap();
        metrics.reports_generated_total.with_label_values(&["local"]).inc();
        metrics.reports_generated_total.with_label_values(&["provider"]).inc_by(2.0);
        let provider = metrics
            .reports_generated_total
            .with_label_values(&["provider"])
            .get();
        assert!((provider - 2.0).abs() < f64::EPSILON);
    }
}
