//! Metrics helpers for the Hookline webhook consumer.
//!
//! This module provides centralized metrics initialization, the common metric
//! definitions, and the per-request [`MetricsBatch`] buffer.
//!
//! # Flush barrier
//!
//! Every counter increment produced while processing a request is buffered in
//! a [`MetricsBatch`] and pushed to the recorder exactly once, at the end of
//! request processing. Observability consumers therefore see a complete,
//! ordered batch per request rather than partial state, and tests can assert
//! on the buffered increments before the flush.
//!
//! # Metric Naming Conventions
//!
//! - Suffix: unit or type (e.g., `_total`)
//! - Labels: use sparingly to avoid cardinality explosion

use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics::{describe_counter, Label};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::classify::IdReport;
use crate::event::WebhookPayload;

/// Counter incremented exactly once per processed webhook event.
pub const EVENTS_METRIC: &str = "webhook_events_total";

/// Counter tracking events deleted by the retention trim.
pub const TRIMMED_EVENTS_METRIC: &str = "events_trimmed_total";

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port.
/// This spawns a background task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    Ok(())
}

/// Register descriptions for the metrics emitted by the pipeline.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    describe_counter!(
        EVENTS_METRIC,
        "Webhook events processed, tagged with campaign attributes and identifier formats"
    );
    describe_counter!(
        TRIMMED_EVENTS_METRIC,
        "Events deleted by the retention trim"
    );
}

// =============================================================================
// Per-request batching
// =============================================================================

/// A single buffered counter increment.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterIncrement {
    /// Metric name.
    pub name: &'static str,
    /// Label set, in emission order.
    pub labels: Vec<Label>,
}

/// Buffer of counter increments for one request.
///
/// Increments accumulate in submission order and reach the recorder only
/// when [`MetricsBatch::flush`] runs.
#[derive(Debug, Default)]
pub struct MetricsBatch {
    pending: Vec<CounterIncrement>,
}

impl MetricsBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one increment of the per-event counter, tagged with the
    /// compressed campaign composite and both identifier formats.
    pub fn record_event(&mut self, payload: &WebhookPayload, report: &IdReport) {
        self.pending.push(CounterIncrement {
            name: EVENTS_METRIC,
            labels: vec![
                Label::new("utms", utms_tag(payload)),
                Label::new("user_id_format", report.user_id_format.as_str()),
                Label::new("anonymous_id_format", report.anonymous_id_format.as_str()),
            ],
        });
    }

    /// Buffer an arbitrary labeled increment.
    pub fn record(&mut self, name: &'static str, labels: Vec<Label>) {
        self.pending.push(CounterIncrement { name, labels });
    }

    /// Increments buffered so far, in submission order.
    pub fn pending(&self) -> &[CounterIncrement] {
        &self.pending
    }

    /// Push every buffered increment to the recorder and clear the buffer.
    ///
    /// Emission through the facade cannot fail; when no recorder is
    /// installed the increments are dropped, never the request.
    pub fn flush(&mut self) {
        for inc in self.pending.drain(..) {
            metrics::counter!(inc.name, inc.labels).increment(1);
        }
    }
}

/// Compressed composite campaign tag:
/// `c::<name>/m::<medium>/s::<source>/t::<term>/c::<content>`.
///
/// All five attributes are always present so dashboards can split on the
/// separators; absent attributes appear as empty segments.
pub fn utms_tag(payload: &WebhookPayload) -> String {
    format!(
        "c::{}/m::{}/s::{}/t::{}/c::{}",
        payload.utm_campaign(),
        payload.utm_medium(),
        payload.utm_source(),
        payload.utm_term(),
        payload.utm_content()
    )
}
