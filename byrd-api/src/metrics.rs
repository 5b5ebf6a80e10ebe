//! Prometheus counters for the lifecycle sweeps and the `/metrics` exposition endpoint.

use std::sync::OnceLock;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use byrd_core::SweepJob;
use byrd_offer::SweepReport;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

struct SweepMetrics {
    registry: Registry,
    runs_total: IntCounterVec,
    offers_transitioned_total: IntCounterVec,
    offer_failures_total: IntCounterVec,
}

static SWEEP_METRICS: OnceLock<Option<SweepMetrics>> = OnceLock::new();

fn metrics() -> Option<&'static SweepMetrics> {
    SWEEP_METRICS.get_or_init(build_metrics).as_ref()
}

fn counter(name: &str, help: &str, labels: &[&str], registry: &Registry) -> Option<IntCounterVec> {
    let metric = match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(metric) => metric,
        Err(source) => {
            error!("failed to create {name}: {source}");
            return None;
        }
    };
    if let Err(source) = registry.register(Box::new(metric.clone())) {
        error!("failed to register {name}: {source}");
        return None;
    }
    Some(metric)
}

fn build_metrics() -> Option<SweepMetrics> {
    let registry = Registry::new();

    let runs_total = counter(
        "byrd_sweep_runs_total",
        "Lifecycle sweep runs partitioned by job and outcome.",
        &["job", "outcome"],
        &registry,
    )?;
    let offers_transitioned_total = counter(
        "byrd_offers_transitioned_total",
        "Offers updated by a lifecycle sweep, partitioned by job.",
        &["job"],
        &registry,
    )?;
    let offer_failures_total = counter(
        "byrd_sweep_offer_failures_total",
        "Per-offer failures inside a lifecycle sweep, partitioned by job.",
        &["job"],
        &registry,
    )?;

    Some(SweepMetrics {
        registry,
        runs_total,
        offers_transitioned_total,
        offer_failures_total,
    })
}

pub fn observe_sweep(report: &SweepReport) {
    let Some(metrics) = metrics() else {
        return;
    };
    let job = report.job.as_str();

    metrics.runs_total.with_label_values(&[job, "ok"]).inc();
    metrics
        .offers_transitioned_total
        .with_label_values(&[job])
        .inc_by(report.processed as u64);
    metrics
        .offer_failures_total
        .with_label_values(&[job])
        .inc_by(report.failed as u64);
}

pub fn observe_sweep_error(job: SweepJob) {
    if let Some(metrics) = metrics() {
        metrics.runs_total.with_label_values(&[job.as_str(), "error"]).inc();
    }
}

pub async fn metrics_handler() -> Response {
    let Some(metrics) = metrics() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let encoder = TextEncoder::new();
    let mut encoded = Vec::new();
    if let Err(source) = encoder.encode(&metrics.registry.gather(), &mut encoded) {
        error!("failed to encode metrics response: {source}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(CONTENT_TYPE, encoder.format_type().to_string())],
        String::from_utf8_lossy(&encoded).into_owned(),
    )
        .into_response()
}
