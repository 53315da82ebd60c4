// src/metrics/mod.rs
// Prometheus metrics (§2 ambient stack), grounded on the teacher's
// `metrics::mod` (an `OnceLock<PrometheusHandle>` installed once at startup,
// plain functions wrapping `counter!`/`gauge!`/`histogram!`).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::info;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    PROMETHEUS_HANDLE.set(handle).expect("metrics already initialized");
    info!("Prometheus metrics initialized");
}

pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized".to_string()),
    }
}

/// Scheduler transitions (§4.E).
pub fn record_generation_started(task_kind: &str) {
    counter!("matchmaker_generations_started_total", "task" => task_kind.to_string()).increment(1);
}

pub fn record_generation_completed(task_kind: &str, cost_usd: f64) {
    counter!("matchmaker_generations_completed_total", "task" => task_kind.to_string()).increment(1);
    counter!("matchmaker_generation_cost_usd_total").increment(cost_usd.max(0.0) as u64);
    histogram!("matchmaker_generation_cost_usd", "task" => task_kind.to_string()).record(cost_usd);
}

pub fn record_generation_failed(task_kind: &str) {
    counter!("matchmaker_generations_failed_total", "task" => task_kind.to_string()).increment(1);
}

/// Budget pacing: the computed delay before the next generation may start.
pub fn record_scheduler_interval(seconds: f64) {
    gauge!("matchmaker_scheduler_interval_seconds").set(seconds);
}

/// Matching Engine (§4.G).
pub fn record_match_created(similarity: f32) {
    counter!("matchmaker_matches_created_total").increment(1);
    histogram!("matchmaker_match_similarity").record(similarity as f64);
}

pub fn record_participation_record() {
    counter!("matchmaker_participation_records_total").increment(1);
}

pub fn record_round_advanced(round: i64) {
    gauge!("matchmaker_matching_round").set(round as f64);
}

/// Consent handshake outcomes (§4.H).
pub fn record_consent_outcome(outcome: &str) {
    counter!("matchmaker_consent_outcomes_total", "outcome" => outcome.to_string()).increment(1);
}

/// Rate-gate waits (§4.B), useful for spotting a saturated send queue.
pub fn record_rate_gate_wait(gate: &str, waited_ms: u64) {
    histogram!("matchmaker_rate_gate_wait_ms", "gate" => gate.to_string()).record(waited_ms as f64);
}
