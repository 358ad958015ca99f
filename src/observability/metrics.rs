//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `bitwarden_sm_reconciliations_total` - Total number of reconciliations
//! - `bitwarden_sm_reconciliation_errors_total` - Reconciliation errors by kind
//! - `bitwarden_sm_reconciliation_duration_seconds` - Duration of reconciliations
//! - `bitwarden_sm_reconciliations_skipped_total` - Reconciliations that wrote nothing, by reason
//! - `bitwarden_sm_secrets_synced_total` - Keys written to Kubernetes Secrets
//! - `bitwarden_sm_upstream_requests_total` - Bitwarden requests by operation and outcome
//! - `bitwarden_sm_upstream_request_duration_seconds` - Bitwarden request duration by operation

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bitwarden_sm_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bitwarden_sm_reconciliation_errors_total",
            "Total number of reconciliation errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "bitwarden_sm_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static RECONCILIATIONS_SKIPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bitwarden_sm_reconciliations_skipped_total",
            "Reconciliations that wrote nothing, by reason (fresh, no_changes)",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATIONS_SKIPPED_TOTAL metric - this should never happen")
});

static SECRETS_SYNCED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bitwarden_sm_secrets_synced_total",
        "Total number of keys written to Kubernetes Secrets",
    )
    .expect("Failed to create SECRETS_SYNCED_TOTAL metric - this should never happen")
});

static UPSTREAM_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "bitwarden_sm_upstream_requests_total",
            "Total number of Bitwarden requests by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create UPSTREAM_REQUESTS_TOTAL metric - this should never happen")
});

static UPSTREAM_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "bitwarden_sm_upstream_request_duration_seconds",
            "Duration of Bitwarden requests in seconds by operation",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create UPSTREAM_REQUEST_DURATION metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATIONS_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_SYNCED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPSTREAM_REQUEST_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_reconciliations_skipped(reason: &str) {
    RECONCILIATIONS_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_secrets_synced(count: usize) {
    SECRETS_SYNCED_TOTAL.inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn increment_upstream_requests(operation: &str, outcome: &str) {
    UPSTREAM_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn observe_upstream_request_duration(operation: &str, duration: f64) {
    UPSTREAM_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub(crate) fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}
