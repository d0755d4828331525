//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `caco_argocd_secrets_created_total` - ArgoCD cluster secrets created
//! - `caco_argocd_secrets_updated_total` - ArgoCD cluster secrets updated
//! - `caco_argocd_secrets_deleted_total` - ArgoCD cluster secrets deleted
//! - `caco_reconciliations_total` - Total number of reconciliations
//! - `caco_reconciliation_errors_total` - Total number of reconciliation errors
//! - `caco_reconciliation_duration_seconds` - Duration of reconciliations
//! - `caco_reconcile_outcomes_total{outcome}` - Reconciliations by outcome

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static ARGOCD_SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "caco_argocd_secrets_created_total",
        "Total number of ArgoCD cluster secrets created",
    )
    .expect("Failed to create ARGOCD_SECRETS_CREATED_TOTAL metric - this should never happen")
});

static ARGOCD_SECRETS_UPDATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "caco_argocd_secrets_updated_total",
        "Total number of ArgoCD cluster secrets updated",
    )
    .expect("Failed to create ARGOCD_SECRETS_UPDATED_TOTAL metric - this should never happen")
});

static ARGOCD_SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "caco_argocd_secrets_deleted_total",
        "Total number of ArgoCD cluster secrets deleted",
    )
    .expect("Failed to create ARGOCD_SECRETS_DELETED_TOTAL metric - this should never happen")
});

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("caco_reconciliations_total", "Total number of reconciliations")
        .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "caco_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "caco_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static RECONCILE_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "caco_reconcile_outcomes_total",
            "Total number of reconciliations by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create RECONCILE_OUTCOMES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(ARGOCD_SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARGOCD_SECRETS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARGOCD_SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_OUTCOMES_TOTAL.clone()))?;

    Ok(())
}

/// Render every registered metric in the Prometheus text format
#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if the encoder rejects the metric families"
)]
pub fn gather_text() -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_argocd_secrets_created() {
    ARGOCD_SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_argocd_secrets_updated() {
    ARGOCD_SECRETS_UPDATED_TOTAL.inc();
}

pub fn increment_argocd_secrets_deleted() {
    ARGOCD_SECRETS_DELETED_TOTAL.inc();
}

#[must_use]
pub fn argocd_secrets_created() -> u64 {
    ARGOCD_SECRETS_CREATED_TOTAL.get()
}

#[must_use]
pub fn argocd_secrets_updated() -> u64 {
    ARGOCD_SECRETS_UPDATED_TOTAL.get()
}

#[must_use]
pub fn argocd_secrets_deleted() -> u64 {
    ARGOCD_SECRETS_DELETED_TOTAL.get()
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_reconcile_outcome(outcome: &str) {
    RECONCILE_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}
