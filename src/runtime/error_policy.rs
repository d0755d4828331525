//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.

use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::{self, Action};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Fallback delay when the backoff table is unavailable
const DEFAULT_RETRY_SECS: u64 = 60;

/// Handle reconciliation errors
///
/// Validation errors wait for the secret to change. API errors are retried
/// with Fibonacci backoff tracked per secret.
pub fn handle_reconciliation_error(
    obj: Arc<Secret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");
    handle_error_for(namespace, name, error, &ctx)
}

/// Error policy keyed by namespace and name, shared with the deletion watcher
pub fn handle_error_for(
    namespace: &str,
    name: &str,
    error: &ReconcilerError,
    ctx: &Reconciler,
) -> Action {
    match retry_delay_for(namespace, name, error, ctx) {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}

/// Count the failure and return how long to wait before retrying
///
/// `None` for errors that only a change to the secret can fix.
pub fn retry_delay_for(
    namespace: &str,
    name: &str,
    error: &ReconcilerError,
    ctx: &Reconciler,
) -> Option<Duration> {
    observability::metrics::increment_reconciliation_errors();

    if !error.is_retryable() {
        warn!(
            secret.name = name,
            secret.namespace = namespace,
            "Reconciliation failed, waiting for the secret to change: {error}"
        );
        return None;
    }

    error!(
        secret.name = name,
        secret.namespace = namespace,
        "Reconciliation error: {error}"
    );

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (DEFAULT_RETRY_SECS, 0)
        }
    };

    let next_retry = i64::try_from(backoff_seconds)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|delay| chrono::Utc::now().checked_add_signed(delay));
    info!(
        secret.name = name,
        secret.namespace = namespace,
        "Retrying in {}s (error count: {}, next retry: {})",
        backoff_seconds,
        error_count,
        next_retry.map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339())
    );

    Some(Duration::from_secs(backoff_seconds))
}

/// Log an item of the controller output stream
///
/// Reconciler failures were already handled by the error policy; everything
/// else is a watch or queue problem the controller recovers from by itself.
pub fn log_controller_error<QueueErr: std::error::Error + 'static>(
    error: &controller::Error<ReconcilerError, QueueErr>,
) {
    match error {
        controller::Error::ReconcilerFailed(_, obj) => {
            debug!(object = %obj, "watch.event.reconciliation_failed");
        }
        controller::Error::ObjectNotFound(obj) => {
            debug!(object = %obj, "Object gone before reconciliation, skipping");
        }
        other => {
            warn!("Controller stream error: {other}");
        }
    }
}
