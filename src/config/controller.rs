//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.
//!
//! The configuration is resolved once at startup and shared read-only with
//! every reconciliation, so tests can build as many differing configs as they
//! need and run them in parallel.

use std::collections::BTreeSet;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace ArgoCD cluster secrets are written to
    pub argo_namespace: String,
    /// Namespaces whose kubeconfig secrets are synced; empty means all
    pub allowed_namespaces: BTreeSet<String>,
    /// Delete ArgoCD secrets whose kubeconfig secret no longer exists
    pub enable_garbage_collection: bool,
    /// Prefix generated names with the cluster namespace to avoid collisions
    pub enable_namespaced_names: bool,
    /// Copy every non-reserved `Cluster` label instead of using take-along labels
    pub enable_auto_label_copy: bool,
    /// Interval between level-triggered resyncs (seconds)
    pub sync_duration_secs: u64,
    /// Log planned writes without performing them
    pub dry_run: bool,
    /// Watch CAPI `Cluster` resources so label changes re-trigger a sync
    pub enable_cluster_watch: bool,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    /// Fibonacci backoff floor for retryable failures (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for retryable failures (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after the stream ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            argo_namespace: DEFAULT_ARGO_NAMESPACE.to_string(),
            allowed_namespaces: BTreeSet::new(),
            enable_garbage_collection: false,
            enable_namespaced_names: false,
            enable_auto_label_copy: false,
            sync_duration_secs: DEFAULT_SYNC_DURATION_SECS,
            dry_run: false,
            enable_cluster_watch: true,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        let argo_namespace = std::env::var("ARGOCD_NAMESPACE")
            .ok()
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ARGO_NAMESPACE.to_string());

        Self {
            argo_namespace,
            allowed_namespaces: parse_namespace_list(
                &std::env::var("ALLOWED_NAMESPACES").unwrap_or_default(),
            ),
            enable_garbage_collection: env_var_or_default_bool("ENABLE_GARBAGE_COLLECTION", false),
            enable_namespaced_names: env_var_or_default_bool("ENABLE_NAMESPACED_NAMES", false),
            enable_auto_label_copy: env_var_or_default_bool("ENABLE_AUTO_LABEL_COPY", false),
            sync_duration_secs: env_var_or_default(
                "SYNC_DURATION_SECS",
                DEFAULT_SYNC_DURATION_SECS,
            ),
            dry_run: env_var_or_default_bool("DRY_RUN", false),
            enable_cluster_watch: env_var_or_default_bool("ENABLE_CLUSTER_WATCH", true),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Returns true if the namespace is in the allow-list, or if no
    /// namespace filtering is configured.
    #[must_use]
    pub fn is_namespace_allowed(&self, namespace: &str) -> bool {
        self.allowed_namespaces.is_empty() || self.allowed_namespaces.contains(namespace)
    }

    /// Get the resync interval as a duration
    #[must_use]
    pub fn sync_duration(&self) -> Duration {
        Duration::from_secs(self.sync_duration_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Split a comma-separated namespace list into a set.
///
/// Entries are trimmed and empty entries dropped, so `""`, `",,"` and
/// `"  ,  "` all collapse to the empty set (no filtering).
#[must_use]
pub fn parse_namespace_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
