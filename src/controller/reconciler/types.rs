//! # Types
//!
//! Core types for the reconciler.

use crate::config::SharedControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::kubeconfig::CredentialError;
use crate::controller::store::{ClusterStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to serialize ArgoCD cluster config: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid ArgoCD secret name: {0}")]
    InvalidTargetName(String),
}

impl ReconcilerError {
    /// API failures are retried with backoff; everything else waits for the
    /// kubeconfig secret to change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcilerError::Store(_))
    }
}

/// Namespaced name of a kubeconfig secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialRef {
    pub namespace: String,
    pub name: String,
}

impl CredentialRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// How a single reconciliation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not a cluster kubeconfig secret, or its namespace is filtered out
    Skipped,
    /// `Cluster` carries the ignore label
    Ignored,
    /// ArgoCD secret exists but is not owned by this controller
    Unmanaged,
    Created,
    Updated,
    InSync,
    /// Source or owning `Cluster` gone and the ArgoCD secret was removed
    Deleted,
    /// Source or owning `Cluster` gone with nothing to remove
    NothingToDelete,
}

impl ReconcileOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Skipped => "skipped",
            ReconcileOutcome::Ignored => "ignored",
            ReconcileOutcome::Unmanaged => "unmanaged",
            ReconcileOutcome::Created => "created",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::InSync => "in-sync",
            ReconcileOutcome::Deleted => "deleted",
            ReconcileOutcome::NothingToDelete => "nothing-to-delete",
        }
    }

    /// Whether the next periodic pass should be scheduled
    #[must_use]
    pub fn requeue(&self) -> bool {
        !matches!(self, ReconcileOutcome::Skipped)
    }
}

/// Shared reconciliation context
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ClusterStore>,
    pub config: SharedControllerConfig,
    /// Backoff state per kubeconfig secret (namespace/name), owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn ClusterStore>, config: SharedControllerConfig) -> Self {
        Self {
            store,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the backoff of a secret after a successful pass
    pub fn reset_backoff(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }
}
