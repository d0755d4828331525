//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use capi2argo_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::{ApiEndpoint, Cluster, ClusterSpec};

// Store boundary - needed for alternative store implementations
pub use crate::controller::store::{ClusterStore, KubeStore, StoreError};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, reconcile_credential, CredentialRef, ReconcileOutcome, Reconciler,
    ReconcilerError,
};

// Builders and parsers
pub use crate::controller::argo::{ArgoCluster, ArgoConfig, ArgoTlsClientConfig};
pub use crate::controller::kubeconfig::{ClusterDescriptor, CredentialError, Principal};
pub use crate::controller::naming::TargetIdentity;

// Config types
pub use crate::config::{ControllerConfig, SharedControllerConfig};
