//! # Reconciler
//!
//! Core reconciliation logic for Cluster API kubeconfig secrets.
//!
//! ## Reconciliation Flow
//!
//! 1. Skip secrets that are not `<cluster>-kubeconfig` or live in a filtered namespace
//! 2. Fetch the kubeconfig secret (gone: garbage collect when enabled)
//! 3. Validate type and data key, then parse the kubeconfig
//! 4. Fetch the owning `Cluster` (gone: delete the ArgoCD secret)
//! 5. Honour the ignore label
//! 6. Build the ArgoCD secret and create it, or converge the existing one
//!
//! ArgoCD secrets without the ownership label are never modified or deleted.

pub mod reconcile;
pub mod types;

pub use reconcile::{
    converge, delete_argo_secret_by_labels, is_owned, reconcile, reconcile_credential,
    reconcile_ref,
};
pub use types::{CredentialRef, ReconcileOutcome, Reconciler, ReconcilerError};
