//! # Controller
//!
//! Core controller modules for the CAPI to ArgoCD controller.
//!
//! - `argo`: ArgoCD cluster secret builder
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `kubeconfig`: Cluster API kubeconfig secret parsing
//! - `labels`: `Cluster` label propagation policies
//! - `naming`: ArgoCD secret identity derivation
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `store`: Kubernetes object access behind a trait

pub mod argo;
pub mod backoff;
pub mod kubeconfig;
pub mod labels;
pub mod naming;
pub mod reconciler;
pub mod server;
pub mod store;
