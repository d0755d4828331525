//! CAPI to ArgoCD Controller Library
//!
//! This library provides the core functionality for the CAPI to ArgoCD controller,
//! which turns Cluster API kubeconfig secrets into ArgoCD cluster secrets.
//! Tests are included in the module files (e.g., `controller/labels.rs`).
//!
//! ## Quick Start
//!
//! ```rust
//! use capi2argo_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
