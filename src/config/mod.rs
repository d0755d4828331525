//! # Configuration
//!
//! Configuration is loaded once from environment variables and shared as
//! [`SharedControllerConfig`].

mod controller;

pub use controller::{parse_namespace_list, ControllerConfig};

/// Read-only configuration handed to every reconciliation
pub type SharedControllerConfig = std::sync::Arc<ControllerConfig>;
