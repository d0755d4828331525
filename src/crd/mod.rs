//! # Custom Resource Definitions
//!
//! Third-party resource types the controller reads.
//!
//! - `cluster.rs` - Cluster API `Cluster` (owner of kubeconfig secrets)

mod cluster;

pub use cluster::{ApiEndpoint, Cluster, ClusterSpec};
