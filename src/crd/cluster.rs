//! # Cluster API Cluster
//!
//! Minimal binding for `cluster.x-k8s.io/v1beta1` `Cluster`.
//!
//! The controller never writes Clusters and only reads their labels, so the
//! spec carries just enough fields to deserialize real objects. Unknown fields
//! are ignored by serde.

use serde::{Deserialize, Serialize};

/// Cluster API `Cluster` resource
///
/// Owns the `<name>-kubeconfig` secret the controller syncs. Labels on this
/// resource drive the ignore marker and label propagation.
///
/// # Example
///
/// ```yaml
/// apiVersion: cluster.x-k8s.io/v1beta1
/// kind: Cluster
/// metadata:
///   name: workload-1
///   namespace: clusters
///   labels:
///     env: prod
///     take-along-label.capi-to-argocd.env: ""
/// spec:
///   controlPlaneEndpoint:
///     host: 10.0.0.10
///     port: 6443
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Cluster",
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    namespaced,
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Whether reconciliation of the cluster is paused by Cluster API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    /// API server endpoint of the provisioned control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
}

/// Host and port of a control plane endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ApiEndpoint {
    pub host: String,
    pub port: i32,
}
