//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Label keys and suffixes are part of the contract with Cluster API and
//! ArgoCD and must not change between releases. Runtime values are defaults
//! and can be overridden via environment variables (see [`crate::config`]).

/// Suffix Cluster API gives every cluster kubeconfig secret
pub const KUBECONFIG_SUFFIX: &str = "-kubeconfig";

/// Suffix of per-user kubeconfig secrets, which are never synced
pub const USER_KUBECONFIG_SUFFIX: &str = "-user-kubeconfig";

/// Secret type Cluster API uses for its generated secrets
pub const CAPI_SECRET_TYPE: &str = "cluster.x-k8s.io/secret";

/// Generic secret type, accepted only with [`CAPI_CLUSTER_NAME_LABEL`] (Rancher)
pub const OPAQUE_SECRET_TYPE: &str = "Opaque";

/// Label on the kubeconfig secret naming its owning `Cluster`
pub const CAPI_CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Data key holding the encoded kubeconfig
pub const KUBECONFIG_DATA_KEY: &str = "value";

/// Expected kubeconfig `apiVersion`
pub const KUBECONFIG_API_VERSION: &str = "v1";

/// Expected kubeconfig `kind`
pub const KUBECONFIG_KIND: &str = "Config";

/// Ownership label; secrets without it set to `"true"` are never touched
pub const OWNED_LABEL: &str = "capi-to-argocd/owned";

/// ArgoCD discovers cluster secrets through this label
pub const ARGO_SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";

/// Value of [`ARGO_SECRET_TYPE_LABEL`] for cluster secrets
pub const ARGO_SECRET_TYPE_CLUSTER: &str = "cluster";

/// Source linkage: name of the kubeconfig secret an ArgoCD secret came from
pub const SOURCE_SECRET_NAME_LABEL: &str = "capi-to-argocd/cluster-secret-name";

/// Source linkage: namespace of the kubeconfig secret an ArgoCD secret came from
pub const SOURCE_SECRET_NAMESPACE_LABEL: &str = "capi-to-argocd/cluster-namespace";

/// Prefix of `Cluster` labels requesting that another label be copied along
pub const TAKE_ALONG_PREFIX: &str = "take-along-label.capi-to-argocd.";

/// Prefix of the marker labels recording which labels were taken along
pub const TAKEN_FROM_PREFIX: &str = "taken-from-cluster-label.capi-to-argocd.";

/// `Cluster` label that opts the cluster out of syncing
pub const IGNORE_CLUSTER_LABEL: &str = "ignore-cluster.capi-to-argocd";

/// Label prefixes never copied in auto-copy mode (take-along prefix is added separately)
pub const RESERVED_LABEL_PREFIXES: [&str; 4] = [
    "kubernetes.io/",
    "cluster.x-k8s.io/",
    "capi-to-argocd/",
    "argocd.argoproj.io/",
];

/// Prefix of every generated ArgoCD secret name
pub const ARGO_SECRET_NAME_PREFIX: &str = "cluster-";

/// ArgoCD secret data keys
pub const ARGO_DATA_NAME: &str = "name";
pub const ARGO_DATA_SERVER: &str = "server";
pub const ARGO_DATA_CONFIG: &str = "config";

/// Default namespace ArgoCD cluster secrets are written to
pub const DEFAULT_ARGO_NAMESPACE: &str = "argocd";

/// Default interval between level-triggered resyncs (seconds)
pub const DEFAULT_SYNC_DURATION_SECS: u64 = 45;

/// Default HTTP bind address for metrics and health probes
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default Fibonacci backoff floor for retryable failures (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff ceiling for retryable failures (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default maximum number of concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;
