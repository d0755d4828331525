//! # ArgoCD Cluster Secret
//!
//! Builds the declarative ArgoCD cluster secret from a parsed kubeconfig.
//!
//! ```yaml
//! apiVersion: v1
//! kind: Secret
//! metadata:
//!   name: cluster-workload-1
//!   namespace: argocd
//!   labels:
//!     capi-to-argocd/owned: "true"
//!     argocd.argoproj.io/secret-type: cluster
//!     capi-to-argocd/cluster-secret-name: workload-1-kubeconfig
//!     capi-to-argocd/cluster-namespace: clusters
//! data:
//!   name: workload-1
//!   server: https://10.0.0.10:6443
//!   config: '{"tlsClientConfig":{"caData":"...","certData":"...","keyData":"..."}}'
//! ```

use crate::config::ControllerConfig;
use crate::constants::{
    ARGO_DATA_CONFIG, ARGO_DATA_NAME, ARGO_DATA_SERVER, ARGO_SECRET_TYPE_CLUSTER,
    ARGO_SECRET_TYPE_LABEL, KUBECONFIG_SUFFIX, OWNED_LABEL, SOURCE_SECRET_NAMESPACE_LABEL,
    SOURCE_SECRET_NAME_LABEL,
};
use crate::controller::kubeconfig::{ClusterDescriptor, Principal};
use crate::controller::labels::LabelPolicyOutput;
use crate::controller::naming::{derive_target_identity, namespaced_name, TargetIdentity};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Labels every managed ArgoCD secret carries
#[must_use]
pub fn common_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (OWNED_LABEL.to_string(), "true".to_string()),
        (
            ARGO_SECRET_TYPE_LABEL.to_string(),
            ARGO_SECRET_TYPE_CLUSTER.to_string(),
        ),
    ])
}

/// Labels linking an ArgoCD secret back to its kubeconfig secret
#[must_use]
pub fn linkage_labels(secret_name: &str, secret_namespace: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SOURCE_SECRET_NAME_LABEL.to_string(), secret_name.to_string()),
        (
            SOURCE_SECRET_NAMESPACE_LABEL.to_string(),
            secret_namespace.to_string(),
        ),
    ])
}

/// ArgoCD `config` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_config: Option<ArgoTlsClientConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

/// `tlsClientConfig` block, each field base64 encoded PEM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoTlsClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<String>,
}

impl ArgoConfig {
    /// Serialize the principal and CA bundle
    ///
    /// Client certificates go into `tlsClientConfig`. Tokens go into
    /// `bearerToken`, with `tlsClientConfig` only carrying the CA if one exists.
    #[must_use]
    pub fn from_descriptor(descriptor: &ClusterDescriptor) -> Self {
        let ca_data = descriptor.ca_data.as_ref().map(|ca| STANDARD.encode(ca));

        match &descriptor.principal {
            Principal::ClientCertificate {
                cert_data,
                key_data,
            } => Self {
                tls_client_config: Some(ArgoTlsClientConfig {
                    ca_data,
                    cert_data: Some(STANDARD.encode(cert_data)),
                    key_data: Some(STANDARD.encode(key_data)),
                }),
                bearer_token: None,
            },
            Principal::BearerToken(token) => Self {
                tls_client_config: ca_data.map(|ca| ArgoTlsClientConfig {
                    ca_data: Some(ca),
                    ..ArgoTlsClientConfig::default()
                }),
                bearer_token: Some(token.clone()),
            },
        }
    }
}

/// Desired state of one ArgoCD cluster secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgoCluster {
    pub identity: TargetIdentity,
    /// Value of the `name` data key
    pub cluster_name: String,
    /// Value of the `server` data key
    pub server: String,
    pub config: ArgoConfig,
    /// Labels linking back to the kubeconfig secret
    pub linkage_labels: BTreeMap<String, String>,
    /// Labels derived from the `Cluster` label policy
    pub policy_labels: BTreeMap<String, String>,
}

impl ArgoCluster {
    /// Build the desired ArgoCD secret for a parsed kubeconfig
    ///
    /// Label policy warnings are logged and never fail the build.
    #[must_use]
    pub fn build(
        descriptor: &ClusterDescriptor,
        policy: &LabelPolicyOutput,
        config: &ControllerConfig,
    ) -> Self {
        for warning in &policy.warnings {
            warn!(
                secret.name = %descriptor.name,
                secret.namespace = %descriptor.namespace,
                "{warning}"
            );
        }

        let secret_name = format!("{}{KUBECONFIG_SUFFIX}", descriptor.name);

        Self {
            identity: derive_target_identity(&secret_name, &descriptor.namespace, config),
            cluster_name: namespaced_name(
                &descriptor.context_cluster_name,
                &descriptor.namespace,
                config,
            ),
            server: descriptor.api_server_url.clone(),
            config: ArgoConfig::from_descriptor(descriptor),
            linkage_labels: linkage_labels(&secret_name, &descriptor.namespace),
            policy_labels: policy.labels.clone(),
        }
    }

    /// All labels in precedence order: common, linkage, then policy
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = common_labels();
        labels.extend(self.linkage_labels.clone());
        labels.extend(self.policy_labels.clone());
        labels
    }

    /// The three data entries of the secret
    ///
    /// # Errors
    ///
    /// Fails if the config payload cannot be serialized.
    pub fn data(&self) -> Result<BTreeMap<String, ByteString>, serde_json::Error> {
        let config = serde_json::to_vec(&self.config)?;
        Ok(BTreeMap::from([
            (
                ARGO_DATA_NAME.to_string(),
                ByteString(self.cluster_name.as_bytes().to_vec()),
            ),
            (
                ARGO_DATA_SERVER.to_string(),
                ByteString(self.server.as_bytes().to_vec()),
            ),
            (ARGO_DATA_CONFIG.to_string(), ByteString(config)),
        ]))
    }

    /// Render as a Kubernetes secret ready to create
    ///
    /// # Errors
    ///
    /// Fails if the config payload cannot be serialized.
    pub fn to_secret(&self) -> Result<Secret, serde_json::Error> {
        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(self.identity.name.clone()),
                namespace: Some(self.identity.namespace.clone()),
                labels: Some(self.labels()),
                ..ObjectMeta::default()
            },
            data: Some(self.data()?),
            ..Secret::default()
        })
    }
}
