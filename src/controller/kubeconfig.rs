//! # Kubeconfig Secret Parser
//!
//! Validates Cluster API kubeconfig secrets and decodes them into a
//! [`ClusterDescriptor`].
//!
//! Accepted secrets:
//! - type `cluster.x-k8s.io/secret` (standard Cluster API)
//! - type `Opaque` carrying the `cluster.x-k8s.io/cluster-name` label (Rancher)
//!
//! Both must hold the kubeconfig YAML under the `value` data key. Only the
//! first `clusters` and `users` entries are consulted; additional contexts are
//! accepted and ignored.

use crate::constants::{
    CAPI_CLUSTER_NAME_LABEL, CAPI_SECRET_TYPE, KUBECONFIG_API_VERSION, KUBECONFIG_DATA_KEY,
    KUBECONFIG_KIND, KUBECONFIG_SUFFIX, OPAQUE_SECRET_TYPE, USER_KUBECONFIG_SUFFIX,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Validation failures for a kubeconfig secret
///
/// Each variant is a distinct, non-retryable outcome: the secret only becomes
/// valid when it changes, which re-triggers reconciliation anyway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("wrong secret type '{secret_type}'")]
    WrongSecretType { secret_type: String },
    #[error("wrong secret key, 'value' not present")]
    WrongSecretKey,
    #[error("invalid KubeConfig: failed to parse kubeconfig for {namespace}/{name}: {reason}")]
    InvalidKubeConfig {
        namespace: String,
        name: String,
        reason: String,
    },
}

/// Credential used to authenticate against the workload cluster
///
/// Exactly one kind is present. Material is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum Principal {
    /// Static bearer token
    BearerToken(String),
    /// Client certificate and private key (decoded PEM bytes)
    ClientCertificate { cert_data: Vec<u8>, key_data: Vec<u8> },
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::BearerToken(_) => f.write_str("BearerToken(***)"),
            Principal::ClientCertificate { .. } => f.write_str("ClientCertificate(***)"),
        }
    }
}

/// Workload cluster description decoded from a kubeconfig secret
///
/// Rebuilt on every reconciliation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    /// Secret name without the `-kubeconfig` suffix
    pub name: String,
    /// Namespace of the kubeconfig secret
    pub namespace: String,
    /// Name of the first kubeconfig `clusters` entry
    pub context_cluster_name: String,
    /// API server URL of the first kubeconfig `clusters` entry
    pub api_server_url: String,
    /// Decoded certificate authority bundle, if present
    pub ca_data: Option<Vec<u8>>,
    pub principal: Principal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubeConfig {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Default, Deserialize)]
struct NamedCluster {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cluster: ClusterInfo,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterInfo {
    #[serde(default, rename = "certificate-authority-data")]
    certificate_authority_data: Option<String>,
    #[serde(default)]
    server: String,
}

#[derive(Debug, Default, Deserialize)]
struct NamedUser {
    #[serde(default, rename = "name")]
    _name: String,
    #[serde(default)]
    user: UserInfo,
}

#[derive(Default, Deserialize)]
struct UserInfo {
    #[serde(default, rename = "client-certificate-data")]
    client_certificate_data: Option<String>,
    #[serde(default, rename = "client-key-data")]
    client_key_data: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl std::fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInfo").finish_non_exhaustive()
    }
}

/// Returns true for `<cluster>-kubeconfig` secret names, excluding the
/// per-user `<cluster>-user-kubeconfig` secrets.
#[must_use]
pub fn is_cluster_kubeconfig_name(name: &str) -> bool {
    name.ends_with(KUBECONFIG_SUFFIX) && !name.ends_with(USER_KUBECONFIG_SUFFIX)
}

/// Validate secret type and data key
///
/// # Errors
///
/// `WrongSecretType` for any type other than the Cluster API type or a
/// labelled `Opaque` secret; `WrongSecretKey` when the `value` key is missing.
pub fn validate_credential_secret(secret: &Secret) -> Result<(), CredentialError> {
    let secret_type = secret.type_.as_deref().unwrap_or_default();
    match secret_type {
        CAPI_SECRET_TYPE => {}
        OPAQUE_SECRET_TYPE => {
            let labelled = secret
                .metadata
                .labels
                .as_ref()
                .is_some_and(|labels| labels.contains_key(CAPI_CLUSTER_NAME_LABEL));
            if !labelled {
                return Err(CredentialError::WrongSecretType {
                    secret_type: secret_type.to_string(),
                });
            }
        }
        other => {
            return Err(CredentialError::WrongSecretType {
                secret_type: other.to_string(),
            })
        }
    }

    let has_key = secret
        .data
        .as_ref()
        .is_some_and(|data| data.contains_key(KUBECONFIG_DATA_KEY));
    if !has_key {
        return Err(CredentialError::WrongSecretKey);
    }

    Ok(())
}

/// Parse a kubeconfig secret into a [`ClusterDescriptor`]
///
/// Type and key are validated again here so callers can use this function on
/// its own.
///
/// # Errors
///
/// Any [`CredentialError`]; decoding problems are reported as
/// `InvalidKubeConfig`.
pub fn parse_credential_secret(secret: &Secret) -> Result<ClusterDescriptor, CredentialError> {
    validate_credential_secret(secret)?;

    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let namespace = secret.metadata.namespace.clone().unwrap_or_default();
    let name = secret_name
        .strip_suffix(KUBECONFIG_SUFFIX)
        .unwrap_or(&secret_name)
        .to_string();

    let invalid = |reason: &str| CredentialError::InvalidKubeConfig {
        namespace: namespace.clone(),
        name: name.clone(),
        reason: reason.to_string(),
    };

    if name.is_empty() || namespace.is_empty() {
        return Err(invalid("secret name and namespace are required"));
    }

    let raw = secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_DATA_KEY))
        .ok_or(CredentialError::WrongSecretKey)?;

    let kubeconfig: KubeConfig = serde_yaml::from_slice(&raw.0)
        .map_err(|e| invalid(&format!("malformed YAML: {e}")))?;

    if kubeconfig.api_version != KUBECONFIG_API_VERSION || kubeconfig.kind != KUBECONFIG_KIND {
        return Err(invalid(&format!(
            "expected {KUBECONFIG_API_VERSION}/{KUBECONFIG_KIND}, got '{}/{}'",
            kubeconfig.api_version, kubeconfig.kind
        )));
    }

    let (Some(cluster), Some(user)) = (kubeconfig.clusters.first(), kubeconfig.users.first())
    else {
        return Err(invalid("clusters and users must not be empty"));
    };

    let server = cluster.cluster.server.trim();
    let url = reqwest::Url::parse(server)
        .map_err(|e| invalid(&format!("invalid server URL '{server}': {e}")))?;
    if url.host_str().is_none() {
        return Err(invalid(&format!("server URL '{server}' has no host")));
    }

    let ca_data = non_empty(cluster.cluster.certificate_authority_data.as_deref())
        .map(|ca| decode_field(ca, "certificate-authority-data"))
        .transpose()
        .map_err(|reason| invalid(&reason))?;

    let principal = principal_from(&user.user).map_err(|reason| invalid(&reason))?;

    Ok(ClusterDescriptor {
        name,
        namespace,
        context_cluster_name: cluster.name.clone(),
        api_server_url: server.to_string(),
        ca_data,
        principal,
    })
}

/// Client certificates win over tokens when a user carries both
fn principal_from(user: &UserInfo) -> Result<Principal, String> {
    let cert = non_empty(user.client_certificate_data.as_deref());
    let key = non_empty(user.client_key_data.as_deref());
    let token = non_empty(user.token.as_deref());

    match (cert, key, token) {
        (Some(cert), Some(key), _) => Ok(Principal::ClientCertificate {
            cert_data: decode_field(cert, "client-certificate-data")?,
            key_data: decode_field(key, "client-key-data")?,
        }),
        (_, _, Some(token)) => Ok(Principal::BearerToken(token.to_string())),
        (Some(_), None, None) | (None, Some(_), None) => {
            Err("client certificate and key must be provided together".to_string())
        }
        (None, None, None) => Err("user has neither a token nor a client certificate".to_string()),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decode base64 kubeconfig data, ignoring line breaks and other ASCII whitespace
fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, String> {
    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| format!("{field} is not valid base64: {e}"))
}
