//! # Identity & Naming
//!
//! Maps a kubeconfig secret identity to the ArgoCD cluster secret identity.
//! Everything here is pure so the garbage collection path can relocate a
//! target from the source name alone.

use crate::config::ControllerConfig;
use crate::constants::{ARGO_SECRET_NAME_PREFIX, KUBECONFIG_SUFFIX};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a Kubernetes object name (RFC 1123 subdomain)
const MAX_NAME_LEN: usize = 253;

static RFC1123_SUBDOMAIN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").ok()
});

/// Namespaced identity of a generated ArgoCD cluster secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetIdentity {
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Prefix `name` with its namespace when namespaced names are enabled
#[must_use]
pub fn namespaced_name(name: &str, namespace: &str, config: &ControllerConfig) -> String {
    if config.enable_namespaced_names {
        format!("{namespace}-{name}")
    } else {
        name.to_string()
    }
}

/// Cluster name of a kubeconfig secret: its name without `-kubeconfig`,
/// namespaced when enabled
#[must_use]
pub fn derive_cluster_name(
    secret_name: &str,
    namespace: &str,
    config: &ControllerConfig,
) -> String {
    let base = secret_name
        .strip_suffix(KUBECONFIG_SUFFIX)
        .unwrap_or(secret_name);
    namespaced_name(base, namespace, config)
}

/// Identity of the ArgoCD secret generated for a kubeconfig secret
#[must_use]
pub fn derive_target_identity(
    secret_name: &str,
    secret_namespace: &str,
    config: &ControllerConfig,
) -> TargetIdentity {
    TargetIdentity {
        namespace: config.argo_namespace.clone(),
        name: format!(
            "{ARGO_SECRET_NAME_PREFIX}{}",
            derive_cluster_name(secret_name, secret_namespace, config)
        ),
    }
}

/// Validate a Kubernetes object name (RFC 1123 subdomain)
///
/// Format: lowercase alphanumeric, hyphens, dots. Length: 1-253 characters.
/// Cannot start or end with hyphen or dot.
pub fn validate_object_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }

    if name.len() > MAX_NAME_LEN {
        return Err(format!(
            "'{name}' exceeds maximum length of {MAX_NAME_LEN} characters (got {})",
            name.len()
        ));
    }

    let Some(regex) = RFC1123_SUBDOMAIN.as_ref() else {
        return Err("name validation pattern failed to compile".to_string());
    };

    if !regex.is_match(name) {
        return Err(format!(
            "'{name}' must be a valid Kubernetes name (lowercase alphanumeric, hyphens, dots; cannot start/end with hyphen or dot)"
        ));
    }

    Ok(())
}
