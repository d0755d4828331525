//! Drift detection between an existing ArgoCD secret and the desired one.

use crate::constants::{ARGO_DATA_CONFIG, ARGO_DATA_NAME, ARGO_DATA_SERVER, OWNED_LABEL};
use crate::controller::labels::sync_policy_labels;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// True when the secret carries `capi-to-argocd/owned: "true"`
#[must_use]
pub fn is_owned(secret: &Secret) -> bool {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(OWNED_LABEL))
        .is_some_and(|value| value == "true")
}

/// Apply desired data and policy labels to `existing` in place
///
/// Only `name`, `server` and `config` are compared byte for byte; other data
/// keys and labels added by hand are left alone. Returns true if anything
/// changed, in which case the caller issues a single update.
pub fn converge(
    existing: &mut Secret,
    desired_data: &BTreeMap<String, ByteString>,
    policy_labels: &BTreeMap<String, String>,
) -> bool {
    let mut changed = false;

    let data = existing.data.get_or_insert_with(BTreeMap::new);
    for key in [ARGO_DATA_NAME, ARGO_DATA_SERVER, ARGO_DATA_CONFIG] {
        let Some(value) = desired_data.get(key) else {
            continue;
        };
        if data.get(key) != Some(value) {
            data.insert(key.to_string(), value.clone());
            changed = true;
        }
    }

    let labels = existing.metadata.labels.get_or_insert_with(BTreeMap::new);
    if sync_policy_labels(labels, policy_labels) {
        changed = true;
    }

    changed
}
