//! # Label Propagation
//!
//! Decides which `Cluster` labels are carried over to the ArgoCD secret.
//!
//! Two mutually exclusive policies:
//! - **take-along** (default): a label `take-along-label.capi-to-argocd.<key>`
//!   on the `Cluster` requests that `<key>` be copied. Each copied label is
//!   paired with a `taken-from-cluster-label.capi-to-argocd.<key>` marker so
//!   it can be pruned once the request goes away.
//! - **auto-copy**: every label except reserved ones is copied.

use crate::config::ControllerConfig;
use crate::constants::{
    IGNORE_CLUSTER_LABEL, RESERVED_LABEL_PREFIXES, TAKEN_FROM_PREFIX, TAKE_ALONG_PREFIX,
};
use crate::crd::Cluster;
use std::collections::{BTreeMap, BTreeSet};

/// Labels to propagate plus warnings for requests that could not be honoured
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPolicyOutput {
    pub labels: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

/// Return the requested label key of a take-along label
///
/// `Ok(None)` when `key` is not a take-along label at all.
///
/// # Errors
///
/// A take-along label with nothing after the prefix.
pub fn extract_take_along_label(key: &str) -> Result<Option<&str>, String> {
    match key.strip_prefix(TAKE_ALONG_PREFIX) {
        None => Ok(None),
        Some("") => Err(format!(
            "invalid take-along label, missing key after '{TAKE_ALONG_PREFIX}': {key}"
        )),
        Some(requested) => Ok(Some(requested)),
    }
}

/// True when the `Cluster` opted out of syncing
#[must_use]
pub fn has_ignore_label(cluster: &Cluster) -> bool {
    cluster
        .metadata
        .labels
        .as_ref()
        .is_some_and(|labels| labels.contains_key(IGNORE_CLUSTER_LABEL))
}

/// Copy all labels except system and controller-internal ones
#[must_use]
pub fn build_auto_label_copy(cluster_labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    cluster_labels
        .iter()
        .filter(|(key, _)| !is_reserved_label(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn is_reserved_label(key: &str) -> bool {
    key == IGNORE_CLUSTER_LABEL
        || key.starts_with(TAKE_ALONG_PREFIX)
        || RESERVED_LABEL_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(prefix))
}

/// Compute the labels a `Cluster` asks to propagate under the configured policy
#[must_use]
pub fn build_cluster_labels(cluster: &Cluster, config: &ControllerConfig) -> LabelPolicyOutput {
    let empty = BTreeMap::new();
    let cluster_labels = cluster.metadata.labels.as_ref().unwrap_or(&empty);

    if config.enable_auto_label_copy {
        return LabelPolicyOutput {
            labels: build_auto_label_copy(cluster_labels),
            warnings: Vec::new(),
        };
    }

    build_take_along_labels(
        cluster_labels,
        cluster.metadata.name.as_deref().unwrap_or_default(),
        cluster.metadata.namespace.as_deref().unwrap_or_default(),
    )
}

/// Resolve take-along requests against the `Cluster` labels
///
/// Missing labels produce a warning and are skipped. A malformed request
/// aborts the whole pass with a single warning and no labels.
#[must_use]
pub fn build_take_along_labels(
    cluster_labels: &BTreeMap<String, String>,
    cluster_name: &str,
    cluster_namespace: &str,
) -> LabelPolicyOutput {
    let mut requested = Vec::new();
    for key in cluster_labels.keys() {
        match extract_take_along_label(key) {
            Ok(Some(label)) => requested.push(label),
            Ok(None) => {}
            Err(e) => {
                return LabelPolicyOutput {
                    labels: BTreeMap::new(),
                    warnings: vec![e],
                }
            }
        }
    }

    let mut output = LabelPolicyOutput::default();
    for label in requested {
        let Some(value) = cluster_labels.get(label) else {
            output.warnings.push(format!(
                "take-along label '{label}' not found on cluster resource: {cluster_name}, namespace: {cluster_namespace}. Ignoring"
            ));
            continue;
        };
        output.labels.insert(label.to_string(), value.clone());
        output
            .labels
            .insert(format!("{TAKEN_FROM_PREFIX}{label}"), String::new());
    }

    output
}

/// Bring `existing` labels in line with `desired` policy labels
///
/// Markers whose take-along request is gone are removed together with the
/// label they point at; then every desired label is added or updated. Labels
/// the policy never produced are left alone. Returns true if anything changed.
pub fn sync_policy_labels(
    existing: &mut BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> bool {
    let mut changed = prune_stale_labels(existing, desired);

    for (key, value) in desired {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    changed
}

/// Remove taken-along labels no longer requested by `desired`
pub fn prune_stale_labels(
    existing: &mut BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> bool {
    let still_taken: BTreeSet<&str> = desired
        .keys()
        .filter_map(|key| key.strip_prefix(TAKEN_FROM_PREFIX))
        .collect();

    let stale: Vec<String> = existing
        .keys()
        .filter_map(|key| key.strip_prefix(TAKEN_FROM_PREFIX))
        .filter(|label| !still_taken.contains(label))
        .map(ToString::to_string)
        .collect();

    for label in &stale {
        existing.remove(&format!("{TAKEN_FROM_PREFIX}{label}"));
        existing.remove(label);
    }

    !stale.is_empty()
}
