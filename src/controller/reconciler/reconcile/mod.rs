//! # Reconciliation Logic
//!
//! Syncs one kubeconfig secret into its ArgoCD cluster secret.
//!
//! Every pass recomputes the desired state from scratch and requeues after
//! the sync period, so manual edits to the ArgoCD secret are reverted within
//! one period even without a new event.

mod converge;
mod garbage_collection;

pub use converge::{converge, is_owned};
pub use garbage_collection::delete_argo_secret_by_labels;

use crate::constants::CAPI_CLUSTER_NAME_LABEL;
use crate::controller::argo::ArgoCluster;
use crate::controller::kubeconfig::{
    is_cluster_kubeconfig_name, parse_credential_secret, validate_credential_secret,
};
use crate::controller::labels::{build_cluster_labels, has_ignore_label};
use crate::controller::naming::validate_object_name;
use crate::controller::reconciler::types::{
    CredentialRef, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::observability;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};

/// Entry point for the kube-runtime controller
///
/// Errors are handed to the error policy, which decides on backoff.
pub async fn reconcile(
    secret: Arc<Secret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let credential = CredentialRef::new(
        secret.metadata.namespace.clone().unwrap_or_default(),
        secret.metadata.name.clone().unwrap_or_default(),
    );
    reconcile_ref(&credential, &ctx).await
}

/// Reconcile a kubeconfig secret by name and translate the outcome into an [`Action`]
///
/// Shared by the controller and the deletion watcher.
pub async fn reconcile_ref(
    credential: &CredentialRef,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    observability::metrics::increment_reconciliations();

    let span = tracing::info_span!(
        "reconcile",
        secret.name = %credential.name,
        secret.namespace = %credential.namespace,
    );
    let result = reconcile_credential(ctx, credential).instrument(span).await;

    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = result?;
    observability::metrics::increment_reconcile_outcome(outcome.as_str());
    ctx.reset_backoff(&credential.to_string());

    if outcome.requeue() {
        Ok(Action::requeue(ctx.config.sync_duration()))
    } else {
        Ok(Action::await_change())
    }
}

/// Run one pass of the sync state machine for a kubeconfig secret
///
/// # Errors
///
/// Validation failures of the kubeconfig secret and any API error other than
/// not-found on the lookups that tolerate it.
pub async fn reconcile_credential(
    ctx: &Reconciler,
    credential: &CredentialRef,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let config = &ctx.config;

    if !is_cluster_kubeconfig_name(&credential.name)
        || !config.is_namespace_allowed(&credential.namespace)
    {
        debug!(secret = %credential, "Not a watched kubeconfig secret, skipping");
        return Ok(ReconcileOutcome::Skipped);
    }

    let source = match ctx
        .store
        .get_secret(&credential.namespace, &credential.name)
        .await
    {
        Ok(secret) => secret,
        Err(e) if e.is_not_found() => {
            if !config.enable_garbage_collection {
                debug!(secret = %credential, "Kubeconfig secret gone, garbage collection disabled");
                return Ok(ReconcileOutcome::NothingToDelete);
            }
            info!(secret = %credential, "Kubeconfig secret gone, cleaning up ArgoCD secret");
            return delete_argo_secret_by_labels(ctx, credential).await;
        }
        Err(e) => return Err(e.into()),
    };

    debug!(secret = %credential, "Fetched kubeconfig secret");

    if let Err(e) = validate_credential_secret(&source) {
        info!(
            secret = %credential,
            secret_type = source.type_.as_deref().unwrap_or_default(),
            "Ignoring secret: {e}"
        );
        return Err(e.into());
    }

    let descriptor = parse_credential_secret(&source).map_err(|e| {
        error!(secret = %credential, "Failed to parse kubeconfig: {e}");
        e
    })?;

    let cluster_name = owning_cluster_name(&source, &descriptor.name);
    let cluster = match ctx
        .store
        .get_cluster(&credential.namespace, &cluster_name)
        .await
    {
        Ok(cluster) => cluster,
        Err(e) if e.is_not_found() => {
            info!(
                secret = %credential,
                cluster = %cluster_name,
                "CAPI Cluster not found, cleaning up ArgoCD secret if it exists"
            );
            return delete_argo_secret_by_labels(ctx, credential).await;
        }
        Err(e) => {
            error!(secret = %credential, cluster = %cluster_name, "Failed to get CAPI Cluster: {e}");
            return Err(e.into());
        }
    };

    if has_ignore_label(&cluster) {
        info!(secret = %credential, cluster = %cluster_name, "Cluster has ignore label, skipping");
        return Ok(ReconcileOutcome::Ignored);
    }

    let policy = build_cluster_labels(&cluster, config);
    let argo = ArgoCluster::build(&descriptor, &policy, config);
    validate_object_name(&argo.identity.name).map_err(ReconcilerError::InvalidTargetName)?;
    let desired = argo.to_secret()?;

    let identity = &argo.identity;
    let mut existing = match ctx.store.get_secret(&identity.namespace, &identity.name).await {
        Ok(secret) => secret,
        Err(e) if e.is_not_found() => {
            if config.dry_run {
                info!(argo = %identity, "Dry run: would create ArgoCD secret");
                return Ok(ReconcileOutcome::Created);
            }
            ctx.store.create_secret(&identity.namespace, &desired).await?;
            observability::metrics::increment_argocd_secrets_created();
            info!(argo = %identity, "Created ArgoCD secret");
            return Ok(ReconcileOutcome::Created);
        }
        Err(e) => return Err(e.into()),
    };

    if !is_owned(&existing) {
        info!(argo = %identity, "ArgoCD secret not managed by this controller, skipping");
        return Ok(ReconcileOutcome::Unmanaged);
    }

    let desired_data = desired.data.unwrap_or_default();
    if !converge(&mut existing, &desired_data, &argo.policy_labels) {
        debug!(argo = %identity, "ArgoCD secret is in sync");
        return Ok(ReconcileOutcome::InSync);
    }

    if config.dry_run {
        info!(argo = %identity, "Dry run: would update out-of-sync ArgoCD secret");
        return Ok(ReconcileOutcome::Updated);
    }

    ctx.store
        .replace_secret(&identity.namespace, &existing)
        .await?;
    observability::metrics::increment_argocd_secrets_updated();
    info!(argo = %identity, "Updated ArgoCD secret");
    Ok(ReconcileOutcome::Updated)
}

/// Name of the `Cluster` owning a kubeconfig secret
///
/// Falls back to the secret name without `-kubeconfig` when the Cluster API
/// name label is missing.
fn owning_cluster_name(secret: &Secret, fallback: &str) -> String {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(CAPI_CLUSTER_NAME_LABEL))
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}
