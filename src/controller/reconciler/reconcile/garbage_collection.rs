//! Removal of ArgoCD secrets whose kubeconfig secret or `Cluster` is gone.

use super::converge::is_owned;
use crate::controller::argo::linkage_labels;
use crate::controller::reconciler::types::{
    CredentialRef, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::observability;
use tracing::{info, warn};

/// Delete the ArgoCD secret linked to `credential`
///
/// The secret is located purely through the linkage labels. Only the first
/// match is considered and it must be owned by this controller. A secret
/// that vanished between list and delete counts as already removed.
pub async fn delete_argo_secret_by_labels(
    ctx: &Reconciler,
    credential: &CredentialRef,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let argo_namespace = &ctx.config.argo_namespace;
    let selector = linkage_labels(&credential.name, &credential.namespace);

    let matches = ctx.store.list_secrets(argo_namespace, &selector).await?;
    let Some(target) = matches.first() else {
        info!(secret = %credential, "No ArgoCD secret found to delete");
        return Ok(ReconcileOutcome::NothingToDelete);
    };

    let target_name = target.metadata.name.clone().unwrap_or_default();
    if !is_owned(target) {
        warn!(
            secret = %credential,
            argo.name = %target_name,
            "ArgoCD secret is not managed by this controller, leaving it in place"
        );
        return Ok(ReconcileOutcome::NothingToDelete);
    }

    if ctx.config.dry_run {
        info!(
            secret = %credential,
            argo.name = %target_name,
            "Dry run: would delete ArgoCD secret"
        );
        return Ok(ReconcileOutcome::Deleted);
    }

    match ctx.store.delete_secret(argo_namespace, &target_name).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            info!(argo.name = %target_name, "ArgoCD secret already deleted");
            return Ok(ReconcileOutcome::NothingToDelete);
        }
        Err(e) => return Err(e.into()),
    }

    observability::metrics::increment_argocd_secrets_deleted();
    info!(secret = %credential, argo.name = %target_name, "Deleted ArgoCD secret");
    Ok(ReconcileOutcome::Deleted)
}
