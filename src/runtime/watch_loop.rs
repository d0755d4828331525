//! # Watch Loop
//!
//! Controller watch loop that monitors kubeconfig secrets (and their owning
//! `Cluster`s) and triggers reconciliation when changes are detected.

use crate::constants::KUBECONFIG_SUFFIX;
use crate::controller::kubeconfig::is_cluster_kubeconfig_name;
use crate::controller::reconciler::{reconcile, reconcile_ref, CredentialRef, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Cluster;
use crate::runtime::error_policy::{
    handle_reconciliation_error, log_controller_error, retry_delay_for,
};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher::{self, Event};
use kube_runtime::{controller, metadata_watcher, Controller, WatchStreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Map a `Cluster` to the kubeconfig secret Cluster API generates for it
#[must_use]
pub fn kubeconfig_ref_for_cluster(cluster: &Cluster) -> Option<ObjectRef<Secret>> {
    let name = cluster.metadata.name.as_deref()?;
    let namespace = cluster.metadata.namespace.as_deref()?;
    Some(ObjectRef::new(&format!("{name}{KUBECONFIG_SUFFIX}")).within(namespace))
}

/// Resolve on SIGINT or SIGTERM
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => debug!("Received SIGINT"),
                    _ = sigterm.recv() => debug!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler, only SIGINT stops the controller: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Flag shutdown on `server_state` once `signal` resolves
pub fn spawn_shutdown_listener<F>(server_state: Arc<ServerState>, signal: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.request_shutdown();
    })
}

/// Run the controller watch loop
///
/// Restarts the controller when its stream ends until shutdown is requested.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = Arc::clone(&reconciler.config);

    spawn_shutdown_listener(Arc::clone(&server_state), wait_for_shutdown_signal());

    if config.enable_garbage_collection {
        tokio::spawn(run_deletion_watch(
            client.clone(),
            Arc::clone(&reconciler),
            Arc::clone(&server_state),
        ));
    }

    loop {
        if server_state.is_shutting_down() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let secrets: Api<Secret> = Api::all(client.clone());
        let mut controller = Controller::new(secrets, watcher::Config::default().any_semantic())
            .with_config(
                controller::Config::default()
                    .concurrency(config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal();

        if config.enable_cluster_watch {
            let clusters: Api<Cluster> = Api::all(client.clone());
            controller = controller.watches(
                clusters,
                watcher::Config::default().any_semantic(),
                |cluster| kubeconfig_ref_for_cluster(&cluster),
            );
        }

        info!(
            argocd.namespace = %config.argo_namespace,
            cluster_watch = config.enable_cluster_watch,
            garbage_collection = config.enable_garbage_collection,
            dry_run = config.dry_run,
            "Starting controller watch loop..."
        );
        server_state.set_ready(true);

        controller
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .for_each(|result| {
                match result {
                    Ok((obj, action)) => debug!(object = %obj, ?action, "watch.event.reconciled"),
                    Err(e) => log_controller_error(&e),
                }
                futures::future::ready(())
            })
            .await;

        if server_state.is_shutting_down() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        server_state.set_ready(false);
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            config.watch_restart_delay_secs
        );
        // The stream also ends on a signal; the loop head sees the flag after the delay
        tokio::time::sleep(config.watch_restart_delay_duration()).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Watch kubeconfig secret deletions and run garbage collection for them
///
/// The controller only reconciles objects still present in its cache, so
/// deletions are picked up here from a metadata-only watch.
async fn run_deletion_watch(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) {
    let secrets: Api<Secret> = Api::all(client);
    let mut events = metadata_watcher(secrets, watcher::Config::default())
        .default_backoff()
        .boxed();

    info!("Watching kubeconfig secret deletions for garbage collection");

    while let Some(event) = events.next().await {
        if server_state.is_shutting_down() {
            break;
        }

        let deleted = match event {
            Ok(Event::Delete(meta)) => meta,
            Ok(_) => continue,
            Err(e) => {
                warn!("Deletion watch error: {e}");
                continue;
            }
        };

        let name = deleted.metadata.name.unwrap_or_default();
        let namespace = deleted.metadata.namespace.unwrap_or_default();
        if !is_cluster_kubeconfig_name(&name)
            || !reconciler.config.is_namespace_allowed(&namespace)
        {
            continue;
        }

        info!(secret.name = %name, secret.namespace = %namespace, "Kubeconfig secret deleted");
        tokio::spawn(collect_deleted(
            CredentialRef::new(namespace, name),
            Arc::clone(&reconciler),
            Arc::clone(&server_state),
        ));
    }

    debug!("Deletion watch stopped");
}

/// Garbage-collect the ArgoCD secret of a deleted kubeconfig secret
///
/// The controller never requeues a deleted object, so API failures are
/// retried here with the same per-secret backoff. Gives up on errors a retry
/// cannot fix and on shutdown.
pub async fn collect_deleted(
    credential: CredentialRef,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) {
    loop {
        let error = match reconcile_ref(&credential, &reconciler).await {
            Ok(_) => return,
            Err(e) => e,
        };

        let Some(delay) =
            retry_delay_for(&credential.namespace, &credential.name, &error, &reconciler)
        else {
            return;
        };

        if server_state.is_shutting_down() {
            return;
        }
        debug!(
            secret = %credential,
            delay_secs = delay.as_secs(),
            "Retrying garbage collection"
        );
        tokio::time::sleep(delay).await;
        if server_state.is_shutting_down() {
            return;
        }
    }
}
