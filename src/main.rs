//! # CAPI to ArgoCD Controller
//!
//! A Kubernetes controller that registers Cluster API workload clusters with
//! ArgoCD.
//!
//! ## Overview
//!
//! Cluster API writes a `<cluster>-kubeconfig` secret for every cluster it
//! provisions. This controller:
//!
//! 1. **Watches kubeconfig secrets** - across all (or an allow-listed set of) namespaces
//! 2. **Parses the kubeconfig** - server URL, CA and bearer token or client certificate
//! 3. **Writes ArgoCD cluster secrets** - `cluster-<name>` in the ArgoCD namespace
//! 4. **Propagates `Cluster` labels** - take-along requests or automatic copy
//! 5. **Cleans up** - removes ArgoCD secrets whose `Cluster` or kubeconfig is gone
//!
//! ## Usage
//!
//! ```bash
//! ARGOCD_NAMESPACE=argocd ENABLE_GARBAGE_COLLECTION=true capi2argo-controller --sync-duration 60
//! ```

use anyhow::Result;
use capi2argo_controller::config::ControllerConfig;
use capi2argo_controller::constants::DEFAULT_METRICS_BIND_ADDRESS;
use capi2argo_controller::runtime::initialization::{
    init_tracing, initialize, install_crypto_provider,
};
use capi2argo_controller::runtime::watch_loop::run_watch_loop;
use clap::Parser;
use std::sync::Arc;

/// Sync Cluster API kubeconfig secrets into ArgoCD cluster secrets
#[derive(Parser, Debug)]
#[command(name = "capi2argo-controller", version, about, long_about = None)]
struct Cli {
    /// Address the metrics and health probe endpoints bind to
    #[arg(long, default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    metrics_bind_address: String,

    /// Interval between periodic resyncs, in seconds (overrides `SYNC_DURATION_SECS`)
    #[arg(long)]
    sync_duration: Option<u64>,

    /// Log every create, update and delete without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the environment configuration
    fn apply(&self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(secs) = self.sync_duration {
            config.sync_duration_secs = secs;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.debug {
            config.log_level = "DEBUG".to_string();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any TLS connection
    install_crypto_provider()?;

    let cli = Cli::parse();
    let config = cli.apply(ControllerConfig::from_env());
    init_tracing(&config, cli.debug);

    let init = initialize(Arc::new(config), cli.metrics_bind_address).await?;

    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
