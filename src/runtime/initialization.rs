//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, SharedControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::KubeStore;
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// How long a failing HTTP server gets to surface its bind error
const SERVER_STARTUP_GRACE: Duration = Duration::from_millis(500);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: SharedControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Install the ring crypto provider for rustls
///
/// Must run before the first TLS connection is made. Fails if another
/// provider was installed first.
pub fn install_crypto_provider() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|installed| {
            anyhow::anyhow!(
                "Failed to install rustls crypto provider, one is already set: {installed:?}"
            )
        })
}

/// Set up the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the level comes from `LOG_LEVEL`, or
/// debug when `debug` is true.
pub fn init_tracing(config: &ControllerConfig, debug: bool) {
    let default_level = if debug {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("capi2argo_controller={default_level},kube=warn").into()
    });

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// Registers metrics, starts the HTTP server and waits for it to bind, then
/// creates the Kubernetes client and the reconciler context.
pub async fn initialize(
    controller_config: SharedControllerConfig,
    metrics_bind_address: String,
) -> Result<InitializationResult> {
    info!("Starting CAPI to ArgoCD controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(?controller_config, "Loaded configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(&metrics_bind_address, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_start(&server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(store, Arc::clone(&controller_config)));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        controller_config,
    })
}

/// Give the HTTP server a moment to bind and fail fast if it cannot
///
/// Readiness is reported separately once the watch loop runs.
async fn wait_for_server_start(server_handle: &tokio::task::JoinHandle<()>) -> Result<()> {
    let start = Instant::now();
    while start.elapsed() < SERVER_STARTUP_GRACE {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
    Ok(())
}
