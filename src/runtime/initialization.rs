//! # Initialization
//!
//! Operator start-up: rustls, tracing, metrics, HTTP servers and the
//! Kubernetes client.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::reconciler::{KubeCluster, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::BitwardenSecret;
use crate::observability;
use crate::provider::BitwardenClientFactory;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// `BitwardenSecret` resources in all namespaces
    pub resources: Api<BitwardenSecret>,
    /// Secrets in all namespaces (owned targets are filtered by label)
    pub secrets: Api<Secret>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub controller_config: Arc<ControllerConfig>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
///
/// # Errors
/// Fails if configuration is invalid, the HTTP servers cannot start or no
/// Kubernetes client can be built
pub async fn initialize(server_config: ServerConfig) -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitwarden_sm_operator=info".into()),
        )
        .init();

    info!("Starting Bitwarden Secrets Manager operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::register_metrics()?;

    let controller_config =
        Arc::new(ControllerConfig::from_env().context("Invalid operator configuration")?);
    info!(
        "Configuration: api_url={}, identity_url={}, state_path={}, refresh_interval={}s",
        controller_config.api_url,
        controller_config.identity_url,
        controller_config.state_path.display(),
        controller_config.refresh_interval_secs
    );

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = Arc::clone(&server_state);
    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_config, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });
    wait_for_listeners(&server_state, &server_handle, startup_timeout, poll_interval).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let resources: Api<BitwardenSecret> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client.clone());

    check_crd_queryable(&resources).await;

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeCluster::new(client.clone())),
        Arc::new(BitwardenClientFactory::new(controller_config.http_timeout())),
        Arc::clone(&controller_config),
    ));

    info!("Operator initialized");

    Ok(InitializationResult {
        client,
        resources,
        secrets,
        reconciler,
        server_state,
        controller_config,
    })
}

/// Wait for the HTTP listeners to bind
///
/// Readiness is not set here; the watch loop (or a standby waiting for the
/// lease) does that once the operator can actually serve.
async fn wait_for_listeners(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    startup_timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start_time = Instant::now();

    loop {
        if server_state.listening() {
            info!("HTTP server is accepting connections");
            return Ok(());
        }

        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log whether the `BitwardenSecret` CRD is installed
///
/// A missing CRD is not fatal; the watcher keeps retrying until it appears.
async fn check_crd_queryable(resources: &Api<BitwardenSecret>) {
    match resources.list(&ListParams::default()).await {
        Ok(list) => {
            info!(
                "CRD is queryable, found {} existing BitwardenSecret resources",
                list.items.len()
            );
        }
        Err(e) => {
            error!("CRD is not queryable; {}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
