//! # Bitwarden Secrets Manager Operator
//!
//! A Kubernetes operator that keeps Kubernetes Secrets in sync with secrets
//! stored in Bitwarden Secrets Manager.
//!
//! Each `BitwardenSecret` names a machine account access token (stored in a
//! Secret next to it), an organization and a target Secret. The operator
//! periodically runs a delta sync against Bitwarden and, when anything
//! changed, rewrites the target Secret's data.
//!
//! ## Flags
//!
//! - `--metrics-bind-address` (default `:8080`, `0` disables)
//! - `--health-probe-bind-address` (default `:8081`, `0` disables)
//! - `--leader-elect` (default off)
//!
//! Everything else comes from the environment; see
//! [`bitwarden_sm_operator::config::ControllerConfig`].

use anyhow::Result;
use bitwarden_sm_operator::config::ServerConfig;
use bitwarden_sm_operator::constants::{
    DEFAULT_HEALTH_PROBE_BIND_ADDRESS, DEFAULT_METRICS_BIND_ADDRESS, LEADER_LEASE_NAME,
};
use bitwarden_sm_operator::runtime::initialization::initialize;
use bitwarden_sm_operator::runtime::leader_election::LeaderElector;
use bitwarden_sm_operator::runtime::watch_loop::run_watch_loop;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Bitwarden Secrets Manager operator
#[derive(Parser, Debug)]
#[command(name = "bitwarden-sm-operator", version, about, long_about = None)]
struct Cli {
    /// Address the metrics endpoint binds to (":8080", "127.0.0.1:8080", or "0" to disable)
    #[arg(long, default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    metrics_bind_address: String,

    /// Address the health probe endpoints bind to ("0" to disable)
    #[arg(long, default_value = DEFAULT_HEALTH_PROBE_BIND_ADDRESS)]
    health_probe_bind_address: String,

    /// Acquire the leader lease before reconciling, so only one replica is active
    #[arg(long, default_value_t = false)]
    leader_elect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let server_config = ServerConfig::from_flags(
        &cli.metrics_bind_address,
        &cli.health_probe_bind_address,
        cli.leader_elect,
    )?;
    let leader_elect = server_config.leader_elect;

    let init = initialize(server_config).await?;

    if !leader_elect {
        run_watch_loop(
            init.resources,
            init.secrets,
            init.reconciler,
            init.server_state,
        )
        .await;
        return Ok(());
    }

    let elector = Arc::new(LeaderElector::new(
        init.client.clone(),
        LEADER_LEASE_NAME,
        &init.controller_config.pod_namespace,
        &init.controller_config.pod_name,
    ));

    // Standby replicas are healthy; they only lack the lease
    init.server_state.set_ready(true);

    let mut guard = tokio::select! {
        guard = elector.acquire() => guard,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested while waiting for leadership");
            return Ok(());
        }
    };

    let lost = tokio::select! {
        () = run_watch_loop(
            init.resources,
            init.secrets,
            init.reconciler,
            init.server_state,
        ) => false,
        () = guard.lost() => true,
    };

    if lost {
        error!("Leadership lost, exiting so another replica can take over");
        anyhow::bail!("leader election lost");
    }

    if let Err(e) = guard.release().await {
        warn!("Failed to release leader lease: {}", e);
    }
    Ok(())
}
