//! # Watch Loop
//!
//! Runs the controller: `BitwardenSecret` resources in all namespaces, plus the
//! Secrets they own so that edits to a target Secret re-trigger its owner.

use crate::constants::LABEL_BW_SECRET;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::BitwardenSecret;
use crate::runtime::error_policy::{handle_controller_result, handle_reconciliation_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{info, Instrument};

/// Run the controller until a shutdown signal arrives
///
/// Reconciliations of one object never overlap; different objects reconcile
/// concurrently.
pub async fn run_watch_loop(
    resources: Api<BitwardenSecret>,
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) {
    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "controller.watch",
        operation = "watch_loop"
    );

    info!("Starting controller watch loop...");
    server_state.set_ready(true);

    Controller::new(resources, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default().labels(LABEL_BW_SECRET))
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            handle_controller_result(&result);
            futures::future::ready(())
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
}
