//! # Error Policy
//!
//! Error handling for the controller watch loop: failed reconciliations and
//! errors surfaced by the controller stream itself.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::BitwardenSecret;
use crate::observability;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Requeue a failed reconciliation at the refresh interval
///
/// The failure has already been recorded on the resource's status by the
/// reconciler; this only logs, counts and schedules the retry.
pub fn handle_reconciliation_error(
    obj: Arc<BitwardenSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error.kind = error.kind(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    observability::increment_reconciliation_errors(error.kind());

    let retry = ctx.config.refresh_interval();
    info!(
        "Retrying {}/{} in {}s",
        namespace,
        name,
        retry.as_secs()
    );
    Action::requeue(retry)
}

/// Log one item of the controller's output stream
///
/// Reconciler failures are reported by [`handle_reconciliation_error`]; here
/// they only get a debug line.
pub fn handle_controller_result(
    result: &Result<
        (ObjectRef<BitwardenSecret>, Action),
        controller::Error<ReconcilerError, watcher::Error>,
    >,
) {
    match result {
        Ok((object, action)) => {
            debug!(resource = %object, action = ?action, "watch.event.reconciled");
        }
        Err(controller::Error::ReconcilerFailed(e, object)) => {
            debug!(resource = %object, error = %e, "watch.event.reconciliation_failed");
        }
        Err(controller::Error::ObjectNotFound(object)) => {
            debug!(resource = %object, "Object deleted before it could be reconciled");
        }
        Err(controller::Error::QueueError(e)) => {
            warn!(error = %e, "Controller watch error; the watcher will retry");
        }
        Err(e) => {
            error!(error = %e, "Controller stream error");
        }
    }
}
