//! # Reconciliation Logic
//!
//! One pass over a `BitwardenSecret`: pull the bundle from Bitwarden and
//! write it into the target Secret, recording the outcome in the resource's
//! status.

use crate::controller::reconciler::fetch::{fetch_secrets, SyncRequest};
use crate::controller::reconciler::mapping::map_secrets;
use crate::controller::reconciler::status::{
    annotate_target, failed_sync_condition, freshness_remaining, set_condition,
    successful_sync_condition,
};
use crate::controller::reconciler::target::{
    label_target, merge_patch, new_target_secret, replace_data,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::reconciler::validation::validate_secret_names;
use crate::crd::{AuthToken, BitwardenSecret, BitwardenSecretStatus};
use crate::observability;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use zeroize::Zeroizing;

/// Main reconciliation function
///
/// `resource` is the controller's cached copy; it is only used to name the
/// object and as a fallback when the fresh read fails. Errors are handled by
/// the error policy, which requeues at the refresh interval.
pub async fn reconcile(
    resource: Arc<BitwardenSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = "BitwardenSecret",
    );

    async move {
        let start = Instant::now();
        observability::increment_reconciliations();

        let result = reconcile_resource(&resource, &ctx, &namespace, &name).await;

        observability::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_resource(
    cached: &BitwardenSecret,
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    let resource = match ctx.cluster.get_bitwarden_secret(namespace, name).await {
        Ok(Some(resource)) => resource,
        Ok(None) => {
            debug!("BitwardenSecret {}/{} no longer exists", namespace, name);
            return Ok(Action::await_change());
        }
        Err(source) => {
            let err = ReconcilerError::LookupFailure {
                kind: "BitwardenSecret",
                key: format!("{namespace}/{name}"),
                source,
            };
            return Err(record_failure(ctx, cached, err).await);
        }
    };

    let refresh_interval = ctx.config.refresh_interval();
    let last_sync = resource
        .status
        .as_ref()
        .and_then(|status| status.last_successful_sync());

    if let Some(remaining) = freshness_remaining(last_sync, refresh_interval, Utc::now()) {
        debug!(
            "Skipping {}/{}: last sync is within the refresh interval ({}s remaining)",
            namespace,
            name,
            remaining.as_secs()
        );
        observability::increment_reconciliations_skipped("fresh");
        return Ok(Action::requeue(remaining));
    }

    match sync_resource(ctx, &resource, namespace, name, last_sync).await {
        Ok(action) => Ok(action),
        Err(err @ ReconcilerError::StatusUpdateFailure(_)) => Err(err),
        Err(err) => Err(record_failure(ctx, &resource, err).await),
    }
}

async fn sync_resource(
    ctx: &Reconciler,
    resource: &BitwardenSecret,
    namespace: &str,
    name: &str,
    last_sync: Option<chrono::DateTime<Utc>>,
) -> Result<Action, ReconcilerError> {
    let spec = &resource.spec;
    let refresh_interval = ctx.config.refresh_interval();

    let access_token = load_access_token(ctx, namespace, &spec.auth_token).await?;

    let state_file = ctx
        .config
        .state_path
        .join(resource.uid().unwrap_or_else(|| format!("{namespace}_{name}")));

    let response = fetch_secrets(
        ctx.client_factory.as_ref(),
        SyncRequest {
            api_url: &ctx.config.api_url,
            identity_url: &ctx.config.identity_url,
            state_file: &state_file,
            organization_id: &spec.organization_id,
            last_synced: last_sync,
        },
        &access_token,
    )
    .await?;

    if !response.has_changes {
        info!(
            "No changes for {}/{}; Secret {} left as is",
            namespace, name, spec.secret_name
        );
        observability::increment_reconciliations_skipped("no_changes");
        return Ok(Action::requeue(refresh_interval));
    }

    if spec.use_secret_names {
        validate_secret_names(&response.secrets)?;
    }

    let target = fetch_or_create_target(ctx, resource, namespace).await?;
    let mut desired = target.clone();

    let values = map_secrets(&response.secrets, spec);
    let key_count = values.len();
    replace_data(&mut desired, values);
    label_target(&mut desired, resource);

    let now = Utc::now();
    if let Err(e) = annotate_target(&mut desired, spec.map.as_deref(), now) {
        warn!(
            "Failed to annotate Secret {}/{}: {}",
            namespace, spec.secret_name, e
        );
    }

    let patch = merge_patch(&target, &desired).map_err(|e| ReconcilerError::PersistFailure {
        name: spec.secret_name.clone(),
        source: kube::Error::SerdeError(e),
    })?;
    ctx.cluster
        .patch_secret(namespace, &spec.secret_name, &patch)
        .await
        .map_err(|source| ReconcilerError::PersistFailure {
            name: spec.secret_name.clone(),
            source,
        })?;

    observability::increment_secrets_synced(key_count);

    let mut status = resource.status.clone().unwrap_or_default();
    set_condition(
        &mut status.conditions,
        successful_sync_condition(namespace, name),
        now,
    );
    status.last_successful_sync_time = Some(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    ctx.cluster
        .patch_bitwarden_secret_status(namespace, name, &status)
        .await
        .map_err(ReconcilerError::StatusUpdateFailure)?;

    info!(
        "Completed sync for {}/{}: {} keys written to Secret {}",
        namespace, name, key_count, spec.secret_name
    );
    Ok(Action::requeue(refresh_interval))
}

/// Read the machine account access token from the referenced Secret
async fn load_access_token(
    ctx: &Reconciler,
    namespace: &str,
    auth_token: &AuthToken,
) -> Result<Zeroizing<String>, ReconcilerError> {
    let secret = ctx
        .cluster
        .get_secret(namespace, &auth_token.secret_name)
        .await
        .map_err(|e| {
            ReconcilerError::MissingAuthToken(format!(
                "failed to read Secret {namespace}/{}: {e}",
                auth_token.secret_name
            ))
        })?
        .ok_or_else(|| {
            ReconcilerError::MissingAuthToken(format!(
                "Secret {namespace}/{} not found",
                auth_token.secret_name
            ))
        })?;

    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&auth_token.secret_key))
        .ok_or_else(|| {
            ReconcilerError::MissingAuthToken(format!(
                "key '{}' not found in Secret {namespace}/{}",
                auth_token.secret_key, auth_token.secret_name
            ))
        })?;

    let token = std::str::from_utf8(&bytes.0).map_err(|e| {
        ReconcilerError::MissingAuthToken(format!(
            "key '{}' in Secret {namespace}/{} is not valid UTF-8: {e}",
            auth_token.secret_key, auth_token.secret_name
        ))
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(ReconcilerError::MissingAuthToken(format!(
            "key '{}' in Secret {namespace}/{} is empty",
            auth_token.secret_key, auth_token.secret_name
        )));
    }

    Ok(Zeroizing::new(token.to_string()))
}

/// Load the target Secret, creating an empty owned one if it does not exist
async fn fetch_or_create_target(
    ctx: &Reconciler,
    resource: &BitwardenSecret,
    namespace: &str,
) -> Result<Secret, ReconcilerError> {
    let secret_name = &resource.spec.secret_name;

    match ctx.cluster.get_secret(namespace, secret_name).await {
        Ok(Some(secret)) => Ok(secret),
        Ok(None) => {
            let secret = new_target_secret(resource)?;
            info!("Creating Secret {}/{}", namespace, secret_name);
            ctx.cluster
                .create_secret(namespace, &secret)
                .await
                .map_err(|source| ReconcilerError::CreationFailure {
                    name: secret_name.clone(),
                    source,
                })
        }
        Err(source) => Err(ReconcilerError::LookupFailure {
            kind: "Secret",
            key: format!("{namespace}/{secret_name}"),
            source,
        }),
    }
}

/// Log `err`, record it as a `FailedSync` condition and hand it back
///
/// If the status write itself fails, that failure replaces `err`.
async fn record_failure(
    ctx: &Reconciler,
    resource: &BitwardenSecret,
    err: ReconcilerError,
) -> ReconcilerError {
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    error!("Reconciliation of {}/{} failed: {}", namespace, name, err);

    // Only conditions are written here: `resource` may be a stale cached copy
    // and its lastSuccessfulSyncTime must never replace a newer one.
    let mut conditions = resource
        .status
        .as_ref()
        .map(|status| status.conditions.clone())
        .unwrap_or_default();
    set_condition(
        &mut conditions,
        failed_sync_condition(err.to_string()),
        Utc::now(),
    );
    let status = BitwardenSecretStatus {
        last_successful_sync_time: None,
        conditions,
    };

    match ctx
        .cluster
        .patch_bitwarden_secret_status(&namespace, &name, &status)
        .await
    {
        Ok(()) => err,
        Err(e) => {
            error!(
                "Failed to record FailedSync on {}/{} (original error: {}): {}",
                namespace, name, err, e
            );
            ReconcilerError::StatusUpdateFailure(e)
        }
    }
}
