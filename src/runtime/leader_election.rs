//! # Leader Election
//!
//! Lease-based leader election over `coordination.k8s.io/v1`, so that only one
//! replica reconciles at a time when `--leader-elect` is set.
//!
//! Writes carry the lease's `resourceVersion`; a concurrent change fails the
//! update with 409 Conflict, which counts as "not leader" and is retried.
//!
//! A leader keeps retrying failed renewals until `LEASE_RENEW_DEADLINE_SECS`
//! have passed since its last successful renew; only then is leadership
//! reported as lost.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::{
    FIELD_MANAGER, LEASE_DURATION_SECS, LEASE_RENEW_DEADLINE_SECS, LEASE_RENEW_INTERVAL_SECS,
    LEASE_RETRY_INTERVAL_SECS,
};

#[derive(Debug, Error)]
pub enum LeaderElectionError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("lease {0} has no resourceVersion")]
    MissingResourceVersion(String),
}

/// What to do with the lease as observed at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    /// No lease exists yet
    Create,
    /// We hold it; bump `renewTime`
    Renew,
    /// Held by someone whose lease has lapsed (or by nobody)
    TakeOver { transitions: i32 },
    /// Held by a live leader
    Wait,
}

/// Decide how to act on `lease` for `identity` at `now`
#[must_use]
pub fn lease_action(lease: Option<&Lease>, identity: &str, now: DateTime<Utc>) -> LeaseAction {
    let Some(lease) = lease else {
        return LeaseAction::Create;
    };
    let spec = lease.spec.as_ref();
    let holder = spec.and_then(|s| s.holder_identity.as_deref());

    if holder == Some(identity) {
        return LeaseAction::Renew;
    }

    let renew_time = spec.and_then(|s| s.renew_time.as_ref());
    let duration_secs = spec.and_then(|s| s.lease_duration_seconds);
    let expired = match (holder, renew_time, duration_secs) {
        (None, _, _) => true,
        (Some(_), Some(renewed), Some(duration)) => {
            now > renewed.0 + chrono::Duration::seconds(i64::from(duration))
        }
        _ => true,
    };

    if expired {
        LeaseAction::TakeOver {
            transitions: spec.and_then(|s| s.lease_transitions).unwrap_or(0),
        }
    } else {
        LeaseAction::Wait
    }
}

/// Leader elector using a Kubernetes Lease
#[derive(Clone)]
pub struct LeaderElector {
    client: Client,
    lease_name: String,
    namespace: String,
    identity: String,
    lease_duration: Duration,
    timing: RenewalTiming,
}

impl std::fmt::Debug for LeaderElector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderElector")
            .field("lease_name", &self.lease_name)
            .field("namespace", &self.namespace)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl LeaderElector {
    /// Create an elector with the default timing (15s lease, 5s renew, 10s renew deadline, 2s retry)
    #[must_use]
    pub fn new(client: Client, lease_name: &str, namespace: &str, identity: &str) -> Self {
        Self {
            client,
            lease_name: lease_name.to_string(),
            namespace: namespace.to_string(),
            identity: identity.to_string(),
            lease_duration: Duration::from_secs(LEASE_DURATION_SECS),
            timing: RenewalTiming::default(),
        }
    }

    /// Block until leadership is acquired, then return a guard that keeps renewing it
    pub async fn acquire(self: Arc<Self>) -> LeaderGuard {
        info!(
            identity = %self.identity,
            lease = %self.lease_name,
            namespace = %self.namespace,
            "Waiting for leadership..."
        );

        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!(identity = %self.identity, "Leadership acquired");
                    return self.create_guard();
                }
                Ok(false) => {
                    debug!(identity = %self.identity, "Lease held by another replica, waiting...");
                }
                Err(e) => {
                    warn!(
                        identity = %self.identity,
                        error = %e,
                        retry_secs = self.timing.retry_interval.as_secs(),
                        "Failed to acquire lease, retrying..."
                    );
                }
            }
            tokio::time::sleep(self.timing.retry_interval).await;
        }
    }

    fn create_guard(self: &Arc<Self>) -> LeaderGuard {
        let (lost_tx, lost_rx) = oneshot::channel();
        let elector = Arc::clone(self);
        let renewal_task = tokio::spawn(async move {
            elector.renewal_loop(lost_tx).await;
        });

        LeaderGuard {
            elector: Arc::clone(self),
            renewal_task,
            lost_rx: Some(lost_rx),
        }
    }

    async fn try_acquire_or_renew(&self) -> Result<bool, LeaderElectionError> {
        let api: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
        let now = Utc::now();

        let existing = api.get_opt(&self.lease_name).await?;

        let (lease, create) = match lease_action(existing.as_ref(), &self.identity, now) {
            LeaseAction::Wait => return Ok(false),
            LeaseAction::Create => (self.desired_lease(None, now, 0), true),
            LeaseAction::Renew => {
                let Some(mut lease) = existing else {
                    return Ok(false);
                };
                if let Some(spec) = lease.spec.as_mut() {
                    spec.renew_time = Some(MicroTime(now));
                }
                (lease, false)
            }
            LeaseAction::TakeOver { transitions } => {
                let resource_version = existing
                    .and_then(|lease| lease.metadata.resource_version)
                    .ok_or_else(|| {
                        LeaderElectionError::MissingResourceVersion(self.lease_name.clone())
                    })?;
                (
                    self.desired_lease(Some(resource_version), now, transitions + 1),
                    false,
                )
            }
        };

        let result = if create {
            api.create(&PostParams::default(), &lease).await
        } else {
            api.replace(&self.lease_name, &PostParams::default(), &lease)
                .await
        };

        match result {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                debug!(identity = %self.identity, "Lease update conflict");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn desired_lease(
        &self,
        resource_version: Option<String>,
        now: DateTime<Utc>,
        transitions: i32,
    ) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(self.lease_name.clone()),
                namespace: Some(self.namespace.clone()),
                resource_version,
                ..ObjectMeta::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: i32::try_from(self.lease_duration.as_secs()).ok(),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                lease_transitions: Some(transitions),
                ..LeaseSpec::default()
            }),
        }
    }

    async fn renewal_loop(&self, lost_tx: oneshot::Sender<()>) {
        renew_until_lost(|| self.try_acquire_or_renew(), self.timing).await;
        warn!(identity = %self.identity, "Leadership lost");
        let _ = lost_tx.send(());
    }

    /// Clear the holder so a standby can take over without waiting for expiry
    async fn release_lease(&self) -> Result<(), LeaderElectionError> {
        let api: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);

        let Some(lease) = api.get_opt(&self.lease_name).await? else {
            debug!(identity = %self.identity, "Lease not found, nothing to release");
            return Ok(());
        };

        let holder = lease.spec.as_ref().and_then(|s| s.holder_identity.as_deref());
        if holder != Some(self.identity.as_str()) {
            debug!(identity = %self.identity, "Not the lease holder, nothing to release");
            return Ok(());
        }

        let patch = json!({
            "spec": {
                "holderIdentity": null,
            }
        });
        api.patch(
            &self.lease_name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        info!(identity = %self.identity, "Lease released");
        Ok(())
    }
}

/// Renewal cadence of a leader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalTiming {
    /// Pause between successful renewals
    pub renew_interval: Duration,
    /// Pause before retrying a failed renewal
    pub retry_interval: Duration,
    /// Time without a successful renewal after which leadership is lost
    pub renew_deadline: Duration,
}

impl Default for RenewalTiming {
    fn default() -> Self {
        Self {
            renew_interval: Duration::from_secs(LEASE_RENEW_INTERVAL_SECS),
            retry_interval: Duration::from_secs(LEASE_RETRY_INTERVAL_SECS),
            renew_deadline: Duration::from_secs(LEASE_RENEW_DEADLINE_SECS),
        }
    }
}

/// Call `renew` on the renewal cadence; return once no renewal has succeeded
/// for `timing.renew_deadline`
///
/// `Ok(false)` (a conflict, or the lease seen under another holder) and
/// errors are both retried until the deadline.
pub async fn renew_until_lost<F, Fut>(mut renew: F, timing: RenewalTiming)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, LeaderElectionError>>,
{
    let mut last_renewed = Instant::now();
    let mut wait = timing.renew_interval;

    loop {
        tokio::time::sleep(wait).await;

        match renew().await {
            Ok(true) => {
                last_renewed = Instant::now();
                wait = timing.renew_interval;
                continue;
            }
            Ok(false) => debug!("Lease renewal not accepted"),
            Err(e) => warn!(error = %e, "Lease renewal failed"),
        }

        let remaining = timing.renew_deadline.saturating_sub(last_renewed.elapsed());
        if remaining.is_zero() {
            return;
        }
        wait = timing.retry_interval.min(remaining);
    }
}

/// Held while this replica is leader
///
/// The renewal task is aborted when the guard is dropped.
#[derive(Debug)]
pub struct LeaderGuard {
    elector: Arc<LeaderElector>,
    renewal_task: JoinHandle<()>,
    lost_rx: Option<oneshot::Receiver<()>>,
}

impl LeaderGuard {
    /// Wait until leadership is lost
    pub async fn lost(&mut self) {
        if let Some(rx) = self.lost_rx.take() {
            let _ = rx.await;
        }
    }

    /// Stop renewing and clear the lease holder
    ///
    /// # Errors
    /// Returns an error if the lease cannot be read or patched
    pub async fn release(self) -> Result<(), LeaderElectionError> {
        self.renewal_task.abort();
        self.elector.release_lease().await
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renewal_task.abort();
    }
}
