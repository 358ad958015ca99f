//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Defaults here can be overridden through environment variables or CLI flags
//! where noted.

/// Label on the target Secret holding the owning `BitwardenSecret` UID
pub const LABEL_BW_SECRET: &str = "k8s.bitwarden.com/bw-secret";

/// Annotation stamped with the wall-clock time of the last write
pub const ANNOTATION_SYNC_TIME: &str = "k8s.bitwarden.com/sync-time";

/// Annotation documenting the `map` used for the last write
pub const ANNOTATION_CUSTOM_MAP: &str = "k8s.bitwarden.com/custom-map";

/// Condition type recorded after a completed sync
pub const CONDITION_SUCCESSFUL_SYNC: &str = "SuccessfulSync";

/// Condition type recorded after a failed reconciliation
pub const CONDITION_FAILED_SYNC: &str = "FailedSync";

/// Reason attached to `SuccessfulSync`
pub const REASON_RECONCILIATION_COMPLETE: &str = "ReconciliationComplete";

/// Reason attached to `FailedSync`
pub const REASON_RECONCILIATION_FAILED: &str = "ReconciliationFailed";

/// Field manager used for every patch issued by the operator
pub const FIELD_MANAGER: &str = "bitwarden-sm-operator";

/// Default Bitwarden API base URL (`BW_API_URL`)
pub const DEFAULT_API_URL: &str = "https://api.bitwarden.com";

/// Default Bitwarden identity URL (`BW_IDENTITY_API_URL`)
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.bitwarden.com";

/// Default directory for client session state (`BW_SECRETS_MANAGER_STATE_PATH`)
pub const DEFAULT_STATE_PATH: &str = "/var/bitwarden/state";

/// Default seconds between syncs of one resource (`BW_SECRETS_MANAGER_REFRESH_INTERVAL`)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Smallest accepted refresh interval; anything lower falls back to the default
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 180;

/// Default per-request timeout for the secrets-manager client (`BW_HTTP_TIMEOUT_SECS`)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default metrics listener (`--metrics-bind-address`)
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = ":8080";

/// Default health probe listener (`--health-probe-bind-address`)
pub const DEFAULT_HEALTH_PROBE_BIND_ADDRESS: &str = ":8081";

/// Default HTTP server startup timeout (how long to wait for listeners to bind)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Lease used for leader election
pub const LEADER_LEASE_NAME: &str = "sm-operator.k8s.bitwarden.com";

/// Namespace for the leader lease when `POD_NAMESPACE` is unset
pub const DEFAULT_POD_NAMESPACE: &str = "default";

/// Lease validity after each renewal (seconds)
pub const LEASE_DURATION_SECS: u64 = 15;

/// Interval between lease renewals (seconds)
pub const LEASE_RENEW_INTERVAL_SECS: u64 = 5;

/// A leader that has not renewed for this long gives up the lease (seconds)
///
/// Must stay below `LEASE_DURATION_SECS` so a standby cannot take over while
/// this replica still believes it leads.
pub const LEASE_RENEW_DEADLINE_SECS: u64 = 10;

/// Interval between acquisition attempts while standing by, and between
/// renewal retries after a failed renew (seconds)
pub const LEASE_RETRY_INTERVAL_SECS: u64 = 2;

/// A cached session token is reused only with at least this much validity left (seconds)
pub const SESSION_EXPIRY_SKEW_SECS: i64 = 60;

/// `Device-Type` header value identifying an SDK client to Bitwarden
pub const BITWARDEN_DEVICE_TYPE: &str = "21";
