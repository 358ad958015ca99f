//! Common test utilities
//!
//! Shared rustls setup plus in-memory stand-ins for the Kubernetes API and
//! Bitwarden, so the reconciler can be driven end to end without a cluster.

#![allow(dead_code)]

use async_trait::async_trait;
use bitwarden_sm_operator::config::ControllerConfig;
use bitwarden_sm_operator::controller::reconciler::{ClusterClient, Reconciler};
use bitwarden_sm_operator::crd::{
    AuthToken, BitwardenSecret, BitwardenSecretSpec, BitwardenSecretStatus, SecretMap,
};
use bitwarden_sm_operator::provider::{
    BitwardenError, ClientFactory, RemoteSecret, SecretsManagerClient, SyncResponse,
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use reqwest::Url;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

pub const NAMESPACE: &str = "default";
pub const AUTH_SECRET_NAME: &str = "bw-auth-token";
pub const AUTH_SECRET_KEY: &str = "token";
pub const ACCESS_TOKEN: &str =
    "0.ec2c1d46-6a4b-4751-a310-af9601317f2d.C2IgxjjLF7qSshsbwe8JGcbM075YXw:X8vbvA0bduihIDe/qrzIQQ==";
pub const ORGANIZATION_ID: &str = "a08a8157-129e-4002-bab4-b118014ca9c7";

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {reason}"),
        reason: reason.to_string(),
        code,
    })
}

/// Apply an RFC 7386 merge patch to `target`
fn apply_merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let serde_json::Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = serde_json::Value::Object(serde_json::Map::new());
    }
    if let serde_json::Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_merge_patch(
                    target.entry(key.clone()).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
    }
}

#[derive(Default)]
struct ClusterState {
    resources: BTreeMap<String, BitwardenSecret>,
    secrets: BTreeMap<String, Secret>,
    secret_writes: usize,
    status_writes: usize,
    fail_resource_get: bool,
    fail_status_update: bool,
    fail_secret_patch: bool,
    fail_secret_create: bool,
}

/// In-memory Kubernetes API for one namespace-agnostic object store
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_resource(&self, resource: BitwardenSecret) {
        let k = key(
            resource.metadata.namespace.as_deref().unwrap_or(NAMESPACE),
            resource.metadata.name.as_deref().unwrap_or_default(),
        );
        self.state.lock().unwrap().resources.insert(k, resource);
    }

    pub fn insert_secret(&self, secret: Secret) {
        let k = key(
            secret.metadata.namespace.as_deref().unwrap_or(NAMESPACE),
            secret.metadata.name.as_deref().unwrap_or_default(),
        );
        self.state.lock().unwrap().secrets.insert(k, secret);
    }

    pub fn insert_auth_token(&self, token: &str) {
        self.insert_secret(opaque_secret(
            AUTH_SECRET_NAME,
            &[(AUTH_SECRET_KEY, token)],
        ));
    }

    pub fn resource(&self, name: &str) -> Option<BitwardenSecret> {
        self.state.lock().unwrap().resources.get(&key(NAMESPACE, name)).cloned()
    }

    pub fn status(&self, name: &str) -> BitwardenSecretStatus {
        self.resource(name)
            .and_then(|r| r.status)
            .unwrap_or_default()
    }

    /// Replace the stored status, as another writer would
    pub fn set_status(&self, name: &str, status: BitwardenSecretStatus) {
        if let Some(resource) = self.state.lock().unwrap().resources.get_mut(&key(NAMESPACE, name)) {
            resource.status = Some(status);
        }
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        self.state.lock().unwrap().secrets.get(&key(NAMESPACE, name)).cloned()
    }

    /// Decoded data of a Secret, or `None` if it does not exist
    pub fn secret_data(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.secret(name).map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, String::from_utf8(v.0).unwrap()))
                .collect()
        })
    }

    pub fn secret_writes(&self) -> usize {
        self.state.lock().unwrap().secret_writes
    }

    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }

    pub fn fail_resource_get(&self) {
        self.state.lock().unwrap().fail_resource_get = true;
    }

    pub fn fail_status_update(&self) {
        self.state.lock().unwrap().fail_status_update = true;
    }

    pub fn fail_secret_patch(&self) {
        self.state.lock().unwrap().fail_secret_patch = true;
    }

    pub fn fail_secret_create(&self) {
        self.state.lock().unwrap().fail_secret_create = true;
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_bitwarden_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BitwardenSecret>, kube::Error> {
        let state = self.state.lock().unwrap();
        if state.fail_resource_get {
            return Err(api_error(500, "InternalError"));
        }
        Ok(state.resources.get(&key(namespace, name)).cloned())
    }

    async fn patch_bitwarden_secret_status(
        &self,
        namespace: &str,
        name: &str,
        status: &BitwardenSecretStatus,
    ) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_status_update {
            return Err(api_error(409, "Conflict"));
        }
        let resource = state
            .resources
            .get_mut(&key(namespace, name))
            .ok_or_else(|| api_error(404, "NotFound"))?;
        let mut merged = serde_json::to_value(resource.status.clone().unwrap_or_default()).unwrap();
        apply_merge_patch(&mut merged, &serde_json::to_value(status).unwrap());
        resource.status = Some(serde_json::from_value(merged).unwrap());
        state.status_writes += 1;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, kube::Error> {
        Ok(self.state.lock().unwrap().secrets.get(&key(namespace, name)).cloned())
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, kube::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_secret_create {
            return Err(api_error(403, "Forbidden"));
        }
        let name = secret.metadata.name.clone().unwrap_or_default();
        let k = key(namespace, &name);
        if state.secrets.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut created = secret.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.resource_version = Some("1".to_string());
        state.secrets.insert(k, created.clone());
        state.secret_writes += 1;
        Ok(created)
    }

    async fn patch_secret(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Secret, kube::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_secret_patch {
            return Err(api_error(422, "Invalid"));
        }
        let k = key(namespace, name);
        let existing = state
            .secrets
            .get(&k)
            .ok_or_else(|| api_error(404, "NotFound"))?;
        let mut value = serde_json::to_value(existing).unwrap();
        apply_merge_patch(&mut value, patch);
        let patched: Secret = serde_json::from_value(value).unwrap();
        state.secrets.insert(k, patched.clone());
        state.secret_writes += 1;
        Ok(patched)
    }
}

/// What the fake Bitwarden returns and what it saw
#[derive(Debug, Default)]
pub struct UpstreamState {
    pub secrets: Vec<RemoteSecret>,
    pub has_changes: bool,
    pub fail_create: bool,
    pub fail_login: bool,
    pub fail_sync: bool,
    pub fail_relogin: bool,
    pub creates: usize,
    pub logins: usize,
    pub syncs: usize,
    pub closes: usize,
    pub last_token: Option<String>,
    pub last_state_file: Option<PathBuf>,
    pub last_organization: Option<String>,
    pub last_synced: Option<Option<DateTime<Utc>>>,
}

/// In-memory Bitwarden Secrets Manager
#[derive(Default)]
pub struct FakeClientFactory {
    pub upstream: Arc<Mutex<UpstreamState>>,
}

impl FakeClientFactory {
    pub fn with_secrets(secrets: Vec<RemoteSecret>) -> Arc<Self> {
        let factory = Self::default();
        {
            let mut upstream = factory.upstream.lock().unwrap();
            upstream.secrets = secrets;
            upstream.has_changes = true;
        }
        Arc::new(factory)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, UpstreamState> {
        self.upstream.lock().unwrap()
    }
}

impl ClientFactory for FakeClientFactory {
    fn create_client(
        &self,
        _api_url: &Url,
        _identity_url: &Url,
    ) -> Result<Box<dyn SecretsManagerClient>, BitwardenError> {
        let mut upstream = self.upstream.lock().unwrap();
        upstream.creates += 1;
        if upstream.fail_create {
            return Err(BitwardenError::State("injected client failure".to_string()));
        }
        Ok(Box::new(FakeClient {
            upstream: self.upstream.clone(),
            logged_in: false,
        }))
    }
}

struct FakeClient {
    upstream: Arc<Mutex<UpstreamState>>,
    logged_in: bool,
}

#[async_trait]
impl SecretsManagerClient for FakeClient {
    async fn access_token_login(
        &mut self,
        access_token: &str,
        state_file: Option<&Path>,
    ) -> Result<(), BitwardenError> {
        let mut upstream = self.upstream.lock().unwrap();
        upstream.logins += 1;
        upstream.last_token = Some(access_token.to_string());
        upstream.last_state_file = state_file.map(Path::to_path_buf);
        if upstream.fail_login {
            return Err(BitwardenError::Api {
                status: 400,
                message: "invalid_client".to_string(),
            });
        }
        self.logged_in = true;
        Ok(())
    }

    async fn sync(
        &mut self,
        organization_id: &str,
        last_synced: Option<DateTime<Utc>>,
    ) -> Result<SyncResponse, BitwardenError> {
        if !self.logged_in {
            return Err(BitwardenError::NotLoggedIn);
        }
        let mut upstream = self.upstream.lock().unwrap();
        upstream.syncs += 1;
        upstream.last_organization = Some(organization_id.to_string());
        upstream.last_synced = Some(last_synced);
        if upstream.fail_relogin {
            return Err(BitwardenError::Reauthentication(Box::new(BitwardenError::Api {
                status: 400,
                message: "invalid_client".to_string(),
            })));
        }
        if upstream.fail_sync {
            return Err(BitwardenError::Api {
                status: 500,
                message: "sync unavailable".to_string(),
            });
        }
        if !upstream.has_changes {
            return Ok(SyncResponse::default());
        }
        Ok(SyncResponse {
            has_changes: true,
            secrets: upstream.secrets.clone(),
        })
    }

    async fn close(&mut self) {
        self.logged_in = false;
        self.upstream.lock().unwrap().closes += 1;
    }
}

pub fn remote(id: &str, name: &str, value: &str) -> RemoteSecret {
    RemoteSecret {
        id: id.to_string(),
        name: name.to_string(),
        value: value.to_string(),
    }
}

pub fn map_entry(id: &str, key: &str) -> SecretMap {
    SecretMap {
        bw_secret_id: id.to_string(),
        secret_key_name: key.to_string(),
    }
}

pub fn opaque_secret(name: &str, data: &[(&str, &str)]) -> Secret {
    let mut secret = Secret::default();
    secret.metadata.name = Some(name.to_string());
    secret.metadata.namespace = Some(NAMESPACE.to_string());
    secret.type_ = Some("Opaque".to_string());
    secret.data = Some(
        data.iter()
            .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
            .collect(),
    );
    secret
}

/// A `BitwardenSecret` named `name` targeting Secret `<name>-secret`
pub fn bitwarden_secret(name: &str) -> BitwardenSecret {
    let mut resource = BitwardenSecret::new(
        name,
        BitwardenSecretSpec {
            organization_id: ORGANIZATION_ID.to_string(),
            secret_name: format!("{name}-secret"),
            auth_token: AuthToken {
                secret_name: AUTH_SECRET_NAME.to_string(),
                secret_key: AUTH_SECRET_KEY.to_string(),
            },
            map: None,
            only_mapped_secrets: true,
            use_secret_names: false,
        },
    );
    resource.metadata.namespace = Some(NAMESPACE.to_string());
    resource.metadata.uid = Some(format!("uid-{name}"));
    resource
}

pub fn controller_config() -> Arc<ControllerConfig> {
    Arc::new(
        ControllerConfig::from_source(|key| match key {
            "BW_SECRETS_MANAGER_STATE_PATH" => Some("/var/bitwarden/test-state".to_string()),
            "POD_NAME" => Some("operator-0".to_string()),
            _ => None,
        })
        .unwrap(),
    )
}

pub fn reconciler(cluster: Arc<FakeCluster>, factory: Arc<FakeClientFactory>) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(cluster, factory, controller_config()))
}
