//! # Cluster Access
//!
//! The Kubernetes reads and writes a reconciliation performs, behind a trait
//! so the reconciler can be exercised against an in-memory cluster.

use crate::constants::FIELD_MANAGER;
use crate::crd::{BitwardenSecret, BitwardenSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;

/// Kubernetes operations used by the reconciler
///
/// Lookups return `Ok(None)` for objects that do not exist; every other API
/// failure is passed through untouched.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_bitwarden_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BitwardenSecret>, kube::Error>;

    /// Merge-patch the status subresource
    ///
    /// `lastSuccessfulSyncTime` is only written when set; `None` leaves the
    /// stored value alone.
    async fn patch_bitwarden_secret_status(
        &self,
        namespace: &str,
        name: &str,
        status: &BitwardenSecretStatus,
    ) -> Result<(), kube::Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, kube::Error>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, kube::Error>;

    /// Apply a JSON merge patch to a Secret
    async fn patch_secret(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Secret, kube::Error>;
}

/// [`ClusterClient`] backed by a live API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn get_bitwarden_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BitwardenSecret>, kube::Error> {
        let api: Api<BitwardenSecret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn patch_bitwarden_secret_status(
        &self,
        namespace: &str,
        name: &str,
        status: &BitwardenSecretStatus,
    ) -> Result<(), kube::Error> {
        let api: Api<BitwardenSecret> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(patch),
        )
        .await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        api.create(&params, secret).await
    }

    async fn patch_secret(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Secret, kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
    }
}
