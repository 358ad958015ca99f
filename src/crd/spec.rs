//! # BitwardenSecret Spec
//!
//! Main CRD specification types and default values.

use serde::{Deserialize, Serialize};

/// BitwardenSecret Custom Resource Definition
///
/// Binds one Bitwarden machine account to a single Kubernetes Secret in the
/// same namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: k8s.bitwarden.com/v1
/// kind: BitwardenSecret
/// metadata:
///   name: bw-sample
///   namespace: default
/// spec:
///   organizationId: "a08a8157-129e-4002-bab4-b118014ca9c7"
///   secretName: bw-sample-secret
///   authToken:
///     secretName: bw-auth-token
///     secretKey: token
///   map:
///     - bwSecretId: 6c230265-d472-45f7-b763-b11b01023ca6
///       secretKeyName: DATABASE_PASSWORD
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "BitwardenSecret",
    group = "k8s.bitwarden.com",
    version = "v1",
    namespaced,
    status = "crate::crd::BitwardenSecretStatus",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}"#,
    printcolumn = r#"{"name":"Last Sync", "type":"string", "jsonPath":".status.lastSuccessfulSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BitwardenSecretSpec {
    /// Organization that owns the secrets, passed verbatim to the sync call
    pub organization_id: String,
    /// Name of the Kubernetes Secret to create or update (same namespace)
    pub secret_name: String,
    /// Secret holding the machine account access token
    pub auth_token: AuthToken,
    /// Renames Bitwarden secret IDs to Secret keys; first entry for an ID wins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Vec<SecretMap>>,
    /// Only write secrets present in `map`
    /// Default: true
    #[serde(default = "default_true")]
    pub only_mapped_secrets: bool,
    /// Use the Bitwarden secret name as the Secret key instead of its ID
    /// Names must be POSIX identifiers and unique within the organization
    /// Default: false
    #[serde(default = "default_false")]
    pub use_secret_names: bool,
}

/// Reference to the Secret holding the access token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    /// Secret name (same namespace as the BitwardenSecret)
    pub secret_name: String,
    /// Key inside the Secret's data
    pub secret_key: String,
}

/// One entry of the rename map
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretMap {
    /// Bitwarden secret ID
    pub bw_secret_id: String,
    /// Key written to the Kubernetes Secret
    pub secret_key_name: String,
}

/// Default value for boolean fields that default to true
#[must_use]
pub fn default_true() -> bool {
    true
}

/// Default value for boolean fields that default to false
#[must_use]
pub fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_when_fields_omitted() {
        let spec: BitwardenSecretSpec = serde_json::from_value(serde_json::json!({
            "organizationId": "org",
            "secretName": "target",
            "authToken": { "secretName": "token", "secretKey": "key" }
        }))
        .unwrap();

        assert!(spec.only_mapped_secrets);
        assert!(!spec.use_secret_names);
        assert!(spec.map.is_none());
    }

    #[test]
    fn test_map_entry_requires_both_fields() {
        let result = serde_json::from_value::<SecretMap>(serde_json::json!({ "bwSecretId": "id" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_map_round_trips_in_camel_case() {
        let entry = SecretMap {
            bw_secret_id: "id".to_string(),
            secret_key_name: "KEY".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, serde_json::json!({ "bwSecretId": "id", "secretKeyName": "KEY" }));
    }
}
