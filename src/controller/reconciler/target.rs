//! # Target Secret
//!
//! Builds the Kubernetes Secret a `BitwardenSecret` writes into and computes
//! the JSON merge patch that moves an existing Secret to its desired state.

use crate::constants::LABEL_BW_SECRET;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::BitwardenSecret;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A fresh, empty Opaque Secret owned by `resource`
///
/// # Errors
/// `OwnershipFailure` if the resource has no name or UID to reference
pub fn new_target_secret(resource: &BitwardenSecret) -> Result<Secret, ReconcilerError> {
    let secret_name = resource.spec.secret_name.clone();
    let owner = resource
        .controller_owner_ref(&())
        .ok_or_else(|| ReconcilerError::OwnershipFailure(secret_name.clone()))?;
    let uid = resource
        .uid()
        .ok_or_else(|| ReconcilerError::OwnershipFailure(secret_name.clone()))?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(secret_name),
            namespace: resource.namespace(),
            labels: Some(BTreeMap::from([(LABEL_BW_SECRET.to_string(), uid)])),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::new()),
        ..Secret::default()
    })
}

/// Ensure the ownership label points at `resource`
///
/// Pre-existing Secrets adopted by a resource get the label on their first
/// write; their owner references are left as found.
pub fn label_target(secret: &mut Secret, resource: &BitwardenSecret) {
    if let Some(uid) = resource.uid() {
        secret
            .labels_mut()
            .insert(LABEL_BW_SECRET.to_string(), uid);
    }
}

/// Replace the Secret's data with `values`, encoded as UTF-8 bytes
pub fn replace_data(secret: &mut Secret, values: BTreeMap<String, String>) {
    secret.data = Some(
        values
            .into_iter()
            .map(|(key, value)| (key, ByteString(value.into_bytes())))
            .collect(),
    );
    secret.string_data = None;
}

/// JSON merge patch (RFC 7386) turning `original` into `modified`
///
/// Keys absent from `modified` become `null`, nested objects are diffed
/// recursively and every other changed value is replaced wholesale. Returns an
/// empty object when nothing differs.
///
/// # Errors
/// Returns an error if either Secret fails to serialize
pub fn merge_patch(original: &Secret, modified: &Secret) -> Result<Value, serde_json::Error> {
    let original = serde_json::to_value(original)?;
    let modified = serde_json::to_value(modified)?;
    Ok(diff(&original, &modified).unwrap_or_else(|| Value::Object(Map::new())))
}

fn diff(original: &Value, modified: &Value) -> Option<Value> {
    match (original, modified) {
        (Value::Object(before), Value::Object(after)) => {
            let mut patch = Map::new();
            for key in before.keys() {
                if !after.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            for (key, value) in after {
                match before.get(key) {
                    Some(previous) => {
                        if let Some(change) = diff(previous, value) {
                            patch.insert(key.clone(), change);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        _ if original == modified => None,
        _ => Some(modified.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AuthToken, BitwardenSecretSpec};
    use serde_json::json;

    fn resource(uid: Option<&str>) -> BitwardenSecret {
        let mut resource = BitwardenSecret::new(
            "bw-sample",
            BitwardenSecretSpec {
                organization_id: "org".to_string(),
                secret_name: "target".to_string(),
                auth_token: AuthToken {
                    secret_name: "bw-token".to_string(),
                    secret_key: "token".to_string(),
                },
                map: None,
                only_mapped_secrets: true,
                use_secret_names: false,
            },
        );
        resource.metadata.namespace = Some("apps".to_string());
        resource.metadata.uid = uid.map(str::to_string);
        resource
    }

    #[test]
    fn test_new_target_is_owned_and_labelled() {
        let secret = new_target_secret(&resource(Some("uid-1"))).unwrap();

        assert_eq!(secret.metadata.name.as_deref(), Some("target"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("apps"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(
            secret.metadata.labels.unwrap().get(LABEL_BW_SECRET).map(String::as_str),
            Some("uid-1")
        );

        let owners = secret.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "BitwardenSecret");
        assert_eq!(owners[0].name, "bw-sample");
        assert_eq!(owners[0].uid, "uid-1");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(owners[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn test_new_target_without_uid_fails() {
        match new_target_secret(&resource(None)) {
            Err(ReconcilerError::OwnershipFailure(name)) => assert_eq!(name, "target"),
            other => panic!("Expected OwnershipFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_replace_data_drops_stale_keys() {
        let mut secret = Secret {
            data: Some(BTreeMap::from([(
                "OLD".to_string(),
                ByteString(b"x".to_vec()),
            )])),
            ..Secret::default()
        };
        replace_data(&mut secret, BTreeMap::from([("NEW".to_string(), "y".to_string())]));

        let data = secret.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.get("NEW"), Some(&ByteString(b"y".to_vec())));
    }

    #[test]
    fn test_merge_patch_nulls_removed_keys() {
        let original = Secret {
            data: Some(BTreeMap::from([
                ("KEEP".to_string(), ByteString(b"same".to_vec())),
                ("GONE".to_string(), ByteString(b"old".to_vec())),
            ])),
            ..Secret::default()
        };
        let mut modified = original.clone();
        replace_data(
            &mut modified,
            BTreeMap::from([
                ("KEEP".to_string(), "same".to_string()),
                ("ADDED".to_string(), "new".to_string()),
            ]),
        );

        let patch = merge_patch(&original, &modified).unwrap();
        assert_eq!(
            patch,
            json!({ "data": { "GONE": null, "ADDED": "bmV3" } })
        );
    }

    #[test]
    fn test_merge_patch_of_identical_secrets_is_empty() {
        let secret = new_target_secret(&resource(Some("uid-1"))).unwrap();
        assert_eq!(merge_patch(&secret, &secret).unwrap(), json!({}));
    }

    #[test]
    fn test_diff_replaces_arrays_and_scalars() {
        let cases = vec![
            (json!({"a": [1, 2]}), json!({"a": [1]}), Some(json!({"a": [1]}))),
            (json!({"a": "x"}), json!({"a": "y"}), Some(json!({"a": "y"}))),
            (json!({"a": {"b": 1, "c": 2}}), json!({"a": {"b": 1}}), Some(json!({"a": {"c": null}}))),
            (json!({"a": 1}), json!({"a": 1}), None),
        ];
        for (before, after, expected) in cases {
            assert_eq!(diff(&before, &after), expected, "Unexpected diff for {before} -> {after}");
        }
    }
}
