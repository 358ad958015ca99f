//! # Annotations
//!
//! Stamps the target Secret with the time of the write and, when the resource
//! carries a `map`, a pretty-printed copy of that map.

use crate::constants::{ANNOTATION_CUSTOM_MAP, ANNOTATION_SYNC_TIME};
use crate::crd::SecretMap;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to serialize secret map annotation: {0}")]
pub struct AnnotationError(#[from] serde_json::Error);

/// Set the sync-time and custom-map annotations on `secret`
///
/// The sync-time annotation is always written. The custom-map annotation is
/// written when `map` is present and removed otherwise. Other annotations and
/// labels are left alone.
///
/// # Errors
/// Returns an error if the map cannot be serialized; the sync-time annotation
/// has been written by then
pub fn annotate_target(
    secret: &mut Secret,
    map: Option<&[SecretMap]>,
    now: DateTime<Utc>,
) -> Result<(), AnnotationError> {
    let annotations = secret.metadata.annotations.get_or_insert_with(Default::default);

    annotations.insert(
        ANNOTATION_SYNC_TIME.to_string(),
        now.to_rfc3339_opts(SecondsFormat::Nanos, true),
    );

    match map {
        Some(map) => {
            let rendered = serde_json::to_string_pretty(map)?;
            annotations.insert(ANNOTATION_CUSTOM_MAP.to_string(), rendered);
        }
        None => {
            annotations.remove(ANNOTATION_CUSTOM_MAP);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 123_456_789).single().unwrap()
    }

    fn secret_with(annotations: &[(&str, &str)]) -> Secret {
        let mut secret = Secret::default();
        if !annotations.is_empty() {
            secret.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            );
        }
        secret
    }

    #[test]
    fn test_sync_time_uses_nanosecond_rfc3339() {
        let mut secret = secret_with(&[]);
        annotate_target(&mut secret, None, now()).unwrap();

        let annotations = secret.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get(ANNOTATION_SYNC_TIME).map(String::as_str),
            Some("2023-11-14T22:13:20.123456789Z")
        );
        assert!(!annotations.contains_key(ANNOTATION_CUSTOM_MAP));
    }

    #[test]
    fn test_custom_map_is_pretty_printed() {
        let map = vec![SecretMap {
            bw_secret_id: "6c230265-d472-45f7-b763-b11b01023ca6".to_string(),
            secret_key_name: "DB_PASSWORD".to_string(),
        }];
        let mut secret = secret_with(&[]);
        annotate_target(&mut secret, Some(&map), now()).unwrap();

        let annotations = secret.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get(ANNOTATION_CUSTOM_MAP).map(String::as_str),
            Some(
                "[\n  {\n    \"bwSecretId\": \"6c230265-d472-45f7-b763-b11b01023ca6\",\n    \"secretKeyName\": \"DB_PASSWORD\"\n  }\n]"
            )
        );
    }

    #[test]
    fn test_stale_custom_map_is_removed() {
        let mut secret = secret_with(&[(ANNOTATION_CUSTOM_MAP, "[]"), ("team", "payments")]);
        annotate_target(&mut secret, None, now()).unwrap();

        let annotations = secret.metadata.annotations.unwrap();
        assert!(!annotations.contains_key(ANNOTATION_CUSTOM_MAP));
        assert_eq!(annotations.get("team").map(String::as_str), Some("payments"));
    }

    #[test]
    fn test_labels_are_untouched() {
        let mut secret = secret_with(&[]);
        secret.metadata.labels = Some(BTreeMap::from([("app".to_string(), "web".to_string())]));
        annotate_target(&mut secret, Some(&[]), now()).unwrap();

        assert_eq!(
            secret.metadata.labels.unwrap().get("app").map(String::as_str),
            Some("web")
        );
        assert_eq!(
            secret
                .metadata
                .annotations
                .unwrap()
                .get(ANNOTATION_CUSTOM_MAP)
                .map(String::as_str),
            Some("[]")
        );
    }
}
