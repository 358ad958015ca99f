//! # Mapping
//!
//! Decides which synced secrets land in the target Secret and under which
//! data keys.
//!
//! | `useSecretNames` | `map`     | `onlyMappedSecrets` | keys                                   |
//! |------------------|-----------|---------------------|----------------------------------------|
//! | true             | any       | any                 | every secret, keyed by its name        |
//! | false            | non-empty | true                | mapped secrets only, keyed by mapping  |
//! | false            | non-empty | false               | every secret, mapped key or its UUID   |
//! | false            | empty     | true                | nothing                                |
//! | false            | empty     | false               | every secret, keyed by its UUID        |

use crate::crd::{BitwardenSecretSpec, SecretMap};
use crate::provider::RemoteSecret;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Build the key/value map for the target Secret from one sync bundle
///
/// Mapping entries with an empty id or key name are ignored. When the same
/// `bwSecretId` appears more than once, the first entry wins. Ids in the map
/// that the bundle does not contain are ignored.
#[must_use]
pub fn map_secrets(secrets: &[RemoteSecret], spec: &BitwardenSecretSpec) -> BTreeMap<String, String> {
    if spec.use_secret_names {
        return secrets
            .iter()
            .fold(BTreeMap::new(), |acc, secret| insert(acc, &secret.name, secret));
    }

    let mapping = mapping_table(spec.map.as_deref().unwrap_or_default());

    secrets
        .iter()
        .filter_map(|secret| match mapping.get(secret.id.as_str()) {
            Some(key) => Some((*key, secret)),
            None if spec.only_mapped_secrets => None,
            None => Some((secret.id.as_str(), secret)),
        })
        .fold(BTreeMap::new(), |acc, (key, secret)| insert(acc, key, secret))
}

fn mapping_table(map: &[SecretMap]) -> HashMap<&str, &str> {
    let mut table = HashMap::new();
    for entry in map {
        if entry.bw_secret_id.is_empty() || entry.secret_key_name.is_empty() {
            continue;
        }
        table
            .entry(entry.bw_secret_id.as_str())
            .or_insert(entry.secret_key_name.as_str());
    }
    table
}

fn insert(
    mut acc: BTreeMap<String, String>,
    key: &str,
    secret: &RemoteSecret,
) -> BTreeMap<String, String> {
    if acc.insert(key.to_string(), secret.value.clone()).is_some() {
        warn!(
            "Key '{}' produced by more than one secret; keeping value of secret {}",
            key, secret.id
        );
    }
    acc
}
