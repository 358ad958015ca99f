//! # BitwardenSecret Status
//!
//! Status subresource: last successful sync time and conditions merged by type.

use serde::{Deserialize, Serialize};

/// Status of the BitwardenSecret resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BitwardenSecretStatus {
    /// Time of the most recent completed sync (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_sync_time: Option<String>,
    /// Conditions keyed by type (`SuccessfulSync`, `FailedSync`)
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BitwardenSecretStatus {
    /// Parsed `lastSuccessfulSyncTime`; unparsable values count as never synced
    #[must_use]
    pub fn last_successful_sync(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.last_successful_sync_time
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&chrono::Utc))
    }

    /// Look up a condition by type
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}
