//! # Conditions
//!
//! Merge semantics follow the Kubernetes `SetStatusCondition` helper:
//! conditions are keyed by type, `lastTransitionTime` only moves when the
//! status value changes, and reason/message are always overwritten.

use crate::constants::{
    CONDITION_FAILED_SYNC, CONDITION_SUCCESSFUL_SYNC, REASON_RECONCILIATION_COMPLETE,
    REASON_RECONCILIATION_FAILED,
};
use crate::crd::Condition;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Insert or update `condition` in `conditions`
///
/// A new condition, or one whose status changed, gets `now` as its
/// transition time. Otherwise the existing transition time is kept.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition, now: DateTime<Utc>) {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            if existing.status != condition.status {
                existing.status = condition.status;
                existing.last_transition_time = Some(timestamp);
            } else if existing.last_transition_time.is_none() {
                existing.last_transition_time = Some(timestamp);
            }
            existing.reason = condition.reason;
            existing.message = condition.message;
        }
        None => {
            condition.last_transition_time = Some(timestamp);
            conditions.push(condition);
        }
    }
}

#[must_use]
pub fn successful_sync_condition(namespace: &str, name: &str) -> Condition {
    Condition {
        r#type: CONDITION_SUCCESSFUL_SYNC.to_string(),
        status: "True".to_string(),
        last_transition_time: None,
        reason: Some(REASON_RECONCILIATION_COMPLETE.to_string()),
        message: Some(format!("Completed sync for {namespace}/{name}")),
    }
}

/// `FailedSync` carries status `False`; the message holds the error text
#[must_use]
pub fn failed_sync_condition(message: String) -> Condition {
    Condition {
        r#type: CONDITION_FAILED_SYNC.to_string(),
        status: "False".to_string(),
        last_transition_time: None,
        reason: Some(REASON_RECONCILIATION_FAILED.to_string()),
        message: Some(message),
    }
}

/// Time left before a resource synced at `last_sync` is due again
///
/// Returns `None` when the resource has never synced or the refresh interval
/// has elapsed. A sync time in the future counts as fresh for the full
/// interval.
#[must_use]
pub fn freshness_remaining(
    last_sync: Option<DateTime<Utc>>,
    refresh_interval: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let last_sync = last_sync?;
    let elapsed = (now - last_sync).to_std().unwrap_or(Duration::ZERO);
    refresh_interval
        .checked_sub(elapsed)
        .filter(|remaining| !remaining.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[test]
    fn test_new_condition_gets_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, successful_sync_condition("ns", "bw"), at(0));

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, "SuccessfulSync");
        assert_eq!(conditions[0].reason.as_deref(), Some("ReconciliationComplete"));
        assert_eq!(conditions[0].message.as_deref(), Some("Completed sync for ns/bw"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
    }

    #[test]
    fn test_unchanged_status_keeps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, failed_sync_condition("first".to_string()), at(0));
        set_condition(&mut conditions, failed_sync_condition("second".to_string()), at(60));

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message.as_deref(), Some("second"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
    }

    #[test]
    fn test_changed_status_moves_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, successful_sync_condition("ns", "bw"), at(0));
        let mut cleared = successful_sync_condition("ns", "bw");
        cleared.status = "False".to_string();
        set_condition(&mut conditions, cleared, at(60));

        assert_eq!(conditions[0].status, "False");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2023-11-14T22:14:20Z")
        );
    }

    #[test]
    fn test_conditions_of_other_types_are_preserved() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, failed_sync_condition("boom".to_string()), at(0));
        set_condition(&mut conditions, successful_sync_condition("ns", "bw"), at(10));

        let types: Vec<&str> = conditions.iter().map(|c| c.r#type.as_str()).collect();
        assert_eq!(types, vec!["FailedSync", "SuccessfulSync"]);
    }

    #[test]
    fn test_freshness_remaining() {
        let interval = Duration::from_secs(300);
        let cases = vec![
            ("never synced", None, at(0), None),
            ("just synced", Some(at(0)), at(0), Some(Duration::from_secs(300))),
            ("half way", Some(at(0)), at(120), Some(Duration::from_secs(180))),
            ("exactly due", Some(at(0)), at(300), None),
            ("overdue", Some(at(0)), at(900), None),
            ("clock skew", Some(at(30)), at(0), Some(Duration::from_secs(300))),
        ];
        for (description, last, now, expected) in cases {
            assert_eq!(
                freshness_remaining(last, interval, now),
                expected,
                "Unexpected freshness for case: {description}"
            );
        }
    }
}
