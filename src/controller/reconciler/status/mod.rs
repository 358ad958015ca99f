//! # Status
//!
//! Condition bookkeeping for `BitwardenSecret` and the annotations stamped on
//! target Secrets.

mod annotations;
mod conditions;

pub use annotations::{annotate_target, AnnotationError};
pub use conditions::{
    failed_sync_condition, freshness_remaining, set_condition, successful_sync_condition,
};
