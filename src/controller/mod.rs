//! # Controller
//!
//! Core controller modules for the Bitwarden Secrets Manager operator.
//!
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP servers for metrics and health probes
//!
//! The `crdgen` binary lives alongside these modules but is built as its own
//! target.

pub mod reconciler;
pub mod server;
