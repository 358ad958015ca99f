//! # Observability
//!
//! Prometheus collectors for reconciliations and Bitwarden requests, served
//! on `/metrics` by the controller server. Logging goes through `tracing`
//! and is set up in `runtime::initialization`.

pub mod metrics;

pub use metrics::*;
