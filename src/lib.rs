//! Bitwarden Secrets Manager Operator Library
//!
//! Core functionality for the operator: the `BitwardenSecret` CRD, the
//! reconciler, the native Bitwarden client and the runtime around them.
//!
//! ## Quick Start
//!
//! ```rust
//! use bitwarden_sm_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
