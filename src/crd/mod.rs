//! # Custom Resource Definitions
//!
//! CRD types for the Bitwarden Secrets Manager operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `BitwardenSecret` specification and default values
//! - `status.rs` - Status subresource and conditions

mod spec;
mod status;

pub use spec::{default_false, default_true, AuthToken, BitwardenSecret, BitwardenSecretSpec, SecretMap};
pub use status::{BitwardenSecretStatus, Condition};
