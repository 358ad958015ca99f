//! # Validation
//!
//! Validates Bitwarden secret names before they are used as Secret keys.

mod names;

pub use names::{validate_secret_name, validate_secret_names, SecretNameError};
