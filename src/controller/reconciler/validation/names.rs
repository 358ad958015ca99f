//! # Secret Name Validation
//!
//! When `useSecretNames` is set, Bitwarden secret names become Secret data
//! keys and end up as environment variable names in consuming pods. They must
//! be POSIX-style identifiers: a letter or underscore followed by letters,
//! digits or underscores. Case-sensitive, no length limit.

use crate::controller::reconciler::types::ReconcilerError;
use crate::provider::RemoteSecret;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;

static SECRET_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("secret name pattern is valid")
});

/// Why a single name was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretNameError {
    #[error("cannot be empty")]
    Empty,

    #[error("must start with a letter or underscore, found '{0}'")]
    InvalidStart(char),

    #[error("contains invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },
}

/// Validate one secret name
///
/// # Errors
/// Returns the first rule the name breaks
pub fn validate_secret_name(name: &str) -> Result<(), SecretNameError> {
    if SECRET_NAME_PATTERN.is_match(name) {
        return Ok(());
    }

    let mut chars = name.chars().enumerate();
    let Some((_, first)) = chars.next() else {
        return Err(SecretNameError::Empty);
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SecretNameError::InvalidStart(first));
    }
    for (position, character) in chars {
        if !(character.is_ascii_alphanumeric() || character == '_') {
            return Err(SecretNameError::InvalidCharacter {
                character,
                position,
            });
        }
    }

    // Unreachable while the pattern and the scan agree
    Err(SecretNameError::Empty)
}

/// Validate the names of a whole sync bundle
///
/// Every invalid name is reported, each tagged with its secret id. Duplicates
/// are only checked once all names are individually valid.
///
/// # Errors
/// `InvalidSecretNames` if any name breaks the rules, otherwise
/// `DuplicateSecretNames` listing each repeated name once
pub fn validate_secret_names(secrets: &[RemoteSecret]) -> Result<(), ReconcilerError> {
    let invalid: Vec<String> = secrets
        .iter()
        .filter_map(|secret| {
            validate_secret_name(&secret.name)
                .err()
                .map(|e| format!("secret {} has invalid name '{}': {e}", secret.id, secret.name))
        })
        .collect();
    if !invalid.is_empty() {
        return Err(ReconcilerError::InvalidSecretNames(invalid));
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for secret in secrets {
        if !seen.insert(secret.name.as_str()) {
            duplicates.insert(secret.name.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(ReconcilerError::DuplicateSecretNames(
            duplicates.into_iter().collect(),
        ));
    }

    Ok(())
}
