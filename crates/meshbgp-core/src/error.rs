//! Error types for policy loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while loading or validating the static policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy document: {0}")]
    Parse(String),

    #[error("invalid ASN {0:?}: expected an integer in 1..=4294967295")]
    InvalidAsn(String),

    #[error("invalid router-ID {0:?}: expected an IPv4 address")]
    InvalidRouterId(String),
}
