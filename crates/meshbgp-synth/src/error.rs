//! Synthesis error types.

use thiserror::Error;

/// Result type alias for synthesis.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Errors that stop configuration synthesis for a node.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No IPv4 router-ID could be found or derived for the node.
    ///
    /// IPv6-only nodes need the override or the router-ID annotation.
    #[error("no router-ID for node {node}: set the policy routerID or annotate the node")]
    MissingRouterId { node: String },

    #[error("failed to serialize configuration: {0}")]
    Render(String),
}
