//! Node source error types.

use thiserror::Error;

/// Result type alias for node source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Transient failures talking to the cluster control plane.
///
/// The watcher logs and retries all of these; none reach the driver.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to list nodes: {0}")]
    List(String),

    #[error("failed to open node watch: {0}")]
    Watch(String),

    #[error("node watch stream error: {0}")]
    Stream(String),
}
