//! Rendered configuration output.
//!
//! Writes go to a temporary file next to the target and are renamed into
//! place, so the BGP daemon never reads a half-written file. Identical
//! content is never rewritten.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Writes the rendered configuration to a fixed path.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    path: PathBuf,
}

impl ArtifactWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with `contents` unless it already holds exactly
    /// those bytes. Returns whether a write happened.
    pub async fn write_if_changed(&self, contents: &[u8]) -> io::Result<bool> {
        match tokio::fs::read(&self.path).await {
            Ok(existing) if existing == contents => {
                debug!(path = ?self.path, "configuration unchanged on disk");
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        debug!(path = ?self.path, bytes = contents.len(), "configuration written");
        Ok(true)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}
