//! Reload notification for the BGP daemon.
//!
//! Notification is best-effort: failures are logged by the caller and
//! never retried. GoBGP reloads its configuration file on `SIGHUP`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while notifying the BGP daemon.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to read pidfile {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid pid {value:?} in {path}")]
    InvalidPid { path: PathBuf, value: String },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: io::Error,
    },
}

/// Tells the BGP daemon that its configuration file changed.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, artifact: &Path) -> Result<(), NotifyError>;
}

/// Does nothing; used when no daemon pidfile is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _artifact: &Path) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sends `SIGHUP` to the process whose pid is in a pidfile.
#[derive(Debug, Clone)]
pub struct SighupNotifier {
    pidfile: PathBuf,
}

impl SighupNotifier {
    pub fn new(pidfile: impl Into<PathBuf>) -> Self {
        Self {
            pidfile: pidfile.into(),
        }
    }

    async fn read_pid(&self) -> Result<i32, NotifyError> {
        let raw = tokio::fs::read_to_string(&self.pidfile)
            .await
            .map_err(|source| NotifyError::PidFile {
                path: self.pidfile.clone(),
                source,
            })?;

        let value = raw.trim();
        match value.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(pid),
            _ => Err(NotifyError::InvalidPid {
                path: self.pidfile.clone(),
                value: value.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Notifier for SighupNotifier {
    async fn notify(&self, _artifact: &Path) -> Result<(), NotifyError> {
        let pid = self.read_pid().await?;

        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, libc::SIGHUP) };
        if rc != 0 {
            return Err(NotifyError::Signal {
                pid,
                source: io::Error::last_os_error(),
            });
        }

        tracing::debug!(pid, "sent SIGHUP to BGP daemon");
        Ok(())
    }
}
