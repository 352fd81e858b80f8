//! The sync loop.
//!
//! One cycle: read the current snapshot, synthesize this node's
//! configuration, write it if it changed, and notify the BGP daemon.
//! Cycles run strictly one after another, so there is only ever one
//! writer of the configuration file.

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use meshbgp_core::{ClusterSnapshot, ROUTER_ID_ANNOTATION, StaticPolicy};
use meshbgp_synth::{SynthesisError, synthesize};
use meshbgp_watch::{ChangeReceiver, ClusterWatcher};

use crate::artifact::ArtifactWriter;
use crate::notify::Notifier;

/// Result of a single sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new configuration was written and the daemon notified.
    Written { internal: usize, external: usize },
    /// The rendered configuration matched what was already on disk.
    Unchanged,
    /// The local node has no router-ID; the previous file was kept.
    MissingRouterId,
    /// Rendering or writing failed; the previous file was kept.
    Failed,
}

/// Drives synthesis for the local node.
pub struct Driver<N> {
    node_name: String,
    policy: StaticPolicy,
    output: ArtifactWriter,
    notifier: N,
    /// Whether the daemon has acknowledged a notification yet.
    daemon_seen: bool,
}

impl<N: Notifier> Driver<N> {
    pub fn new(
        node_name: impl Into<String>,
        policy: StaticPolicy,
        output: ArtifactWriter,
        notifier: N,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            policy,
            output,
            notifier,
            daemon_seen: false,
        }
    }

    /// Run one cycle against `snapshot`.
    pub async fn sync_once(&mut self, snapshot: &ClusterSnapshot) -> CycleOutcome {
        let rendered = match synthesize(&self.node_name, snapshot, &self.policy) {
            Ok(rendered) => rendered,
            Err(SynthesisError::MissingRouterId { node }) => {
                error!(
                    %node,
                    annotation = ROUTER_ID_ANNOTATION,
                    "node has no IPv4 address to use as router-ID; set routerID in the policy \
                     or annotate the node; keeping the previous configuration"
                );
                return CycleOutcome::MissingRouterId;
            }
            Err(e) => {
                error!(error = %e, "configuration synthesis failed; keeping the previous configuration");
                return CycleOutcome::Failed;
            }
        };

        let doc = rendered.document();
        let internal = doc.internal_neighbors().count();
        let external = doc.external_neighbors().count();

        match self.output.write_if_changed(rendered.as_bytes()).await {
            Ok(false) => {
                debug!(nodes = snapshot.len(), "configuration unchanged, nothing to do");
                return CycleOutcome::Unchanged;
            }
            Ok(true) => {
                info!(
                    path = ?self.output.path(),
                    router_id = %doc.router_id(),
                    internal,
                    external,
                    "BGP configuration updated"
                );
            }
            Err(e) => {
                error!(path = ?self.output.path(), error = %e, "failed to write BGP configuration");
                return CycleOutcome::Failed;
            }
        }

        self.notify().await;
        CycleOutcome::Written { internal, external }
    }

    /// First cycle after start.
    ///
    /// An unchanged file is still announced: a previous run may have
    /// renamed it into place and died before reaching the daemon.
    pub async fn initial_sync(&mut self, snapshot: &ClusterSnapshot) -> CycleOutcome {
        let outcome = self.sync_once(snapshot).await;
        if outcome == CycleOutcome::Unchanged {
            self.notify().await;
        }
        outcome
    }

    async fn notify(&mut self) {
        match self.notifier.notify(self.output.path()).await {
            Ok(()) => self.daemon_seen = true,
            // The daemon may simply not be up yet.
            Err(e) if !self.daemon_seen => {
                debug!(error = %e, "BGP daemon not reachable yet")
            }
            Err(e) => warn!(error = %e, "failed to notify BGP daemon of updated configuration"),
        }
    }

    /// Consume change signals until shutdown or until the watcher goes away.
    ///
    /// Waits for the watcher's first snapshot before the initial cycle.
    /// A missing router-ID on that initial cycle is returned as an error;
    /// later ones only skip the cycle.
    pub async fn run(
        mut self,
        watcher: &ClusterWatcher,
        mut changes: ChangeReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let ready = tokio::select! {
            ready = watcher.ready() => ready,
            _ = shutdown.wait_for(|stop| *stop) => return Ok(()),
        };
        if !ready {
            anyhow::bail!("cluster watcher stopped before the first node list");
        }

        // The initial snapshot is read directly; drop its pending signal.
        let _ = changes.try_recv();

        if self.initial_sync(&watcher.snapshot()).await == CycleOutcome::MissingRouterId {
            anyhow::bail!("cannot derive a router-ID for node {}", self.node_name);
        }

        info!(node = %self.node_name, "sync loop started");

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("sync loop shutting down");
                    break;
                }
                signal = changes.recv() => {
                    if signal.is_none() {
                        warn!("cluster watcher went away, stopping sync loop");
                        break;
                    }
                    self.sync_once(&watcher.snapshot()).await;
                }
            }
        }

        Ok(())
    }
}
