//! Cluster watcher — background list/watch loop with a coalesced signal.
//!
//! The watcher owns the only writable copy of the cluster snapshot. It
//! publishes new snapshots through an `ArcSwap` so readers never block and
//! never observe a half-built snapshot, and it wakes consumers through a
//! channel with a single slot: if a wake-up is already pending, further
//! ones are dropped because the consumer will read the latest snapshot
//! anyway.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use meshbgp_core::ClusterSnapshot;

use crate::diff::{diff_snapshots, snapshot_changed};
use crate::source::{NodeEvents, NodeSource};

/// Receiving half of the change signal.
///
/// Each message only means "re-read the snapshot".
pub type ChangeReceiver = mpsc::Receiver<()>;

/// Tuning for the watch loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Upper bound on time between full re-lists, even without events.
    pub max_wait: Duration,
    /// Fixed delay after a failed list or watch call.
    pub retry_backoff: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl WatcherConfig {
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }
}

/// Outcome of offering a wake-up to the change channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The slot was empty and now holds a wake-up.
    Sent,
    /// A wake-up was already pending; this one was dropped.
    Coalesced,
    /// Nobody is listening any more.
    Closed,
}

/// Offer a wake-up without ever blocking the caller.
pub fn signal(tx: &mpsc::Sender<()>) -> Signal {
    match tx.try_send(()) {
        Ok(()) => Signal::Sent,
        Err(mpsc::error::TrySendError::Full(())) => Signal::Coalesced,
        Err(mpsc::error::TrySendError::Closed(())) => Signal::Closed,
    }
}

/// Handle to a running cluster watcher.
///
/// Dropping the handle stops the background task.
pub struct ClusterWatcher {
    snapshot: Arc<ArcSwap<ClusterSnapshot>>,
    changes: Option<ChangeReceiver>,
    ready: watch::Receiver<bool>,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ClusterWatcher {
    /// Spawn the watch loop on the current runtime.
    ///
    /// Returns immediately; the first list happens in the background.
    /// Until it succeeds, [`snapshot`](Self::snapshot) is empty.
    pub fn start<S: NodeSource>(source: S, config: WatcherConfig) -> Self {
        let snapshot = Arc::new(ArcSwap::from_pointee(ClusterSnapshot::default()));
        let (changes_tx, changes_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let watch_loop = WatchLoop {
            source,
            config,
            snapshot: snapshot.clone(),
            changes: changes_tx,
            ready: ready_tx,
            shutdown: shutdown_rx,
            primed: false,
        };

        let handle = tokio::spawn(watch_loop.run());

        Self {
            snapshot,
            changes: Some(changes_rx),
            ready: ready_rx,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// The most recently committed snapshot.
    pub fn snapshot(&self) -> Arc<ClusterSnapshot> {
        self.snapshot.load_full()
    }

    /// Take the change receiver. Only the first call returns `Some`.
    pub fn changes(&mut self) -> Option<ChangeReceiver> {
        self.changes.take()
    }

    /// Wait until the first successful list has been committed.
    ///
    /// Returns `false` if the watcher stopped before that happened.
    pub async fn ready(&self) -> bool {
        let mut ready = self.ready.clone();
        ready.wait_for(|primed| *primed).await.is_ok()
    }

    /// Ask the background task to stop.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the background task and wait for it to exit.
    pub async fn join(mut self) {
        self.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Phases of the watch loop.
enum State {
    Idle,
    Watching(NodeEvents),
    Diffing,
    Signaling,
    Backoff,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Watching(_) => "watching",
            State::Diffing => "diffing",
            State::Signaling => "signaling",
            State::Backoff => "backoff",
        }
    }
}

struct WatchLoop<S> {
    source: S,
    config: WatcherConfig,
    snapshot: Arc<ArcSwap<ClusterSnapshot>>,
    changes: mpsc::Sender<()>,
    ready: watch::Sender<bool>,
    shutdown: watch::Receiver<bool>,
    /// Whether a first snapshot has been committed.
    primed: bool,
}

impl<S: NodeSource> WatchLoop<S> {
    async fn run(mut self) {
        info!(
            max_wait = ?self.config.max_wait,
            retry_backoff = ?self.config.retry_backoff,
            "cluster watcher started"
        );

        // The initial list happens before any watch is opened.
        let mut state = State::Diffing;

        while !*self.shutdown.borrow() {
            trace!(state = state.name(), "watcher step");
            state = match self.step(state).await {
                Some(next) => next,
                None => break,
            };
        }

        info!("cluster watcher stopped");
    }

    /// Run one phase. `None` means shutdown was requested.
    async fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::Idle => {
                let opened = tokio::select! {
                    _ = shutdown_requested(&mut self.shutdown) => return None,
                    opened = self.source.watch() => opened,
                };

                match opened {
                    Ok(events) => Some(State::Watching(events)),
                    Err(e) => {
                        warn!(error = %e, "node watch unavailable, falling back to re-list");
                        Some(State::Backoff)
                    }
                }
            }

            State::Watching(mut events) => {
                tokio::select! {
                    _ = shutdown_requested(&mut self.shutdown) => return None,
                    _ = tokio::time::sleep(self.config.max_wait) => {
                        debug!("no node events within max wait, forcing re-list");
                    }
                    event = events.next() => match event {
                        Some(Ok(())) => trace!("node event received"),
                        Some(Err(e)) => {
                            warn!(error = %e, "node watch stream failed");
                            return Some(State::Backoff);
                        }
                        None => debug!("node watch stream closed by source"),
                    },
                }
                // The stream is dropped here whichever branch fired.
                Some(State::Diffing)
            }

            State::Diffing => {
                let listed = tokio::select! {
                    _ = shutdown_requested(&mut self.shutdown) => return None,
                    listed = self.source.list() => listed,
                };

                match listed {
                    Ok(nodes) => {
                        let next = ClusterSnapshot::from_nodes(nodes);
                        if self.commit(next) {
                            Some(State::Signaling)
                        } else {
                            Some(State::Idle)
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to list nodes");
                        Some(State::Backoff)
                    }
                }
            }

            State::Signaling => {
                match signal(&self.changes) {
                    Signal::Sent => debug!("change signal queued"),
                    Signal::Coalesced => debug!("change signal already pending, coalesced"),
                    Signal::Closed => trace!("change receiver dropped"),
                }
                Some(State::Idle)
            }

            State::Backoff => {
                tokio::select! {
                    _ = shutdown_requested(&mut self.shutdown) => return None,
                    _ = tokio::time::sleep(self.config.retry_backoff) => {}
                }
                // Whatever failed, the source may have changed meanwhile.
                Some(State::Diffing)
            }
        }
    }

    /// Replace the cached snapshot if `next` differs materially.
    ///
    /// The very first successful list is always committed, even when the
    /// cluster is empty, so that readiness is established.
    fn commit(&mut self, next: ClusterSnapshot) -> bool {
        let current = self.snapshot.load();

        if self.primed && !snapshot_changed(&current, &next) {
            trace!(nodes = next.len(), "node list unchanged");
            return false;
        }

        let diff = diff_snapshots(&current, &next);
        info!(
            nodes = next.len(),
            added = ?diff.added,
            removed = ?diff.removed,
            readdressed = ?diff.readdressed,
            "cluster snapshot updated"
        );

        drop(current);
        self.snapshot.store(Arc::new(next));

        if !self.primed {
            self.primed = true;
            self.ready.send_replace(true);
        }

        true
    }
}

/// Resolves once shutdown is requested or the watcher handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
