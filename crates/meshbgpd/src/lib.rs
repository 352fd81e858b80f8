//! meshbgpd — the meshbgp daemon.
//!
//! Wires the cluster watcher to the configuration synthesizer: on start
//! and on every change signal it re-reads the snapshot, renders this
//! node's BGP configuration, writes it if it differs from what is on
//! disk, and pokes the BGP daemon to reload.
//!
//! - **`artifact`** — atomic, change-only writes of the rendered config
//! - **`driver`** — the sync loop
//! - **`notify`** — best-effort reload notification

pub mod artifact;
pub mod driver;
pub mod notify;

pub use artifact::ArtifactWriter;
pub use driver::{CycleOutcome, Driver};
pub use notify::{NoopNotifier, Notifier, NotifyError, SighupNotifier};
