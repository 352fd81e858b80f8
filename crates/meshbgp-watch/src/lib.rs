//! meshbgp-watch — keeps an always-available view of cluster nodes.
//!
//! # Architecture
//!
//! ```text
//! NodeSource (list / watch)
//!   └── ClusterWatcher (background task)
//!       ├── Idle      → open a watch stream
//!       ├── Watching  → wait for an event, the max-wait timeout, or shutdown
//!       ├── Diffing   → re-list everything, compare with the cached snapshot
//!       ├── Signaling → swap the snapshot, try_send on a 1-slot channel
//!       └── Backoff   → fixed delay after a failed list or watch
//! ```
//!
//! Watch events are only a wake-up: every wake re-lists the full node set
//! and the snapshot is derived from that list alone.

pub mod diff;
pub mod error;
#[cfg(feature = "kube")]
pub mod kubernetes;
pub mod source;
pub mod watcher;

pub use error::{SourceError, SourceResult};
#[cfg(feature = "kube")]
pub use kubernetes::KubeNodeSource;
pub use source::{NodeEvents, NodeSource};
pub use watcher::{ChangeReceiver, ClusterWatcher, WatcherConfig};
