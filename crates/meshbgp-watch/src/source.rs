//! The cluster node source abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use meshbgp_core::Node;

use crate::error::SourceResult;

/// A stream of opaque "something changed" events.
///
/// Items carry no payload; the stream may end at any time.
pub type NodeEvents = BoxStream<'static, SourceResult<()>>;

/// Read access to the cluster's node set.
///
/// Implementations are allowed to be slow and to fail; the watcher
/// retries indefinitely.
#[async_trait]
pub trait NodeSource: Send + Sync + 'static {
    /// List every node currently in the cluster.
    async fn list(&self) -> SourceResult<Vec<Node>>;

    /// Open a watch on node changes.
    async fn watch(&self) -> SourceResult<NodeEvents>;
}

#[async_trait]
impl<S: NodeSource + ?Sized> NodeSource for Arc<S> {
    async fn list(&self) -> SourceResult<Vec<Node>> {
        (**self).list().await
    }

    async fn watch(&self) -> SourceResult<NodeEvents> {
        (**self).watch().await
    }
}
