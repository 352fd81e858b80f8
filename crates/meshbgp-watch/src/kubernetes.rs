//! Kubernetes-backed node source.
//!
//! Lists `Node` objects and converts their status addresses into the core
//! model. Watches resume from the resource version of the latest list, so
//! an idle cluster does not replay every node as a synthetic event.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node as KubeNode, NodeAddress as KubeNodeAddress};
use kube::Client;
use kube::api::{Api, ListParams, WatchEvent, WatchParams};
use tracing::debug;

use meshbgp_core::{AddressKind, Node, NodeAddress};

use crate::error::{SourceError, SourceResult};
use crate::source::{NodeEvents, NodeSource};

/// Node source reading from the Kubernetes API server.
pub struct KubeNodeSource {
    api: Api<KubeNode>,
    /// Resource version of the latest successful list.
    resource_version: ArcSwapOption<String>,
}

impl KubeNodeSource {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
            resource_version: ArcSwapOption::empty(),
        }
    }

    /// Build a source from the in-cluster service account, or the local
    /// kubeconfig when running outside a cluster.
    pub async fn try_default() -> Result<Self, kube::Error> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl NodeSource for KubeNodeSource {
    async fn list(&self) -> SourceResult<Vec<Node>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::List(e.to_string()))?;

        self.resource_version
            .store(list.metadata.resource_version.clone().map(Arc::new));

        Ok(list.items.iter().filter_map(convert_node).collect())
    }

    async fn watch(&self) -> SourceResult<NodeEvents> {
        let version = self
            .resource_version
            .load_full()
            .map(|v| v.as_str().to_string())
            .unwrap_or_else(|| "0".to_string());

        debug!(resource_version = %version, "opening node watch");

        let stream = self
            .api
            .watch(&WatchParams::default(), &version)
            .await
            .map_err(|e| SourceError::Watch(e.to_string()))?;

        let events = stream.filter_map(|event| futures::future::ready(map_event(event)));
        Ok(events.boxed())
    }
}

/// Reduce a raw watch item to a wake-up.
///
/// Bookmarks only advance the resource version and are not changes. An
/// `ERROR` item (typically 410 Gone after compaction) ends the useful
/// life of the stream, so it is surfaced as a stream error.
fn map_event(event: Result<WatchEvent<KubeNode>, kube::Error>) -> Option<SourceResult<()>> {
    match event {
        Ok(WatchEvent::Bookmark(_)) => None,
        Ok(WatchEvent::Error(status)) => Some(Err(SourceError::Stream(format!(
            "{} {}: {}",
            status.code, status.reason, status.message
        )))),
        Ok(WatchEvent::Added(_) | WatchEvent::Modified(_) | WatchEvent::Deleted(_)) => Some(Ok(())),
        Err(e) => Some(Err(SourceError::Stream(e.to_string()))),
    }
}

/// Convert an API node into the core model. Nameless objects are skipped.
fn convert_node(node: &KubeNode) -> Option<Node> {
    let name = node.metadata.name.clone()?;

    let addresses = node
        .status
        .as_ref()
        .and_then(|status| status.addresses.as_ref())
        .into_iter()
        .flatten()
        .filter_map(convert_address)
        .collect();

    Some(Node {
        name,
        addresses,
        annotations: node.metadata.annotations.clone().unwrap_or_default(),
    })
}

fn convert_address(address: &KubeNodeAddress) -> Option<NodeAddress> {
    let value = address.address.trim();
    if value.is_empty() {
        return None;
    }

    match address.type_.as_str() {
        "InternalIP" => NodeAddress::internal_ip(value),
        "ExternalIP" => NodeAddress::external_ip(value),
        "Hostname" => Some(NodeAddress::new(AddressKind::Hostname, value)),
        "InternalDNS" => Some(NodeAddress::new(AddressKind::InternalDns, value)),
        "ExternalDNS" => Some(NodeAddress::new(AddressKind::ExternalDns, value)),
        other => Some(NodeAddress::new(AddressKind::Other(other.to_string()), value)),
    }
}
