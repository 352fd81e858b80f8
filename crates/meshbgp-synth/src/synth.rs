//! Configuration synthesis for a single node.
//!
//! Every other node in the snapshot becomes an iBGP neighbor, in name
//! order. If the local node is listed as a peer of an external router it
//! is a route reflector for that router and gets an extra eBGP neighbor,
//! in policy order, after the mesh.

use tracing::{debug, warn};

use meshbgp_core::{ClusterSnapshot, StaticPolicy};

use crate::document::BgpConfig;
use crate::error::SynthesisResult;
use crate::resolve::{peer_address, resolve_router_id};

/// A rendered configuration artifact together with its structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    document: BgpConfig,
    text: String,
}

impl RenderedConfig {
    pub fn document(&self) -> &BgpConfig {
        &self.document
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// Build the configuration document for `local_node`.
pub fn build_config(
    local_node: &str,
    snapshot: &ClusterSnapshot,
    policy: &StaticPolicy,
) -> SynthesisResult<BgpConfig> {
    let (router_id, source) = resolve_router_id(local_node, snapshot.get(local_node), policy)?;
    debug!(node = %local_node, %router_id, ?source, "router-ID resolved");

    let mut config = BgpConfig::new(router_id, policy.asn);

    for peer in snapshot.nodes().filter(|n| n.name != local_node) {
        match peer_address(peer) {
            Some(address) => config.push_internal(&peer.name, address, policy.asn),
            None => warn!(peer = %peer.name, "skipping mesh peer without a usable address"),
        }
    }

    for router in policy.reflected_routers(local_node) {
        config.push_reflected(router.address, router.effective_asn(policy.asn));
    }

    Ok(config)
}

/// Synthesize and render the configuration for `local_node`.
pub fn synthesize(
    local_node: &str,
    snapshot: &ClusterSnapshot,
    policy: &StaticPolicy,
) -> SynthesisResult<RenderedConfig> {
    let document = build_config(local_node, snapshot, policy)?;
    let text = document.to_toml_string()?;
    Ok(RenderedConfig { document, text })
}
