//! Router-ID and peering-address resolution.

use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;

use meshbgp_core::{Node, NodeAddress, StaticPolicy};

use crate::error::{SynthesisError, SynthesisResult};

/// Where a resolved router-ID came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterIdSource {
    PolicyOverride,
    Annotation,
    Detected,
}

/// Resolve the router-ID for `node_name`.
///
/// Precedence: policy override, then the node's router-ID annotation,
/// then the node's first IPv4 address (internal before external). A node
/// missing from the snapshot can only get one from the override.
pub fn resolve_router_id(
    node_name: &str,
    node: Option<&Node>,
    policy: &StaticPolicy,
) -> SynthesisResult<(Ipv4Addr, RouterIdSource)> {
    if let Some(id) = policy.router_id_override {
        return Ok((id, RouterIdSource::PolicyOverride));
    }

    let missing = || SynthesisError::MissingRouterId {
        node: node_name.to_string(),
    };
    let node = node.ok_or_else(missing)?;

    if let Some(raw) = node.router_id_annotation() {
        match raw.parse::<Ipv4Addr>() {
            Ok(id) => return Ok((id, RouterIdSource::Annotation)),
            Err(_) => warn!(
                node = %node_name,
                value = %raw,
                "ignoring router-ID annotation that is not an IPv4 address"
            ),
        }
    }

    node.ipv4_addresses()
        .next()
        .map(|id| (id, RouterIdSource::Detected))
        .ok_or_else(missing)
}

/// The address other nodes should peer with, IPv4 preferred.
///
/// Returns `None` when the node reports no usable IP at all.
pub fn peer_address(node: &Node) -> Option<IpAddr> {
    node.ipv4_addresses().next().map(IpAddr::V4).or_else(|| {
        node.addresses
            .iter()
            .filter(|a| a.kind.is_ipv6())
            .find_map(NodeAddress::ip)
    })
}
