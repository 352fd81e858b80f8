//! Domain types for cluster membership.
//!
//! A [`ClusterSnapshot`] is an immutable, name-keyed view of the cluster's
//! nodes at one point in time. Snapshots are replaced wholesale when the
//! cluster changes, never edited in place.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Unique name of a node in the cluster.
pub type NodeName = String;

/// Annotation carrying an explicit per-node BGP router-ID.
pub const ROUTER_ID_ANNOTATION: &str = "meshbgp.io/router-id";

// ── Addresses ──────────────────────────────────────────────────────

/// Kind of address reported for a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    InternalIpv4,
    InternalIpv6,
    ExternalIpv4,
    ExternalIpv6,
    Hostname,
    InternalDns,
    ExternalDns,
    /// Any address type the control plane reports that we don't model.
    Other(String),
}

impl AddressKind {
    /// Whether this kind carries an IPv4 address.
    pub fn is_ipv4(&self) -> bool {
        matches!(self, AddressKind::InternalIpv4 | AddressKind::ExternalIpv4)
    }

    /// Whether this kind carries an IPv6 address.
    pub fn is_ipv6(&self) -> bool {
        matches!(self, AddressKind::InternalIpv6 | AddressKind::ExternalIpv6)
    }
}

/// A single address of a node.
///
/// Ordering is by kind first, then value, so a node's address set
/// iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    pub kind: AddressKind,
    pub value: String,
}

impl NodeAddress {
    pub fn new(kind: AddressKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Classify an IP reported as internal by its family.
    ///
    /// Returns `None` if the value does not parse as an IP address.
    pub fn internal_ip(value: &str) -> Option<Self> {
        match value.parse::<IpAddr>().ok()? {
            IpAddr::V4(_) => Some(Self::new(AddressKind::InternalIpv4, value)),
            IpAddr::V6(_) => Some(Self::new(AddressKind::InternalIpv6, value)),
        }
    }

    /// Classify an IP reported as external by its family.
    pub fn external_ip(value: &str) -> Option<Self> {
        match value.parse::<IpAddr>().ok()? {
            IpAddr::V4(_) => Some(Self::new(AddressKind::ExternalIpv4, value)),
            IpAddr::V6(_) => Some(Self::new(AddressKind::ExternalIpv6, value)),
        }
    }

    /// The address as an IPv4 address, if it is one.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if !self.kind.is_ipv4() {
            return None;
        }
        self.value.parse().ok()
    }

    /// The address as an IP address of either family, if it is one.
    pub fn ip(&self) -> Option<IpAddr> {
        if !self.kind.is_ipv4() && !self.kind.is_ipv6() {
            return None;
        }
        self.value.parse().ok()
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// A cluster node as observed from the control plane.
///
/// Addresses are held as a set: two observations with the same
/// addresses in a different order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: NodeName,
    pub addresses: BTreeSet<NodeAddress>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Node {
    pub fn new(name: impl Into<NodeName>) -> Self {
        Self {
            name: name.into(),
            addresses: BTreeSet::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_address(mut self, kind: AddressKind, value: impl Into<String>) -> Self {
        self.addresses.insert(NodeAddress::new(kind, value));
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// The explicit router-ID annotation, if set and non-empty.
    pub fn router_id_annotation(&self) -> Option<&str> {
        self.annotations
            .get(ROUTER_ID_ANNOTATION)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Addresses with an IPv4 value, internal before external.
    pub fn ipv4_addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.addresses.iter().filter_map(NodeAddress::ipv4)
    }
}

// ── Snapshot ───────────────────────────────────────────────────────

/// An immutable point-in-time view of cluster membership.
///
/// Keyed by node name, so names are unique by construction and
/// iteration is always in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSnapshot {
    nodes: BTreeMap<NodeName, Node>,
}

impl ClusterSnapshot {
    /// Build a snapshot from listed nodes.
    ///
    /// If the same name appears twice the later observation wins.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<Node> for ClusterSnapshot {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::from_nodes(iter)
    }
}
