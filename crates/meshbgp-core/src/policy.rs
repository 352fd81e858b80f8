//! Static peering policy parser.
//!
//! The policy is loaded once at startup and never mutated afterwards.
//! It is read from YAML by default, or TOML when the file name ends in
//! `.toml`:
//!
//! ```yaml
//! asn: "65000"
//! routerID: "192.0.2.1"   # optional
//! routers:
//!   - address: 203.0.113.1
//!     asn: "65010"        # optional, defaults to the top-level asn
//!     peerNodes: [node-d]
//! ```
//!
//! Internal peers are never listed here; they are derived from the
//! cluster snapshot.

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PolicyError, PolicyResult};

// ── ASN ────────────────────────────────────────────────────────────

/// A 32-bit autonomous system number.
///
/// Accepts either a string or an integer in the policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawAsn", into = "u32")]
pub struct Asn(u32);

impl Asn {
    pub fn new(value: u32) -> PolicyResult<Self> {
        if value == 0 {
            return Err(PolicyError::InvalidAsn(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for Asn {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| PolicyError::InvalidAsn(s.to_string()))?;
        Asn::new(value)
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Asn> for u32 {
    fn from(asn: Asn) -> u32 {
        asn.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAsn {
    Number(u64),
    Text(String),
}

impl TryFrom<RawAsn> for Asn {
    type Error = PolicyError;

    fn try_from(raw: RawAsn) -> Result<Self, Self::Error> {
        match raw {
            RawAsn::Number(n) => {
                let value =
                    u32::try_from(n).map_err(|_| PolicyError::InvalidAsn(n.to_string()))?;
                Asn::new(value)
            }
            RawAsn::Text(s) => s.parse(),
        }
    }
}

// ── Policy ─────────────────────────────────────────────────────────

/// An external eBGP router that selected nodes reflect routes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Router {
    pub address: IpAddr,
    /// Falls back to the policy ASN when unset.
    #[serde(default)]
    pub asn: Option<Asn>,
    /// Nodes that act as route reflectors towards this router.
    #[serde(rename = "peerNodes", default)]
    pub peer_node_names: BTreeSet<String>,
}

impl Router {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            asn: None,
            peer_node_names: BTreeSet::new(),
        }
    }

    pub fn with_asn(mut self, asn: Asn) -> Self {
        self.asn = Some(asn);
        self
    }

    pub fn with_peer(mut self, node: impl Into<String>) -> Self {
        self.peer_node_names.insert(node.into());
        self
    }

    /// The router's ASN, or `default` if none was configured.
    pub fn effective_asn(&self, default: Asn) -> Asn {
        self.asn.unwrap_or(default)
    }

    /// Whether `node` reflects routes to this router.
    pub fn peers_with(&self, node: &str) -> bool {
        self.peer_node_names.contains(node)
    }
}

/// Static peering policy for the whole cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPolicy {
    /// ASN of the internal mesh.
    pub asn: Asn,
    /// Router-ID forced for this node, overriding any detected one.
    #[serde(
        rename = "routerID",
        default,
        deserialize_with = "deserialize_router_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub router_id_override: Option<Ipv4Addr>,
    /// External routers, in the order they should be rendered.
    #[serde(default)]
    pub routers: Vec<Router>,
}

impl StaticPolicy {
    pub fn new(asn: Asn) -> Self {
        Self {
            asn,
            router_id_override: None,
            routers: Vec::new(),
        }
    }

    pub fn with_router_id(mut self, router_id: Ipv4Addr) -> Self {
        self.router_id_override = Some(router_id);
        self
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    /// Load the policy from a file, choosing the format by extension.
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    pub fn from_yaml_str(content: &str) -> PolicyResult<Self> {
        serde_yaml::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    pub fn from_toml_str(content: &str) -> PolicyResult<Self> {
        toml::from_str(content).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// Routers that `node` reflects to, in policy order.
    pub fn reflected_routers<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Router> {
        self.routers.iter().filter(move |r| r.peers_with(node))
    }

    /// Whether `node` acts as a route reflector for any router.
    pub fn is_reflector(&self, node: &str) -> bool {
        self.reflected_routers(node).next().is_some()
    }
}

/// An empty `routerID` is treated the same as an absent one.
fn deserialize_router_id<'de, D>(deserializer: D) -> Result<Option<Ipv4Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(PolicyError::InvalidRouterId(s.to_string()))),
    }
}
