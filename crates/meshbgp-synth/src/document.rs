//! Typed BGP daemon configuration document.
//!
//! The document is assembled as plain structs and serialized with `toml`
//! into the GoBGP configuration layout. Field order in the output follows
//! declaration order and neighbors keep the order they were pushed in, so
//! rendering never depends on hash iteration.

use std::net::{IpAddr, Ipv4Addr};

use serde::Serialize;

use meshbgp_core::Asn;

use crate::error::{SynthesisError, SynthesisResult};

/// Whole configuration for one BGP speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpConfig {
    pub global: Global,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<Neighbor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Global {
    pub config: GlobalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalConfig {
    #[serde(rename = "as")]
    pub asn: u32,
    pub router_id: String,
}

/// Why a neighbor is in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborKind {
    /// Another cluster node in the iBGP full mesh.
    Internal,
    /// An external router this node reflects mesh routes to.
    ExternalReflected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    #[serde(skip)]
    pub kind: NeighborKind,
    pub config: NeighborConfig,
    #[serde(rename = "route-reflector", skip_serializing_if = "Option::is_none")]
    pub route_reflector: Option<RouteReflector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NeighborConfig {
    pub neighbor_address: String,
    pub peer_as: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteReflector {
    pub config: RouteReflectorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteReflectorConfig {
    pub route_reflector_client: bool,
    pub route_reflector_cluster_id: String,
}

impl BgpConfig {
    pub fn new(router_id: Ipv4Addr, asn: Asn) -> Self {
        Self {
            global: Global {
                config: GlobalConfig {
                    asn: asn.get(),
                    router_id: router_id.to_string(),
                },
            },
            neighbors: Vec::new(),
        }
    }

    /// Add a full-mesh peer.
    pub fn push_internal(&mut self, node_name: &str, address: IpAddr, asn: Asn) {
        self.neighbors.push(Neighbor {
            kind: NeighborKind::Internal,
            config: NeighborConfig {
                neighbor_address: address.to_string(),
                peer_as: asn.get(),
                description: format!("ibgp:{node_name}"),
            },
            route_reflector: None,
        });
    }

    /// Add an external router that receives reflected mesh routes.
    pub fn push_reflected(&mut self, address: IpAddr, asn: Asn) {
        let cluster_id = self.global.config.router_id.clone();
        self.neighbors.push(Neighbor {
            kind: NeighborKind::ExternalReflected,
            config: NeighborConfig {
                neighbor_address: address.to_string(),
                peer_as: asn.get(),
                description: "ebgp-reflector".to_string(),
            },
            route_reflector: Some(RouteReflector {
                config: RouteReflectorConfig {
                    route_reflector_client: true,
                    route_reflector_cluster_id: cluster_id,
                },
            }),
        });
    }

    pub fn router_id(&self) -> &str {
        &self.global.config.router_id
    }

    pub fn internal_neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors_of(NeighborKind::Internal)
    }

    pub fn external_neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors_of(NeighborKind::ExternalReflected)
    }

    fn neighbors_of(&self, kind: NeighborKind) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter().filter(move |n| n.kind == kind)
    }

    /// Serialize to configuration text.
    pub fn to_toml_string(&self) -> SynthesisResult<String> {
        toml::to_string(self).map_err(|e| SynthesisError::Render(e.to_string()))
    }
}
