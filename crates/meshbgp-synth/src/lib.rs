//! meshbgp-synth — turns a cluster snapshot and static policy into the
//! BGP daemon's configuration for one node.
//!
//! # Components
//!
//! - **`resolve`** — router-ID and peering-address selection
//! - **`document`** — typed configuration sections and serialization
//! - **`synth`** — mesh and reflector assembly
//!
//! Synthesis is pure: equal inputs always render byte-identical output.

pub mod document;
pub mod error;
pub mod resolve;
pub mod synth;

pub use document::{BgpConfig, Neighbor, NeighborKind};
pub use error::{SynthesisError, SynthesisResult};
pub use resolve::{RouterIdSource, peer_address, resolve_router_id};
pub use synth::{RenderedConfig, build_config, synthesize};
