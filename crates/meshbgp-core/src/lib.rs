//! meshbgp-core — shared data model for the meshbgp peering controller.
//!
//! - **`types`** — cluster nodes, their addresses, and immutable snapshots
//! - **`policy`** — the static peering policy loaded once at startup
//! - **`error`** — policy loading errors

pub mod error;
pub mod policy;
pub mod types;

pub use error::{PolicyError, PolicyResult};
pub use policy::{Asn, Router, StaticPolicy};
pub use types::*;
