//! Collision detection: broad-phase pair finding, narrow-phase manifold
//! generation, the contact lifecycle, spatial queries, and continuous
//! collision detection.

pub mod broadphase;
pub mod ccd;
pub mod contact;
pub mod manifold;
pub mod queries;

pub use broadphase::{Aabb, BroadPhase};
pub use ccd::{compute_toi, is_fast_body, Sweep, ToiState};
pub use contact::{Contact, ContactFlags, TouchingTransition};
pub use manifold::{collide, Manifold, ManifoldPoint};
pub use queries::{
    overlap_aabb, overlap_shape, raycast, raycast_closest, shape_cast, RaycastHit, RaycastQuery,
};
