//! rb2d_core: a deterministic, incremental 2D rigid-body simulation core.
//!
//! A [`World`] owns every body, shape, contact, and joint and advances them
//! one fixed timestep at a time via [`World::step`]. Internally a step runs
//! broad-phase pair finding, narrow-phase manifold generation, union-find
//! island assembly, constraint graph coloring, a substepped solver,
//! continuous collision, and sleep management, emitting begin/end/hit
//! events the caller drains between steps.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod events;
pub mod utils;
pub mod world;

pub use config::WorldDef;
pub use error::{PhysicsError, PhysicsResult};
pub use events::{
    ContactBeginEvent, ContactEndEvent, ContactHitEvent, EventQueues, SensorBeginEvent,
    SensorEndEvent,
};
pub use utils::allocator::{Arena, Id};
pub use world::{World, WorldBuilder};

pub use collision::{
    Aabb, BroadPhase, Contact, ContactFlags, Manifold, ManifoldPoint, RaycastHit, RaycastQuery,
    ToiState, TouchingTransition,
};
pub use core::{
    Body, BodyFlags, BodyType, Filter, Joint, JointType, MassData, Material,
    MaterialPairProperties, Shape, ShapeType, Transform2, Velocity2,
};
pub use dynamics::{ConstraintGraph, Island, IslandBuilder, SleepManager};
