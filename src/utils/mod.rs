//! Utility helpers: generational ids, math extensions, logging, profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, Id};
pub use math::*;
