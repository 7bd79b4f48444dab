//! World stepping pipeline's dynamics half: solver-set storage, the
//! union-find island builder, constraint graph coloring, the substep
//! solver, and sleep management.

pub mod graph;
pub mod island;
pub mod sleep;
pub mod solver;
pub mod solver_set;

pub use graph::{ConstraintGraph, NUM_COLORS, OVERFLOW_COLOR};
pub use island::{Island, IslandBuilder, SPLIT_THRESHOLD};
pub use sleep::SleepManager;
pub use solver::{solve_step, ContactHit};
pub use solver_set::{BodySim, BodyState, ContactSim, JointImpulse, JointSim, SolverSetId};
