use glam::Vec2;

use crate::core::body::MotionLocks;
use crate::core::types::Transform2;
use crate::utils::allocator::Id;
use crate::utils::math::Rot;

/// Which partition of the world a body/contact/joint currently lives in.
/// `Sleeping(n)` indexes one sleeping-island container per asleep island;
/// there can be many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverSetId {
    Static,
    Disabled,
    Awake,
    Sleeping(u32),
}

impl SolverSetId {
    pub fn to_index(self) -> u32 {
        match self {
            SolverSetId::Static => 0,
            SolverSetId::Disabled => 1,
            SolverSetId::Awake => 2,
            SolverSetId::Sleeping(n) => 3 + n,
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            0 => SolverSetId::Static,
            1 => SolverSetId::Disabled,
            2 => SolverSetId::Awake,
            n => SolverSetId::Sleeping(n - 3),
        }
    }
}

/// Dense, cache-friendly per-body simulation row, rebuilt fresh each step
/// for every body whose `set_index` marks it awake (see `World::solve_awake_set`).
#[derive(Debug, Clone)]
pub struct BodySim {
    pub body_id: Id,
    pub transform: Transform2,
    pub center_of_mass: Vec2,
    pub inverse_mass: f32,
    pub inverse_inertia: f32,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub min_extent: f32,
    pub is_bullet: bool,
    pub is_fast: bool,
    pub motion_locks: MotionLocks,
}

impl BodySim {
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0 && self.inverse_inertia == 0.0
    }
}

/// Per-substep integration state, kept separate from [`BodySim`] so the
/// solver's hot velocity-iteration loop touches a smaller, purely-numeric
/// row.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyState {
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    /// Accumulated delta-position/rotation for this step, applied once at
    /// `finalize_positions` time.
    pub delta_position: Vec2,
    pub delta_rotation: Rot,
}

impl BodyState {
    pub fn identity() -> Self {
        Self {
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            delta_position: Vec2::ZERO,
            delta_rotation: Rot::IDENTITY,
        }
    }
}

/// Numeric shadow of a touching [`crate::core::body::Body`]'s contact,
/// consumed directly by the solver. Carries the manifold so the solver
/// doesn't need to re-resolve shapes mid-iteration.
#[derive(Debug, Clone)]
pub struct ContactSim {
    pub contact_id: Id,
    pub shape_a: Id,
    pub shape_b: Id,
    pub body_sim_index_a: u32,
    pub body_sim_index_b: u32,
    pub friction: f32,
    pub restitution: f32,
    pub rolling_resistance: f32,
    pub tangent_speed: f32,
    /// Accumulated rolling-resistance angular impulse, warm-started like the
    /// per-point normal/tangent impulses but kept contact-wide rather than
    /// per-point since rolling resistance opposes relative spin, not a
    /// specific contact point's sliding.
    pub rolling_impulse: f32,
    pub manifold: crate::collision::manifold::Manifold,
}

/// Numeric shadow of a [`crate::core::joint::Joint`], consumed directly by
/// the solver.
#[derive(Debug, Clone)]
pub struct JointSim {
    pub joint_id: Id,
    pub body_sim_index_a: u32,
    pub body_sim_index_b: u32,
    pub joint_type: crate::core::joint::JointType,
    pub frame_a: Transform2,
    pub frame_b: Transform2,
    pub impulse: JointImpulse,
}

/// Accumulated impulses carried across substeps for warm-starting, shaped
/// generically enough to cover every joint type's constraint block.
#[derive(Debug, Clone, Copy, Default)]
pub struct JointImpulse {
    pub linear: Vec2,
    pub angular: f32,
    pub motor: f32,
    pub lower: f32,
    pub upper: f32,
    pub spring: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_id_round_trips_through_index() {
        assert_eq!(SolverSetId::from_index(SolverSetId::Sleeping(4).to_index()), SolverSetId::Sleeping(4));
        assert_eq!(SolverSetId::from_index(SolverSetId::Awake.to_index()), SolverSetId::Awake);
    }
}
