use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::types::Transform2;
use crate::dynamics::solver_set::JointImpulse;
use crate::utils::allocator::Id;

/// Per-type joint parameters, attached to a common `Joint` anchor pair
/// (`frame_a`/`frame_b`, each a local `Transform2` on its body). Each variant
/// carries the parameter block `dynamics/solver.rs::resolve_velocity_joint`
/// pattern-matches on to resolve that joint type's velocity constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JointType {
    /// Holds a fixed distance between the two anchor points, optionally
    /// springy.
    Distance {
        length: f32,
        min_length: f32,
        max_length: f32,
        enable_spring: bool,
        hertz: f32,
        damping_ratio: f32,
    },
    /// Drags `frame_a`'s anchor toward a moving world-space target point
    /// (mouse/cursor dragging).
    Mouse {
        target: Vec2,
        hertz: f32,
        damping_ratio: f32,
        max_force: f32,
    },
    /// Point-to-point pivot with an optional motor and angle limits.
    Revolute {
        enable_motor: bool,
        motor_speed: f32,
        max_motor_torque: f32,
        enable_limit: bool,
        lower_angle: f32,
        upper_angle: f32,
    },
    /// Point-to-point plus perpendicular lock along a translation axis, with
    /// optional motor and translation limits.
    Prismatic {
        local_axis_a: Vec2,
        enable_motor: bool,
        motor_speed: f32,
        max_motor_force: f32,
        enable_limit: bool,
        lower_translation: f32,
        upper_translation: f32,
    },
    /// Rigidly locks both relative position and orientation, softened by
    /// the linear/angular hertz pair.
    Weld {
        linear_hertz: f32,
        linear_damping_ratio: f32,
        angular_hertz: f32,
        angular_damping_ratio: f32,
    },
    /// Prismatic-style suspension axis plus a rotational spring, modeling a
    /// vehicle wheel.
    Wheel {
        local_axis_a: Vec2,
        enable_spring: bool,
        hertz: f32,
        damping_ratio: f32,
        enable_motor: bool,
        motor_speed: f32,
        max_motor_torque: f32,
    },
}

/// Logical joint record (bookkeeping). Numeric solver state lives in a
/// [`crate::dynamics::solver_set::JointSim`] row addressed by
/// `(set_index, local_index)`, same split as [`crate::core::body::Body`].
#[derive(Debug, Clone)]
pub struct Joint {
    pub id: Id,
    pub body_a: Id,
    pub body_b: Id,
    pub frame_a: Transform2,
    pub frame_b: Transform2,
    pub joint_type: JointType,
    pub collide_connected: bool,

    pub set_index: u32,
    pub local_index: u32,

    /// This joint's node in `body_a`'s intrusive joint-edge list.
    pub edge_a_next: Option<(Id, bool)>,
    /// This joint's node in `body_b`'s intrusive joint-edge list.
    pub edge_b_next: Option<(Id, bool)>,

    /// Warm-start cache carried across steps, the joint-side equivalent of
    /// a contact's persisted manifold point impulses.
    pub impulse: JointImpulse,
}

impl Joint {
    pub fn new(
        id: Id,
        body_a: Id,
        body_b: Id,
        frame_a: Transform2,
        frame_b: Transform2,
        joint_type: JointType,
    ) -> Self {
        Self {
            id,
            body_a,
            body_b,
            frame_a,
            frame_b,
            joint_type,
            collide_connected: false,
            set_index: 0,
            local_index: 0,
            edge_a_next: None,
            edge_b_next: None,
            impulse: JointImpulse::default(),
        }
    }

    pub fn other_body(&self, this_body: Id) -> Id {
        if this_body == self.body_a {
            self.body_b
        } else {
            self.body_a
        }
    }
}
