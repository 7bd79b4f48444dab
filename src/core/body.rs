use serde::{Deserialize, Serialize};

use super::types::{Transform2, Velocity2};
use crate::utils::allocator::Id;

/// A body's simulation role. Static and kinematic bodies never
/// move between solver sets; only dynamic bodies participate in islands,
/// sleeping, and the constraint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

/// Per-axis velocity locks applied during the solver's prepare step: a
/// locked component is zeroed after gravity/damping are applied, each
/// substep, so the body can never gain velocity along that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MotionLocks {
    pub x: bool,
    pub y: bool,
    pub angular_z: bool,
}

/// Per-body behavior toggles, checked by the step orchestrator before doing
/// per-body work. Kept as plain bools since the set is small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyFlags {
    pub enable_sleep: bool,
    pub fixed_rotation: bool,
    pub is_bullet: bool,
    pub allow_fast_rotation: bool,
    pub motion_locks: MotionLocks,
}

impl Default for BodyFlags {
    fn default() -> Self {
        Self {
            enable_sleep: true,
            fixed_rotation: false,
            is_bullet: false,
            allow_fast_rotation: false,
            motion_locks: MotionLocks::default(),
        }
    }
}

/// The logical, stable record for a body: everything that survives a move
/// between solver sets. The body's numeric simulation state (velocity,
/// inverse mass, ...) lives in a [`crate::dynamics::solver_set::BodySim`]/
/// [`crate::dynamics::solver_set::BodyState`] pair addressed by
/// `(set_index, local_index)`, not inline here.
#[derive(Debug, Clone)]
pub struct Body {
    pub id: Id,
    pub body_type: BodyType,
    pub transform: Transform2,
    pub velocity: Velocity2,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub flags: BodyFlags,

    /// Which solver set currently owns this body's sim/state rows.
    pub set_index: u32,
    /// Row index into that set's `body_sims`/`body_states`.
    pub local_index: u32,

    pub island_id: Option<Id>,
    pub sleep_time: f32,

    /// Head of this body's intrusive shape list, threaded through
    /// `Shape::head_contact_key`'s sibling pointer stored alongside the
    /// shape in its arena.
    pub head_shape_id: Option<Id>,
    /// Head of this body's intrusive contact-edge list: `(contact_id,
    /// is_body_a)` so the contact's own per-body "next" pointer can be
    /// found without a side table.
    pub head_contact_key: Option<(Id, bool)>,
    /// Head of this body's intrusive joint-edge list.
    pub head_joint_key: Option<(Id, bool)>,
}

impl Body {
    pub fn new(id: Id, body_type: BodyType, transform: Transform2) -> Self {
        Self {
            id,
            body_type,
            transform,
            velocity: Velocity2::default(),
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            flags: BodyFlags::default(),
            set_index: 0,
            local_index: 0,
            island_id: None,
            sleep_time: 0.0,
            head_shape_id: None,
            head_contact_key: None,
            head_joint_key: None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn builder(body_type: BodyType) -> BodyBuilder {
        BodyBuilder::new(body_type)
    }
}

/// Fluent builder for [`Body`].
pub struct BodyBuilder {
    body_type: BodyType,
    transform: Transform2,
    velocity: Velocity2,
    gravity_scale: f32,
    linear_damping: f32,
    angular_damping: f32,
    flags: BodyFlags,
}



impl BodyBuilder {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            transform: Transform2::default(),
            velocity: Velocity2::default(),
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            flags: BodyFlags::default(),
        }
    }

    pub fn position(mut self, position: glam::Vec2) -> Self {
        self.transform.position = position;
        self
    }

    pub fn rotation(mut self, rotation: crate::utils::math::Rot) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn linear_velocity(mut self, v: glam::Vec2) -> Self {
        self.velocity.linear = v;
        self
    }

    pub fn angular_velocity(mut self, w: f32) -> Self {
        self.velocity.angular = w;
        self
    }

    pub fn gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.flags.fixed_rotation = fixed;
        self
    }

    pub fn bullet(mut self, is_bullet: bool) -> Self {
        self.flags.is_bullet = is_bullet;
        self
    }

    pub fn enable_sleep(mut self, enable: bool) -> Self {
        self.flags.enable_sleep = enable;
        self
    }

    pub fn motion_locks(mut self, locks: MotionLocks) -> Self {
        self.flags.motion_locks = locks;
        self
    }

    pub fn build(self, id: Id) -> Body {
        let mut body = Body::new(id, self.body_type, self.transform);
        body.velocity = self.velocity;
        body.gravity_scale = self.gravity_scale;
        body.linear_damping = self.linear_damping;
        body.angular_damping = self.angular_damping;
        body.flags = self.flags;
        body
    }
}
