//! Global configuration constants and the `WorldDef` builder.

use std::fmt;
use std::sync::Arc;

use glam::Vec2;

use crate::collision::manifold::Manifold;
use crate::core::types::Material;
use crate::utils::allocator::Id;

/// Computes friction or restitution for a touching pair from each shape's
/// material, called once when the contact is created and refreshed on every
/// narrow-phase update in case a material was mutated. Must be pure: these
/// run from worker threads during the parallel narrow-phase pass and must
/// not mutate the world or perform non-idempotent I/O.
pub type MixCallback = Arc<dyn Fn(Id, &Material, Id, &Material) -> f32 + Send + Sync>;

/// Inspects a touching contact's manifold before the solver runs and
/// returns whether the contact should be solved this step; returning
/// `false` suppresses it without destroying the contact. Called from
/// worker threads and must be pure.
pub type PreSolveCallback = Arc<dyn Fn(Id, &Manifold) -> bool + Send + Sync>;

/// Overrides `Filter`-based pair rejection for a specific shape pair;
/// called once when the broad phase first reports the pair. Called from
/// worker threads and must be pure.
pub type CustomFilterCallback = Arc<dyn Fn(Id, Id) -> bool + Send + Sync>;

/// Default gravity vector applied in the world.
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -10.0];

/// Default fixed sub-step size used by the solver when the caller does not
/// override `substep_count`.
pub const DEFAULT_SUBSTEP_COUNT: u32 = 4;

/// Default spring frequency used to stabilize rigid contacts, in Hz.
pub const DEFAULT_CONTACT_HERTZ: f32 = 30.0;
pub const DEFAULT_CONTACT_DAMPING_RATIO: f32 = 10.0;

/// Default spring frequency used to stabilize rigid joints, in Hz.
pub const DEFAULT_JOINT_HERTZ: f32 = 60.0;
pub const DEFAULT_JOINT_DAMPING_RATIO: f32 = 2.0;

/// Relative velocity below which restitution is not applied (m/s).
pub const DEFAULT_RESTITUTION_THRESHOLD: f32 = 1.0;

/// Relative velocity above which a contact reports a `ContactHitEvent`.
pub const DEFAULT_HIT_EVENT_THRESHOLD: f32 = 3.0;

/// Linear slop: the amount of interpenetration the solver tolerates before
/// applying positional bias (4mm).
pub const DEFAULT_LINEAR_SLOP: f32 = 0.004;

/// Speculative contact distance, expressed as a multiple of linear slop.
pub const DEFAULT_SPECULATIVE_DISTANCE_FACTOR: f32 = 4.0;

pub const DEFAULT_MAX_LINEAR_SPEED: f32 = 400.0;
pub const DEFAULT_MAX_ANGULAR_SPEED: f32 = 0.25 * std::f32::consts::PI * 60.0;

/// Seconds a body's motion must stay below the sleep threshold before its
/// island is put to sleep.
pub const DEFAULT_TIME_TO_SLEEP: f32 = 0.5;
pub const DEFAULT_LINEAR_SLEEP_TOLERANCE: f32 = 0.01;
pub const DEFAULT_ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Number of regular constraint-graph colors before contacts/joints overflow
/// into the sequential overflow color.
pub const GRAPH_COLOR_COUNT: usize = 12;

/// World-level tuning parameters and feature toggles, built with a fluent
/// builder (see [`crate::world::WorldBuilder`]).
#[derive(Clone)]
pub struct WorldDef {
    pub gravity: Vec2,
    pub substep_count: u32,
    pub contact_hertz: f32,
    pub contact_damping_ratio: f32,
    pub joint_hertz: f32,
    pub joint_damping_ratio: f32,
    pub restitution_threshold: f32,
    pub hit_event_threshold: f32,
    pub linear_slop: f32,
    pub speculative_distance_factor: f32,
    pub maximum_linear_speed: f32,
    pub maximum_angular_speed: f32,
    pub time_to_sleep: f32,
    pub enable_sleep: bool,
    pub enable_continuous: bool,
    pub enable_speculative: bool,
    pub enable_warm_starting: bool,
    pub step_metrics_logging: bool,

    /// Overrides `Material::combine_pair`'s friction mixing for a contact,
    /// called when the contact is created and refreshed every narrow-phase
    /// update.
    pub friction_callback: Option<MixCallback>,
    /// Overrides `Material::combine_pair`'s restitution mixing, same timing
    /// as `friction_callback`.
    pub restitution_callback: Option<MixCallback>,
    /// Runs once per touching contact per step before the solver; returning
    /// `false` suppresses that contact for the step.
    pub pre_solve_callback: Option<PreSolveCallback>,
    /// Runs once when the broad phase first reports a shape pair, in
    /// addition to `Filter::should_collide`; returning `false` rejects the
    /// pair.
    pub custom_filter_callback: Option<CustomFilterCallback>,
}

impl fmt::Debug for WorldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldDef")
            .field("gravity", &self.gravity)
            .field("substep_count", &self.substep_count)
            .field("contact_hertz", &self.contact_hertz)
            .field("contact_damping_ratio", &self.contact_damping_ratio)
            .field("joint_hertz", &self.joint_hertz)
            .field("joint_damping_ratio", &self.joint_damping_ratio)
            .field("restitution_threshold", &self.restitution_threshold)
            .field("hit_event_threshold", &self.hit_event_threshold)
            .field("linear_slop", &self.linear_slop)
            .field("speculative_distance_factor", &self.speculative_distance_factor)
            .field("maximum_linear_speed", &self.maximum_linear_speed)
            .field("maximum_angular_speed", &self.maximum_angular_speed)
            .field("time_to_sleep", &self.time_to_sleep)
            .field("enable_sleep", &self.enable_sleep)
            .field("enable_continuous", &self.enable_continuous)
            .field("enable_speculative", &self.enable_speculative)
            .field("enable_warm_starting", &self.enable_warm_starting)
            .field("step_metrics_logging", &self.step_metrics_logging)
            .field("friction_callback", &self.friction_callback.is_some())
            .field("restitution_callback", &self.restitution_callback.is_some())
            .field("pre_solve_callback", &self.pre_solve_callback.is_some())
            .field("custom_filter_callback", &self.custom_filter_callback.is_some())
            .finish()
    }
}

impl Default for WorldDef {
    fn default() -> Self {
        Self {
            gravity: Vec2::from(DEFAULT_GRAVITY),
            substep_count: DEFAULT_SUBSTEP_COUNT,
            contact_hertz: DEFAULT_CONTACT_HERTZ,
            contact_damping_ratio: DEFAULT_CONTACT_DAMPING_RATIO,
            joint_hertz: DEFAULT_JOINT_HERTZ,
            joint_damping_ratio: DEFAULT_JOINT_DAMPING_RATIO,
            restitution_threshold: DEFAULT_RESTITUTION_THRESHOLD,
            hit_event_threshold: DEFAULT_HIT_EVENT_THRESHOLD,
            linear_slop: DEFAULT_LINEAR_SLOP,
            speculative_distance_factor: DEFAULT_SPECULATIVE_DISTANCE_FACTOR,
            maximum_linear_speed: DEFAULT_MAX_LINEAR_SPEED,
            maximum_angular_speed: DEFAULT_MAX_ANGULAR_SPEED,
            time_to_sleep: DEFAULT_TIME_TO_SLEEP,
            enable_sleep: true,
            enable_continuous: true,
            enable_speculative: true,
            enable_warm_starting: true,
            step_metrics_logging: false,
            friction_callback: None,
            restitution_callback: None,
            pre_solve_callback: None,
            custom_filter_callback: None,
        }
    }
}

impl WorldDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_substep_count(mut self, count: u32) -> Self {
        self.substep_count = count.max(1);
        self
    }

    pub fn with_sleep_enabled(mut self, enabled: bool) -> Self {
        self.enable_sleep = enabled;
        self
    }

    pub fn with_continuous_enabled(mut self, enabled: bool) -> Self {
        self.enable_continuous = enabled;
        self
    }

    pub fn with_step_metrics_logging(mut self, enabled: bool) -> Self {
        self.step_metrics_logging = enabled;
        self
    }

    pub fn with_friction_callback(mut self, callback: MixCallback) -> Self {
        self.friction_callback = Some(callback);
        self
    }

    pub fn with_restitution_callback(mut self, callback: MixCallback) -> Self {
        self.restitution_callback = Some(callback);
        self
    }

    pub fn with_pre_solve_callback(mut self, callback: PreSolveCallback) -> Self {
        self.pre_solve_callback = Some(callback);
        self
    }

    pub fn with_custom_filter_callback(mut self, callback: CustomFilterCallback) -> Self {
        self.custom_filter_callback = Some(callback);
        self
    }

    pub fn speculative_distance(&self) -> f32 {
        self.linear_slop * self.speculative_distance_factor
    }
}
