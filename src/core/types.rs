use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::utils::math::Rot;

/// Position and orientation of a body or shape in world space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform2 {
    pub position: Vec2,
    pub rotation: Rot,
}

impl Default for Transform2 {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: Rot::IDENTITY,
        }
    }
}

impl Transform2 {
    pub fn new(position: Vec2, rotation: Rot) -> Self {
        Self { position, rotation }
    }

    /// Transforms a point from local space into the space this transform is
    /// relative to.
    pub fn apply(&self, local_point: Vec2) -> Vec2 {
        self.position + self.rotation.apply(local_point)
    }

    pub fn inv_apply(&self, world_point: Vec2) -> Vec2 {
        self.rotation.inv_apply(world_point - self.position)
    }

    /// Composes `self * other`, i.e. `other` expressed in `self`'s frame.
    pub fn combine(&self, other: &Transform2) -> Transform2 {
        Transform2 {
            position: self.apply(other.position),
            rotation: self.rotation.mul(other.rotation),
        }
    }

    pub fn inverse(&self) -> Transform2 {
        let inv_rot = self.rotation.inverse();
        Transform2 {
            position: inv_rot.apply(-self.position),
            rotation: inv_rot,
        }
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Velocity2 {
    pub linear: Vec2,
    pub angular: f32,
}

/// Mass, center of mass (local to the body origin) and rotational inertia
/// about the center of mass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    pub rotational_inertia: f32,
}

impl Default for MassData {
    fn default() -> Self {
        Self {
            mass: 0.0,
            center: Vec2::ZERO,
            rotational_inertia: 0.0,
        }
    }
}

impl MassData {
    pub fn for_solid_box(half_extents: Vec2, mass: f32) -> f32 {
        (mass / 12.0) * (4.0 * half_extents.x * half_extents.x + 4.0 * half_extents.y * half_extents.y)
    }

    pub fn for_solid_circle(radius: f32, mass: f32) -> f32 {
        0.5 * mass * radius * radius
    }
}

/// Per-shape surface coefficients (density/friction/restitution), combined
/// pairwise between two touching shapes via [`MixingMode`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Angular impulse applied to damp rolling, bounded by
    /// `rolling_resistance * accumulated_normal_impulse` in the tangent
    /// constraint block.
    pub rolling_resistance: f32,
    /// Surface speed added to the tangent constraint's target velocity
    /// (e.g. a conveyor belt); combined additively across a contact's pair
    /// the way `tangent_speed` is refreshed each narrow-phase update.
    pub tangent_speed: f32,
    /// Opaque id a host application can stash on a material to look up its
    /// own per-surface data from a hit/contact event; unused internally.
    pub user_material_id: u32,
    pub mixing: MaterialMixing,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.6,
            restitution: 0.0,
            rolling_resistance: 0.0,
            tangent_speed: 0.0,
            user_material_id: 0,
            mixing: MaterialMixing::default(),
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            density: 1.4,
            friction: 1.0,
            restitution: 0.8,
            ..Material::default()
        }
    }

    pub fn steel() -> Self {
        Self {
            density: 7.8,
            friction: 0.5,
            restitution: 0.3,
            ..Material::default()
        }
    }

    pub fn ice() -> Self {
        Self {
            density: 0.9,
            friction: 0.05,
            restitution: 0.05,
            ..Material::default()
        }
    }

    pub fn combine_pair(a: &Self, b: &Self) -> MaterialPairProperties {
        let friction_mode = a.mixing.friction.resolve(b.mixing.friction);
        let restitution_mode = a.mixing.restitution.resolve(b.mixing.restitution);
        MaterialPairProperties {
            friction: friction_mode.combine(a.friction, b.friction),
            restitution: restitution_mode.combine(a.restitution, b.restitution),
            rolling_resistance: 0.5 * (a.rolling_resistance + b.rolling_resistance),
            tangent_speed: a.tangent_speed + b.tangent_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaterialMixing {
    pub friction: MixingMode,
    pub restitution: MixingMode,
}

impl Default for MaterialMixing {
    fn default() -> Self {
        Self {
            friction: MixingMode::GeometricMean,
            restitution: MixingMode::Max,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum MixingMode {
    #[default]
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.abs() * b.abs()).sqrt(),
        }
    }

    fn resolve(self, other: MixingMode) -> MixingMode {
        if matches!(self, MixingMode::Average) {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialPairProperties {
    pub friction: f32,
    pub restitution: f32,
    pub rolling_resistance: f32,
    pub tangent_speed: f32,
}

impl Default for MaterialPairProperties {
    fn default() -> Self {
        Material::combine_pair(&Material::default(), &Material::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixing_modes_combine_expected_values() {
        assert!((MixingMode::Average.combine(0.6, 0.2) - 0.4).abs() < 1e-5);
        assert!((MixingMode::Min.combine(0.6, 0.2) - 0.2).abs() < 1e-5);
        assert!((MixingMode::Max.combine(0.6, 0.2) - 0.6).abs() < 1e-5);
        let expected = (0.6_f32 * 0.2_f32).sqrt();
        assert!((MixingMode::GeometricMean.combine(0.6, 0.2) - expected).abs() < 1e-5);
    }

    #[test]
    fn material_pair_uses_geometric_mean_friction_by_default() {
        let a = Material {
            friction: 0.8,
            ..Material::default()
        };
        let b = Material {
            friction: 0.2,
            ..Material::default()
        };
        let pair = Material::combine_pair(&a, &b);
        assert!((pair.friction - (0.16_f32).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn transform_apply_then_inverse_round_trips() {
        let t = Transform2::new(Vec2::new(3.0, -2.0), Rot::from_angle(0.4));
        let p = Vec2::new(1.0, 2.0);
        let world = t.apply(p);
        let back = t.inv_apply(world);
        assert!((back - p).length() < 1e-4);
    }
}
