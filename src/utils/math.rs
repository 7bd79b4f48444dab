//! 2D math helpers layered on top of `glam`.

use glam::{Mat2, Vec2};
use serde::{Deserialize, Serialize};

/// A 2D rotation stored as `(cos, sin)`, the representation glam itself uses
/// internally for `Affine2` but does not expose as a standalone type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rot {
    pub c: f32,
    pub s: f32,
}

impl Rot {
    pub const IDENTITY: Rot = Rot { c: 1.0, s: 0.0 };

    pub fn from_angle(angle: f32) -> Self {
        Self {
            c: angle.cos(),
            s: angle.sin(),
        }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    pub fn to_mat2(self) -> Mat2 {
        Mat2::from_cols(Vec2::new(self.c, self.s), Vec2::new(-self.s, self.c))
    }

    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    pub fn inv_apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    pub fn inverse(&self) -> Rot {
        Rot {
            c: self.c,
            s: -self.s,
        }
    }

    pub fn mul(&self, other: Rot) -> Rot {
        Rot {
            c: self.c * other.c - self.s * other.s,
            s: self.s * other.c + self.c * other.s,
        }
    }

    /// Integrates this rotation by `delta_angle * dt`, renormalizing to
    /// guard against drift accumulating over many substeps.
    pub fn integrate(&self, angular_velocity: f32, dt: f32) -> Rot {
        let c = self.c - angular_velocity * dt * self.s;
        let s = self.s + angular_velocity * dt * self.c;
        let mag = (c * c + s * s).sqrt();
        if mag > 1e-9 {
            Rot { c: c / mag, s: s / mag }
        } else {
            *self
        }
    }

    pub fn relative_angle(&self, other: Rot) -> f32 {
        let s = self.c * other.s - self.s * other.c;
        let c = self.c * other.c + self.s * other.s;
        s.atan2(c)
    }
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

pub fn cross_vv(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

pub fn left_perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Softness parameters derived from a spring's Hertz/damping-ratio, used by
/// every constraint block in the substep solver to stabilize bias.
#[derive(Debug, Clone, Copy)]
pub struct Softness {
    pub bias_rate: f32,
    pub mass_scale: f32,
    pub impulse_scale: f32,
}

impl Softness {
    pub const RIGID: Softness = Softness {
        bias_rate: 0.0,
        mass_scale: 1.0,
        impulse_scale: 0.0,
    };

    pub fn new(hertz: f32, damping_ratio: f32, h: f32) -> Self {
        if hertz <= 0.0 {
            return Self::RIGID;
        }
        let omega = 2.0 * std::f32::consts::PI * hertz;
        let a1 = 2.0 * damping_ratio + h * omega;
        let a2 = h * omega * a1;
        let a3 = 1.0 / (1.0 + a2);
        Softness {
            bias_rate: omega / a1,
            mass_scale: a2 * a3,
            impulse_scale: a3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_round_trips_angle() {
        let r = Rot::from_angle(0.73);
        assert_relative_eq!(r.angle(), 0.73, epsilon = 1e-5);
    }

    #[test]
    fn zero_hertz_softness_is_rigid() {
        let s = Softness::new(0.0, 1.0, 1.0 / 60.0);
        assert_eq!(s.mass_scale, 1.0);
        assert_eq!(s.impulse_scale, 0.0);
    }

    #[test]
    fn positive_hertz_softness_is_in_unit_range() {
        let s = Softness::new(30.0, 10.0, 1.0 / 60.0);
        assert!(s.mass_scale > 0.0 && s.mass_scale < 1.0);
        assert!(s.impulse_scale > 0.0 && s.impulse_scale < 1.0);
        assert!(s.bias_rate > 0.0);
    }
}
