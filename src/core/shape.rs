use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::types::{Material, Transform2};
use crate::utils::allocator::Id;

/// Geometry supported by the narrow phase: circle, capsule,
/// convex polygon, a standalone segment, or a one-sided chain segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeType {
    Circle { radius: f32 },
    Capsule { p1: Vec2, p2: Vec2, radius: f32 },
    Polygon { vertices: Vec<Vec2>, radius: f32 },
    Segment { p1: Vec2, p2: Vec2 },
    /// A segment that only generates contacts when approached from the
    /// `ghost1`/`ghost2`-bounded side, used to stitch chains of segments
    /// together without spurious internal-edge bumps ("ghost bumps").
    ChainSegment {
        ghost1: Vec2,
        p1: Vec2,
        p2: Vec2,
        ghost2: Vec2,
    },
}

impl ShapeType {
    /// Convex polygon support function in the shape's local frame.
    pub fn support(&self, direction: Vec2) -> Vec2 {
        match self {
            ShapeType::Circle { .. } => Vec2::ZERO,
            ShapeType::Capsule { p1, p2, .. } => {
                if p1.dot(direction) >= p2.dot(direction) {
                    *p1
                } else {
                    *p2
                }
            }
            ShapeType::Polygon { vertices, .. } => *vertices
                .iter()
                .max_by(|a, b| a.dot(direction).total_cmp(&b.dot(direction)))
                .unwrap_or(&Vec2::ZERO),
            ShapeType::Segment { p1, p2 } | ShapeType::ChainSegment { p1, p2, .. } => {
                if p1.dot(direction) >= p2.dot(direction) {
                    *p1
                } else {
                    *p2
                }
            }
        }
    }

    /// Radius of the rounding applied around the core geometry (0 for
    /// sharp-edged polygons and segments).
    pub fn radius(&self) -> f32 {
        match self {
            ShapeType::Circle { radius } => *radius,
            ShapeType::Capsule { radius, .. } => *radius,
            ShapeType::Polygon { radius, .. } => *radius,
            ShapeType::Segment { .. } | ShapeType::ChainSegment { .. } => 0.0,
        }
    }

    /// Tight local-space bounding box, before any speculative margin.
    pub fn local_bounds(&self) -> (Vec2, Vec2) {
        match self {
            ShapeType::Circle { radius } => (Vec2::splat(-radius), Vec2::splat(*radius)),
            ShapeType::Capsule { p1, p2, radius } => (
                p1.min(*p2) - Vec2::splat(*radius),
                p1.max(*p2) + Vec2::splat(*radius),
            ),
            ShapeType::Polygon { vertices, radius } => {
                let mut lo = Vec2::splat(f32::MAX);
                let mut hi = Vec2::splat(f32::MIN);
                for v in vertices {
                    lo = lo.min(*v);
                    hi = hi.max(*v);
                }
                (lo - Vec2::splat(*radius), hi + Vec2::splat(*radius))
            }
            ShapeType::Segment { p1, p2 } => (p1.min(*p2), p1.max(*p2)),
            ShapeType::ChainSegment { p1, p2, .. } => (p1.min(*p2), p1.max(*p2)),
        }
    }
}

/// Collision category/mask/group filtering, evaluated before any narrow
/// phase work runs for a candidate pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Filter {
    pub category_bits: u32,
    pub mask_bits: u32,
    /// Shapes sharing a nonzero group always collide (positive) or never
    /// collide (negative), overriding category/mask.
    pub group_index: i32,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 1,
            mask_bits: u32::MAX,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index != 0 && self.group_index == other.group_index {
            return self.group_index > 0;
        }
        (self.category_bits & other.mask_bits) != 0 && (other.category_bits & self.mask_bits) != 0
    }
}

/// Event-emission toggles checked when a contact touching this shape
/// transitions or reports a hard hit. `sensor_index` is an opaque handle a
/// caller can stash to look up this shape's own sensor bookkeeping
/// (e.g. an external overlap table) without an `Id` round trip; the engine
/// itself never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeFlags {
    pub enable_contact_events: bool,
    pub enable_hit_events: bool,
    pub enable_pre_solve_events: bool,
    pub sensor_index: Option<u32>,
}

impl Default for ShapeFlags {
    fn default() -> Self {
        Self {
            enable_contact_events: true,
            enable_hit_events: false,
            enable_pre_solve_events: false,
            sensor_index: None,
        }
    }
}

/// A shape attached to a body: its geometry, local offset from the body
/// origin, material and filter. Lives in a simple [`Arena`](crate::utils::allocator::Arena),
/// it does not migrate between solver sets the way bodies/contacts do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub id: Id,
    pub body_id: Id,
    pub shape_type: ShapeType,
    pub local_transform: Transform2,
    pub material: Material,
    pub filter: Filter,
    pub is_sensor: bool,
    pub flags: ShapeFlags,
    /// Intrusive singly-linked list of contacts touching this shape,
    /// threaded through `Contact::next_a`/`next_b` (mirrors `body.rs`'s
    /// per-body contact edge list.
    pub head_contact_key: Option<(Id, bool)>,
}

impl Shape {
    pub fn world_transform(&self, body_transform: &Transform2) -> Transform2 {
        body_transform.combine(&self.local_transform)
    }

    pub fn compute_mass(&self) -> (f32, Vec2, f32) {
        let density = self.material.density;
        match &self.shape_type {
            ShapeType::Circle { radius } => {
                let mass = density * std::f32::consts::PI * radius * radius;
                let inertia = super::types::MassData::for_solid_circle(*radius, mass);
                (mass, Vec2::ZERO, inertia)
            }
            ShapeType::Capsule { p1, p2, radius } => {
                let length = (*p2 - *p1).length();
                let rect_mass = density * length * 2.0 * radius;
                let circle_mass = density * std::f32::consts::PI * radius * radius;
                let mass = rect_mass + circle_mass;
                let center = (*p1 + *p2) * 0.5;
                let box_inertia =
                    super::types::MassData::for_solid_box(Vec2::new(length * 0.5, *radius), rect_mass);
                let cap_inertia = circle_mass * (0.5 * radius * radius + 0.25 * length * length);
                (mass, center, box_inertia + cap_inertia)
            }
            ShapeType::Polygon { vertices, .. } => {
                let (area, centroid, inertia_about_centroid) = polygon_mass_data(vertices);
                let mass = density * area;
                (mass, centroid, density * inertia_about_centroid)
            }
            ShapeType::Segment { .. } | ShapeType::ChainSegment { .. } => (0.0, Vec2::ZERO, 0.0),
        }
    }
}

/// Signed area / centroid / second moment of area about the centroid, via
/// the standard shoelace-triangle decomposition.
fn polygon_mass_data(vertices: &[Vec2]) -> (f32, Vec2, f32) {
    if vertices.len() < 3 {
        return (0.0, Vec2::ZERO, 0.0);
    }
    let origin = vertices[0];
    let mut area = 0.0f32;
    let mut centroid = Vec2::ZERO;
    let mut inertia = 0.0f32;
    for i in 1..vertices.len() - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let cross = e1.x * e2.y - e1.y * e2.x;
        let tri_area = 0.5 * cross;
        area += tri_area;
        centroid += (e1 + e2) * (tri_area / 3.0);
        let intx2 = e1.x * e1.x + e1.x * e2.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e1.y * e2.y + e2.y * e2.y;
        inertia += (0.25 / 3.0) * cross * (intx2 + inty2);
    }
    if area.abs() < 1e-9 {
        return (0.0, origin, 0.0);
    }
    centroid /= area;
    let centroid_world = origin + centroid;
    let inertia_about_origin = inertia;
    let inertia_about_centroid = inertia_about_origin - area * centroid.dot(centroid);
    (area, centroid_world, inertia_about_centroid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_group_index_overrides_mask() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.category_bits = 1;
        a.mask_bits = 0;
        b.category_bits = 2;
        b.mask_bits = 0;
        a.group_index = 5;
        b.group_index = 5;
        assert!(a.should_collide(&b));
        a.group_index = -5;
        b.group_index = -5;
        assert!(!a.should_collide(&b));
    }

    #[test]
    fn default_filters_collide() {
        let a = Filter::default();
        let b = Filter::default();
        assert!(a.should_collide(&b));
    }

    #[test]
    fn unit_square_has_expected_area_mass() {
        let vertices = vec![
            Vec2::new(-0.5, -0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(0.5, 0.5),
            Vec2::new(-0.5, 0.5),
        ];
        let (area, centroid, _) = polygon_mass_data(&vertices);
        assert!((area - 1.0).abs() < 1e-4);
        assert!(centroid.length() < 1e-4);
    }
}
