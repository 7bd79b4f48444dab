//! Spatial queries over live shapes: `rayCast`, `shapeCast`, `overlapAabb`,
//! `overlapShape`, each filtered by category/mask/group exactly like pair
//! creation and driven by a visitor callback so callers can stop early
//! without collecting every hit.

use glam::Vec2;

use crate::collision::broadphase::{shape_aabb, Aabb};
use crate::collision::ccd::{compute_toi, Sweep, ToiState};
use crate::collision::manifold;
use crate::core::shape::{Filter, Shape, ShapeType};
use crate::core::types::Transform2;
use crate::utils::allocator::{Arena, Id};

#[derive(Debug, Clone, Copy)]
pub struct RaycastHit {
    pub shape_id: Id,
    pub body_id: Id,
    pub point: Vec2,
    pub normal: Vec2,
    /// Fraction of `max_distance` at which the hit occurred, in `[0, 1]`.
    pub fraction: f32,
}

#[derive(Debug, Clone)]
pub struct RaycastQuery {
    pub origin: Vec2,
    pub direction: Vec2,
    pub max_distance: f32,
    pub filter: Filter,
}

impl RaycastQuery {
    pub fn new(origin: Vec2, direction: Vec2, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
            filter: Filter::default(),
        }
    }
}

/// Casts `query` against every shape in `shapes`, calling `visitor` with
/// each hit in no particular order; `visitor` returning `false` stops the
/// scan early (Box2D-style early-exit raycast callback, applied to every
/// query in this module).
pub fn raycast(
    query: &RaycastQuery,
    shapes: &Arena<Shape>,
    body_transform: impl Fn(Id) -> Transform2,
    mut visitor: impl FnMut(RaycastHit) -> bool,
) {
    if query.direction == Vec2::ZERO || query.max_distance <= 0.0 {
        return;
    }
    for (shape_id, shape) in shapes.iter() {
        if !query.filter.should_collide(&shape.filter) {
            continue;
        }
        let world_transform = shape.world_transform(&body_transform(shape.body_id));
        if let Some((point, normal, fraction)) =
            ray_shape(query, &shape.shape_type, &world_transform)
        {
            let hit = RaycastHit {
                shape_id,
                body_id: shape.body_id,
                point,
                normal,
                fraction,
            };
            if !visitor(hit) {
                return;
            }
        }
    }
}

/// Convenience wrapper returning only the closest hit.
pub fn raycast_closest(
    query: &RaycastQuery,
    shapes: &Arena<Shape>,
    body_transform: impl Fn(Id) -> Transform2,
) -> Option<RaycastHit> {
    let mut best: Option<RaycastHit> = None;
    raycast(query, shapes, body_transform, |hit| {
        let is_closer = match best {
            Some(b) => hit.fraction < b.fraction,
            None => true,
        };
        if is_closer {
            best = Some(hit);
        }
        true
    });
    best
}

fn ray_shape(
    query: &RaycastQuery,
    shape_type: &ShapeType,
    transform: &Transform2,
) -> Option<(Vec2, Vec2, f32)> {
    match shape_type {
        ShapeType::Circle { radius } => ray_circle(query, transform.position, *radius),
        ShapeType::Capsule { p1, p2, radius } => {
            ray_capsule(query, transform.apply(*p1), transform.apply(*p2), *radius)
        }
        ShapeType::Polygon { vertices, radius } => {
            let world: Vec<Vec2> = vertices.iter().map(|v| transform.apply(*v)).collect();
            ray_polygon(query, &world, *radius)
        }
        ShapeType::Segment { p1, p2 } | ShapeType::ChainSegment { p1, p2, .. } => {
            ray_segment(query, transform.apply(*p1), transform.apply(*p2))
        }
    }
}

fn ray_circle(query: &RaycastQuery, center: Vec2, radius: f32) -> Option<(Vec2, Vec2, f32)> {
    let oc = query.origin - center;
    let b = oc.dot(query.direction);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    if t < 0.0 || t > query.max_distance {
        return None;
    }
    let point = query.origin + query.direction * t;
    Some((point, (point - center).normalize_or_zero(), t / query.max_distance))
}

fn ray_capsule(
    query: &RaycastQuery,
    p1: Vec2,
    p2: Vec2,
    radius: f32,
) -> Option<(Vec2, Vec2, f32)> {
    let offset = left_perp_radius(p1, p2, radius);
    let candidates = [
        ray_segment(query, p1 + offset, p2 + offset),
        ray_segment(query, p1 - offset, p2 - offset),
        ray_circle(query, p1, radius),
        ray_circle(query, p2, radius),
    ];
    candidates
        .into_iter()
        .flatten()
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

fn left_perp_radius(p1: Vec2, p2: Vec2, radius: f32) -> Vec2 {
    let dir = (p2 - p1).normalize_or_zero();
    Vec2::new(-dir.y, dir.x) * radius
}

fn ray_segment(query: &RaycastQuery, p1: Vec2, p2: Vec2) -> Option<(Vec2, Vec2, f32)> {
    let edge = p2 - p1;
    let normal_dir = Vec2::new(-edge.y, edge.x).normalize_or_zero();
    let denom = query.direction.dot(normal_dir);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (p1 - query.origin).dot(normal_dir) / denom;
    if t < 0.0 || t > query.max_distance {
        return None;
    }
    let point = query.origin + query.direction * t;
    let edge_len_sq = edge.length_squared();
    if edge_len_sq < 1e-12 {
        return None;
    }
    let s = (point - p1).dot(edge) / edge_len_sq;
    if !(0.0..=1.0).contains(&s) {
        return None;
    }
    let normal = if normal_dir.dot(query.direction) > 0.0 {
        -normal_dir
    } else {
        normal_dir
    };
    Some((point, normal, t / query.max_distance))
}

fn ray_polygon(query: &RaycastQuery, vertices: &[Vec2], radius: f32) -> Option<(Vec2, Vec2, f32)> {
    let n = vertices.len();
    if n < 3 {
        return None;
    }
    if radius > 0.0 {
        return (0..n)
            .filter_map(|i| ray_capsule(query, vertices[i], vertices[(i + 1) % n], radius))
            .min_by(|a, b| a.2.total_cmp(&b.2));
    }
    (0..n)
        .filter_map(|i| ray_segment(query, vertices[i], vertices[(i + 1) % n]))
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

/// Reports every shape whose tight world AABB overlaps `aabb`.
pub fn overlap_aabb(
    aabb: Aabb,
    filter: Filter,
    shapes: &Arena<Shape>,
    body_transform: impl Fn(Id) -> Transform2,
    mut visitor: impl FnMut(Id) -> bool,
) {
    for (shape_id, shape) in shapes.iter() {
        if !filter.should_collide(&shape.filter) {
            continue;
        }
        let world_transform = shape.world_transform(&body_transform(shape.body_id));
        let shape_box = shape_aabb(&shape.shape_type, &world_transform);
        if shape_box.overlaps(&aabb) && !visitor(shape_id) {
            return;
        }
    }
}

/// Reports every shape whose geometry actually overlaps a probe shape
/// placed at `probe_transform` (a zero-speculative-distance manifold
/// query), not just its AABB.
pub fn overlap_shape(
    probe: &ShapeType,
    probe_transform: &Transform2,
    filter: Filter,
    shapes: &Arena<Shape>,
    body_transform: impl Fn(Id) -> Transform2,
    mut visitor: impl FnMut(Id) -> bool,
) {
    for (shape_id, shape) in shapes.iter() {
        if !filter.should_collide(&shape.filter) {
            continue;
        }
        let world_transform = shape.world_transform(&body_transform(shape.body_id));
        let touching =
            manifold::collide(probe, probe_transform, &shape.shape_type, &world_transform, 0.0)
                .map(|m| m.points.iter().any(|p| p.separation <= 0.0))
                .unwrap_or(false);
        if touching && !visitor(shape_id) {
            return;
        }
    }
}

/// Sweeps `probe` linearly from `start` to `end` and returns the earliest
/// fraction at which it touches `target`, if any, reusing the continuous
/// collision pass's conservative-advancement TOI sweep.
pub fn shape_cast(
    probe: &ShapeType,
    start: Transform2,
    end: Transform2,
    target: &ShapeType,
    target_transform: Transform2,
) -> Option<f32> {
    let sweep_probe = Sweep {
        shape_type: probe.clone(),
        transform0: start,
        transform1: end,
    };
    let sweep_target = Sweep {
        shape_type: target.clone(),
        transform0: target_transform,
        transform1: target_transform,
    };
    match compute_toi(&sweep_probe, &sweep_target, 0.0, 1e-4, 50) {
        ToiState::Hit { t } => Some(t),
        ToiState::Overlapped => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Material;
    use crate::utils::math::Rot;

    fn make_shapes() -> (Arena<Shape>, Id) {
        let mut arena: Arena<Shape> = Arena::new(0);
        let id = arena.insert(Shape {
            id: Id::NULL,
            body_id: Id::from_bits(1),
            shape_type: ShapeType::Circle { radius: 1.0 },
            local_transform: Transform2::default(),
            material: Material::default(),
            filter: Filter::default(),
            is_sensor: false,
            flags: crate::core::shape::ShapeFlags::default(),
            head_contact_key: None,
        });
        arena.get_mut(id).unwrap().id = id;
        (arena, id)
    }

    #[test]
    fn raycast_hits_a_circle_head_on() {
        let (shapes, shape_id) = make_shapes();
        let query = RaycastQuery::new(Vec2::new(-10.0, 0.0), Vec2::X, 20.0);
        let hit = raycast_closest(&query, &shapes, |_| {
            Transform2::new(Vec2::new(5.0, 0.0), Rot::IDENTITY)
        });
        let hit = hit.unwrap();
        assert_eq!(hit.shape_id, shape_id);
        assert!((hit.point.x - 4.0).abs() < 1e-3);
    }

    #[test]
    fn raycast_misses_when_direction_points_away() {
        let (shapes, _) = make_shapes();
        let query = RaycastQuery::new(Vec2::new(-10.0, 0.0), -Vec2::X, 20.0);
        let hit = raycast_closest(&query, &shapes, |_| {
            Transform2::new(Vec2::new(5.0, 0.0), Rot::IDENTITY)
        });
        assert!(hit.is_none());
    }

    #[test]
    fn overlap_aabb_finds_the_circle_box() {
        let (shapes, shape_id) = make_shapes();
        let probe = Aabb {
            lower: Vec2::new(3.0, -3.0),
            upper: Vec2::new(7.0, 3.0),
        };
        let mut found = None;
        overlap_aabb(
            probe,
            Filter::default(),
            &shapes,
            |_| Transform2::new(Vec2::new(5.0, 0.0), Rot::IDENTITY),
            |id| {
                found = Some(id);
                true
            },
        );
        assert_eq!(found, Some(shape_id));
    }

    #[test]
    fn overlap_shape_detects_true_geometric_overlap() {
        let (shapes, shape_id) = make_shapes();
        let probe = ShapeType::Circle { radius: 1.0 };
        let mut found = None;
        overlap_shape(
            &probe,
            &Transform2::new(Vec2::new(5.5, 0.0), Rot::IDENTITY),
            Filter::default(),
            &shapes,
            |_| Transform2::new(Vec2::new(5.0, 0.0), Rot::IDENTITY),
            |id| {
                found = Some(id);
                true
            },
        );
        assert_eq!(found, Some(shape_id));
    }

    #[test]
    fn shape_cast_finds_a_hit_time_against_a_static_target() {
        let probe = ShapeType::Circle { radius: 0.5 };
        let target = ShapeType::Circle { radius: 0.5 };
        let t = shape_cast(
            &probe,
            Transform2::new(Vec2::new(-5.0, 0.0), Rot::IDENTITY),
            Transform2::new(Vec2::new(5.0, 0.0), Rot::IDENTITY),
            &target,
            Transform2::new(Vec2::ZERO, Rot::IDENTITY),
        );
        assert!(t.is_some());
    }
}
