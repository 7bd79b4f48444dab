//! Narrow-phase manifold generation: a box-vs-box SAT-and-clip routine
//! generalized to every shape pair via a single "rounded hull" representation
//! (a circle is a 1-vertex hull, a capsule/segment a 2-vertex open hull, a
//! polygon an n-vertex closed hull).

use glam::Vec2;

use crate::core::shape::ShapeType;
use crate::core::types::Transform2;
use crate::utils::math::left_perp;

/// One persistent contact point within a manifold. `id` is stable across
/// frames for the same geometric feature pair, letting the contact lifecycle
/// carry `normal_impulse`/`tangent_impulse` forward as a warm start.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifoldPoint {
    pub point: Vec2,
    pub separation: f32,
    pub id: u16,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub max_normal_impulse: f32,
}

/// A contact manifold: shared normal (pointing from shape A to shape B) plus
/// up to two points, following a 2-point-manifold-in-2D model.
#[derive(Debug, Clone, Default)]
pub struct Manifold {
    pub normal: Vec2,
    pub points: Vec<ManifoldPoint>,
}

impl Manifold {
    pub fn is_touching(&self) -> bool {
        !self.points.is_empty()
    }
}

struct Hull {
    verts: Vec<Vec2>,
    radius: f32,
}

impl Hull {
    fn closed(&self) -> bool {
        self.verts.len() >= 3
    }

    fn from_shape(shape: &ShapeType, transform: &Transform2) -> Hull {
        let (local_verts, radius): (Vec<Vec2>, f32) = match shape {
            ShapeType::Circle { radius } => (vec![Vec2::ZERO], *radius),
            ShapeType::Capsule { p1, p2, radius } => (vec![*p1, *p2], *radius),
            ShapeType::Polygon { vertices, radius } => (vertices.clone(), *radius),
            ShapeType::Segment { p1, p2 } => (vec![*p1, *p2], 0.0),
            ShapeType::ChainSegment { p1, p2, .. } => (vec![*p1, *p2], 0.0),
        };
        Hull {
            verts: local_verts.iter().map(|v| transform.apply(*v)).collect(),
            radius,
        }
    }

    /// `(outward normal, edge_start_index)` for every candidate separating
    /// axis. Closed hulls contribute one axis per edge; open (2-vertex)
    /// hulls contribute both perpendicular directions of their single edge,
    /// since a standalone segment has no "inside" to orient against.
    fn candidates(&self) -> Vec<(Vec2, usize)> {
        let n = self.verts.len();
        if self.closed() {
            let centroid = self.verts.iter().fold(Vec2::ZERO, |a, b| a + *b) / n as f32;
            (0..n)
                .map(|i| {
                    let a = self.verts[i];
                    let b = self.verts[(i + 1) % n];
                    let mut normal = left_perp(b - a).normalize_or_zero();
                    if normal.dot(a - centroid) < 0.0 {
                        normal = -normal;
                    }
                    (normal, i)
                })
                .collect()
        } else {
            let dir = self.verts[1] - self.verts[0];
            let normal = left_perp(dir).normalize_or_zero();
            vec![(normal, 0), (-normal, 0)]
        }
    }

    fn edge(&self, start: usize) -> (Vec2, Vec2) {
        let n = self.verts.len();
        (self.verts[start], self.verts[(start + 1) % n])
    }
}

fn max_separation(reference: &Hull, incident: &Hull) -> (f32, Vec2, usize) {
    let mut best = (f32::MIN, Vec2::Y, 0usize);
    for (normal, idx) in reference.candidates() {
        let anchor = reference.edge(idx).0;
        let sep = incident
            .verts
            .iter()
            .map(|v| normal.dot(*v - anchor))
            .fold(f32::MAX, f32::min);
        if sep > best.0 {
            best = (sep, normal, idx);
        }
    }
    best
}

fn clip_segment_to_side_planes(
    p0: Vec2,
    p1: Vec2,
    tangent: Vec2,
    center: Vec2,
    half_len: f32,
) -> Vec<(Vec2, bool)> {
    // Clips the 2-point segment [p0, p1] against the two half-planes that
    // bound the reference edge's extent along `tangent`. The bool flags
    // whether the returned point is a clipped (synthetic) point rather than
    // an original endpoint, for feature-id assignment.
    let mut pts = vec![(p0, false), (p1, false)];
    for sign in [-1.0f32, 1.0] {
        if pts.len() < 2 {
            break;
        }
        let plane_point = center + tangent * (sign * half_len);
        let plane_normal = tangent * sign;
        let mut output = Vec::with_capacity(2);
        for i in 0..pts.len() {
            let (cur, cur_clipped) = pts[i];
            let (prev, _) = pts[(i + pts.len() - 1) % pts.len()];
            let cur_dist = plane_normal.dot(cur - plane_point);
            let prev_dist = plane_normal.dot(prev - plane_point);
            if cur_dist <= 0.0 {
                output.push((cur, cur_clipped));
            }
            if (prev_dist > 0.0) != (cur_dist > 0.0) {
                let t = prev_dist / (prev_dist - cur_dist);
                let intersection = prev + (cur - prev) * t;
                output.push((intersection, true));
            }
        }
        pts = output;
    }
    pts
}

fn hull_vs_hull(a: &Hull, b: &Hull, speculative_distance: f32) -> Option<Manifold> {
    let (sep_a, normal_a, idx_a) = max_separation(a, b);
    let (sep_b, normal_b, idx_b) = max_separation(b, a);

    let radius_sum = a.radius + b.radius;
    if sep_a.max(sep_b) - radius_sum > speculative_distance {
        return None;
    }

    let (reference, incident, ref_idx, normal, a_is_reference) = if sep_a >= sep_b {
        (a, b, idx_a, normal_a, true)
    } else {
        (b, a, idx_b, normal_b, false)
    };

    let incident_idx = incident
        .candidates()
        .into_iter()
        .min_by(|(n1, _), (n2, _)| n1.dot(normal).partial_cmp(&n2.dot(normal)).unwrap())
        .map(|(_, idx)| idx)
        .unwrap_or(0);

    let (r0, r1) = reference.edge(ref_idx);
    let (i0, i1) = incident.edge(incident_idx);
    let tangent = (r1 - r0).normalize_or_zero();
    let half_len = (r1 - r0).length() * 0.5;
    let center = (r0 + r1) * 0.5;

    let clipped = clip_segment_to_side_planes(i0, i1, tangent, center, half_len);
    if clipped.is_empty() {
        return None;
    }

    let mut points = Vec::with_capacity(2);
    for (idx_in_clip, (p, is_clipped)) in clipped.iter().enumerate() {
        let raw_sep = normal.dot(*p - r0);
        let separation = raw_sep - radius_sum;
        if separation > speculative_distance {
            continue;
        }
        let contact_point = *p - normal * (raw_sep * 0.5);
        let feature = if *is_clipped {
            0x80 | (idx_in_clip as u16)
        } else {
            (incident_idx as u16) << 2
        };
        let id = (ref_idx as u16) << 8 | feature;
        points.push(ManifoldPoint {
            point: contact_point,
            separation,
            id,
            ..Default::default()
        });
    }

    if points.is_empty() {
        return None;
    }

    let world_normal = if a_is_reference { normal } else { -normal };
    Some(Manifold {
        normal: world_normal,
        points,
    })
}

fn closest_point_on_polyline(hull: &Hull, point: Vec2) -> (Vec2, u16) {
    let n = hull.verts.len();
    let edge_count = if hull.closed() { n } else { 1 };
    let mut best_point = hull.verts[0];
    let mut best_dist = f32::MAX;
    let mut best_id = 0u16;
    for i in 0..edge_count {
        let (a, b) = hull.edge(i);
        let ab = b - a;
        let len_sq = ab.length_squared();
        let t = if len_sq > 1e-12 {
            ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let candidate = a + ab * t;
        let dist = (candidate - point).length_squared();
        if dist < best_dist {
            best_dist = dist;
            best_point = candidate;
            best_id = (i as u16) << 8 | (if t <= 0.0 { 0 } else if t >= 1.0 { 1 } else { 2 });
        }
    }
    (best_point, best_id)
}

fn circle_vs_hull(circle: &Hull, hull: &Hull, speculative_distance: f32, circle_is_a: bool) -> Option<Manifold> {
    let center = circle.verts[0];
    let (closest, id) = closest_point_on_polyline(hull, center);
    let diff = center - closest;
    let dist = diff.length();
    let normal = if dist > 1e-6 {
        diff / dist
    } else {
        Vec2::Y
    };
    let separation = dist - circle.radius - hull.radius;
    if separation > speculative_distance {
        return None;
    }
    let contact_point = closest + normal * hull.radius;
    let world_normal = if circle_is_a { -normal } else { normal };
    Some(Manifold {
        normal: world_normal,
        points: vec![ManifoldPoint {
            point: contact_point,
            separation,
            id,
            ..Default::default()
        }],
    })
}

/// Computes the manifold between shape `a` and shape `b`, both given in
/// world space, or `None` if they're farther apart than
/// `speculative_distance`. The normal always points from `a`
/// toward `b`.
pub fn collide(
    shape_a: &ShapeType,
    transform_a: &Transform2,
    shape_b: &ShapeType,
    transform_b: &Transform2,
    speculative_distance: f32,
) -> Option<Manifold> {
    let hull_a = Hull::from_shape(shape_a, transform_a);
    let hull_b = Hull::from_shape(shape_b, transform_b);

    match (hull_a.verts.len(), hull_b.verts.len()) {
        (1, 1) => {
            let diff = hull_b.verts[0] - hull_a.verts[0];
            let dist = diff.length();
            let normal = if dist > 1e-6 { diff / dist } else { Vec2::Y };
            let separation = dist - hull_a.radius - hull_b.radius;
            if separation > speculative_distance {
                return None;
            }
            let contact_point = hull_a.verts[0] + normal * (hull_a.radius + separation * 0.5);
            Some(Manifold {
                normal,
                points: vec![ManifoldPoint {
                    point: contact_point,
                    separation,
                    id: 0,
                    ..Default::default()
                }],
            })
        }
        (1, _) => circle_vs_hull(&hull_a, &hull_b, speculative_distance, true),
        (_, 1) => circle_vs_hull(&hull_b, &hull_a, speculative_distance, false).map(|m| Manifold {
            normal: -m.normal,
            ..m
        }),
        _ => hull_vs_hull(&hull_a, &hull_b, speculative_distance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::Rot;

    fn t(x: f32, y: f32) -> Transform2 {
        Transform2::new(Vec2::new(x, y), Rot::IDENTITY)
    }

    #[test]
    fn touching_circles_produce_one_point() {
        let a = ShapeType::Circle { radius: 1.0 };
        let b = ShapeType::Circle { radius: 1.0 };
        let m = collide(&a, &t(0.0, 0.0), &b, &t(1.9, 0.0), 0.01).unwrap();
        assert_eq!(m.points.len(), 1);
        assert!(m.points[0].separation < 0.0);
        assert!((m.normal - Vec2::X).length() < 1e-4);
    }

    #[test]
    fn distant_circles_produce_no_manifold() {
        let a = ShapeType::Circle { radius: 1.0 };
        let b = ShapeType::Circle { radius: 1.0 };
        assert!(collide(&a, &t(0.0, 0.0), &b, &t(10.0, 0.0), 0.01).is_none());
    }

    #[test]
    fn box_resting_on_box_produces_two_points() {
        let square = ShapeType::Polygon {
            vertices: vec![
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(-1.0, 1.0),
            ],
            radius: 0.0,
        };
        let ground = ShapeType::Polygon {
            vertices: vec![
                Vec2::new(-10.0, -1.0),
                Vec2::new(10.0, -1.0),
                Vec2::new(10.0, 1.0),
                Vec2::new(-10.0, 1.0),
            ],
            radius: 0.0,
        };
        let m = collide(&ground, &t(0.0, 0.0), &square, &t(0.0, 1.99), 0.01).unwrap();
        assert_eq!(m.points.len(), 2);
        assert!(m.normal.y > 0.9);
    }

    #[test]
    fn circle_on_polygon_floor_has_downward_normal_into_floor() {
        let floor = ShapeType::Polygon {
            vertices: vec![
                Vec2::new(-10.0, -1.0),
                Vec2::new(10.0, -1.0),
                Vec2::new(10.0, 1.0),
                Vec2::new(-10.0, 1.0),
            ],
            radius: 0.0,
        };
        let ball = ShapeType::Circle { radius: 0.5 };
        let m = collide(&floor, &t(0.0, 0.0), &ball, &t(0.0, 1.4), 0.01).unwrap();
        assert_eq!(m.points.len(), 1);
        assert!(m.normal.y > 0.0);
    }
}
