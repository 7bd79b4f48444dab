use glam::Vec2;

use crate::core::shape::ShapeType;
use crate::core::types::Transform2;
use crate::utils::math::Rot;

/// Outcome of a time-of-impact sweep between two moving shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToiState {
    /// The shapes are already overlapping at `t = 0`; the narrow phase
    /// handles this pair as a normal contact, no sweep needed.
    Overlapped,
    /// No impact within `[0, 1]` — or the separation never closes within
    /// `target_distance` of the slop.
    Separated,
    /// Shapes reach `target_distance` of each other at fraction `t` of the
    /// sweep; the step should be clipped there.
    Hit { t: f32 },
    /// Root-finding didn't converge inside the iteration budget. Callers
    /// should treat this conservatively, the same as `Hit { t: 0.0 }`.
    Failed,
}

/// A linear sweep of one shape from `transform0` to `transform1` over the
/// step, in the body's local shape space (i.e. `transform0`/`transform1`
/// already fold in the shape's local offset).
#[derive(Debug, Clone)]
pub struct Sweep {
    pub shape_type: ShapeType,
    pub transform0: Transform2,
    pub transform1: Transform2,
}

impl Sweep {
    fn at(&self, t: f32) -> Transform2 {
        Transform2 {
            position: self.transform0.position.lerp(self.transform1.position, t),
            rotation: nlerp(self.transform0.rotation, self.transform1.rotation, t),
        }
    }
}

fn nlerp(a: Rot, b: Rot, t: f32) -> Rot {
    let c = a.c + (b.c - a.c) * t;
    let s = a.s + (b.s - a.s) * t;
    let len = (c * c + s * s).sqrt();
    if len < 1e-9 {
        return a;
    }
    Rot { c: c / len, s: s / len }
}

/// GJK support point of the Minkowski difference `a - b`, in world space,
/// given each shape's core-geometry support function (rounding radius is
/// handled separately by the caller, same split `collision::manifold`
/// uses for its rounded-hull representation).
fn minkowski_support(
    shape_a: &ShapeType,
    transform_a: &Transform2,
    shape_b: &ShapeType,
    transform_b: &Transform2,
    direction: Vec2,
) -> Vec2 {
    let dir_a = transform_a.rotation.inv_apply(direction);
    let dir_b = transform_b.rotation.inv_apply(-direction);
    let pa = transform_a.apply(shape_a.support(dir_a));
    let pb = transform_b.apply(shape_b.support(dir_b));
    pa - pb
}

/// Distance (and closest-approach direction) between two convex cores via
/// GJK, ignoring each shape's rounding radius — callers subtract
/// `shape_a.radius() + shape_b.radius()` from the result.
fn gjk_distance(
    shape_a: &ShapeType,
    transform_a: &Transform2,
    shape_b: &ShapeType,
    transform_b: &Transform2,
) -> f32 {
    let mut direction = transform_b.position - transform_a.position;
    if direction.length_squared() < 1e-12 {
        direction = Vec2::X;
    }
    let mut simplex: Vec<Vec2> = vec![minkowski_support(
        shape_a, transform_a, shape_b, transform_b, direction,
    )];

    for _ in 0..20 {
        let closest = closest_point_to_origin(&simplex);
        let dist = closest.length();
        if dist < 1e-6 {
            return 0.0;
        }
        let search_dir = -closest;
        let support = minkowski_support(shape_a, transform_a, shape_b, transform_b, search_dir);
        let progress = support.dot(search_dir) - closest.dot(search_dir);
        if progress < 1e-6 {
            return dist;
        }
        simplex.push(support);
        if simplex.len() > 3 {
            // 2D GJK never needs more than a triangle simplex.
            simplex = prune_simplex(simplex);
        }
    }
    closest_point_to_origin(&simplex).length()
}

fn closest_point_to_origin(simplex: &[Vec2]) -> Vec2 {
    match simplex.len() {
        1 => simplex[0],
        2 => closest_on_segment(simplex[0], simplex[1], Vec2::ZERO),
        _ => {
            let candidates = [
                closest_on_segment(simplex[0], simplex[1], Vec2::ZERO),
                closest_on_segment(simplex[1], simplex[2], Vec2::ZERO),
                closest_on_segment(simplex[2], simplex[0], Vec2::ZERO),
            ];
            *candidates
                .iter()
                .min_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
                .unwrap()
        }
    }
}

fn prune_simplex(simplex: Vec<Vec2>) -> Vec<Vec2> {
    let mut scored: Vec<(f32, Vec2)> =
        simplex.into_iter().map(|p| (p.length_squared(), p)).collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(3).map(|(_, p)| p).collect()
}

fn closest_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Conservative-advancement time-of-impact between two swept shapes,
/// stopping once their surfaces come within `target_distance` (a small
/// positive slop keeps the result strictly non-penetrating).
pub fn compute_toi(
    sweep_a: &Sweep,
    sweep_b: &Sweep,
    target_distance: f32,
    tolerance: f32,
    max_iterations: u32,
) -> ToiState {
    let radius = sweep_a.shape_type.radius() + sweep_b.shape_type.radius();
    let target = (target_distance - radius).max(0.0);

    let initial = gjk_distance(
        &sweep_a.shape_type,
        &sweep_a.transform0,
        &sweep_b.shape_type,
        &sweep_b.transform0,
    ) - radius;
    if initial <= target {
        return ToiState::Overlapped;
    }

    let mut t = 0.0f32;
    for _ in 0..max_iterations {
        let transform_a = sweep_a.at(t);
        let transform_b = sweep_b.at(t);
        let separation =
            gjk_distance(&sweep_a.shape_type, &transform_a, &sweep_b.shape_type, &transform_b)
                - radius;

        if separation <= target + tolerance {
            return if t == 0.0 {
                ToiState::Overlapped
            } else {
                ToiState::Hit { t }
            };
        }

        // The two shapes can close the remaining gap no faster than the
        // bound on relative displacement over the rest of the sweep;
        // advancing by `(separation - target) / max_relative_speed` never
        // overshoots a true impact (the conservative-advancement bound).
        let max_relative_speed = max_relative_displacement(sweep_a, sweep_b) + 1e-6;
        let dt = (separation - target) / max_relative_speed;
        t += dt.max(tolerance);
        if t >= 1.0 {
            let transform_a = sweep_a.at(1.0);
            let transform_b = sweep_b.at(1.0);
            let final_sep = gjk_distance(
                &sweep_a.shape_type,
                &transform_a,
                &sweep_b.shape_type,
                &transform_b,
            ) - radius;
            return if final_sep <= target + tolerance {
                ToiState::Hit { t: 1.0 }
            } else {
                ToiState::Separated
            };
        }
    }
    ToiState::Failed
}

/// Upper bound on how fast any point of shape A's hull can approach any
/// point of shape B's hull over the remainder of the sweep: translation
/// plus the angular sweep times each shape's farthest extent from its own
/// rotation center.
fn max_relative_displacement(sweep_a: &Sweep, sweep_b: &Sweep) -> f32 {
    let translation = (sweep_b.transform1.position - sweep_b.transform0.position)
        - (sweep_a.transform1.position - sweep_a.transform0.position);
    let angle_a = sweep_a
        .transform0
        .rotation
        .relative_angle(sweep_a.transform1.rotation)
        .abs();
    let angle_b = sweep_b
        .transform0
        .rotation
        .relative_angle(sweep_b.transform1.rotation)
        .abs();
    let extent_a = shape_extent(&sweep_a.shape_type);
    let extent_b = shape_extent(&sweep_b.shape_type);
    translation.length() + angle_a * extent_a + angle_b * extent_b
}

fn shape_extent(shape: &ShapeType) -> f32 {
    let (lo, hi) = shape.local_bounds();
    lo.length().max(hi.length())
}

/// Gates whether a body needs CCD treatment at all this step: only bodies
/// moving far enough, relative to their own smallest feature, to plausibly
/// tunnel through something thinner than their speculative margin pay for
/// a sweep.
pub fn is_fast_body(linear_displacement: Vec2, angular_displacement: f32, min_extent: f32) -> bool {
    let translation_ratio = linear_displacement.length() / min_extent.max(1e-6);
    translation_ratio > 0.5 || angular_displacement.abs() > std::f32::consts::FRAC_PI_4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(position: Vec2) -> Transform2 {
        Transform2 { position, rotation: Rot::IDENTITY }
    }

    #[test]
    fn fast_moving_circle_reports_a_toi_hit_against_a_stationary_wall() {
        let bullet = Sweep {
            shape_type: ShapeType::Circle { radius: 0.1 },
            transform0: id(Vec2::new(-5.0, 0.0)),
            transform1: id(Vec2::new(5.0, 0.0)),
        };
        let wall = Sweep {
            shape_type: ShapeType::Polygon {
                vertices: vec![
                    Vec2::new(-0.05, -2.0),
                    Vec2::new(0.05, -2.0),
                    Vec2::new(0.05, 2.0),
                    Vec2::new(-0.05, 2.0),
                ],
                radius: 0.0,
            },
            transform0: id(Vec2::ZERO),
            transform1: id(Vec2::ZERO),
        };

        let result = compute_toi(&bullet, &wall, 0.005, 1e-4, 50);
        match result {
            ToiState::Hit { t } => assert!(t > 0.0 && t < 1.0),
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn shapes_that_never_approach_report_separated() {
        let a = Sweep {
            shape_type: ShapeType::Circle { radius: 0.5 },
            transform0: id(Vec2::new(-10.0, 0.0)),
            transform1: id(Vec2::new(-9.0, 0.0)),
        };
        let b = Sweep {
            shape_type: ShapeType::Circle { radius: 0.5 },
            transform0: id(Vec2::new(10.0, 0.0)),
            transform1: id(Vec2::new(9.0, 0.0)),
        };
        assert_eq!(compute_toi(&a, &b, 0.005, 1e-4, 50), ToiState::Separated);
    }

    #[test]
    fn already_overlapping_shapes_report_overlapped() {
        let a = Sweep {
            shape_type: ShapeType::Circle { radius: 1.0 },
            transform0: id(Vec2::ZERO),
            transform1: id(Vec2::ZERO),
        };
        let b = Sweep {
            shape_type: ShapeType::Circle { radius: 1.0 },
            transform0: id(Vec2::new(0.5, 0.0)),
            transform1: id(Vec2::new(0.5, 0.0)),
        };
        assert_eq!(compute_toi(&a, &b, 0.005, 1e-4, 50), ToiState::Overlapped);
    }

    #[test]
    fn fast_body_gate_trips_on_large_displacement_relative_to_extent() {
        assert!(is_fast_body(Vec2::new(2.0, 0.0), 0.0, 1.0));
        assert!(!is_fast_body(Vec2::new(0.01, 0.0), 0.0, 1.0));
    }
}
