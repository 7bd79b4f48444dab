//! Contact lifecycle: the logical bookkeeping record created when the broad
//! phase reports a new overlapping shape pair, kept
//! alive across the touching/not-touching transition so warm-start
//! impulses survive from frame to frame. The numeric per-substep row lives
//! separately in [`crate::dynamics::solver_set::ContactSim`], the same
//! logical/numeric split `core::body::Body`/`BodySim` uses.

use crate::collision::manifold::Manifold;
use crate::utils::allocator::Id;

/// A contact's touching state, tracked so the step orchestrator can emit
/// `ContactBegin`/`ContactEnd` events exactly on the transition edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactFlags {
    pub touching: bool,
    pub enabled: bool,
    pub is_sensor: bool,
    /// OR of the two shapes' `enable_pre_solve_events` at creation time;
    /// gates whether the world-level pre-solve callback runs for this
    /// contact.
    pub enable_pre_solve: bool,
}

/// Logical contact record between two shapes. Created by the broad
/// phase's `new_pairs` and destroyed by its `removed_pairs`; survives the
/// awake/asleep transition along with its owning bodies.
#[derive(Debug, Clone)]
pub struct Contact {
    pub id: Id,
    pub shape_a: Id,
    pub shape_b: Id,
    pub body_a: Id,
    pub body_b: Id,
    pub friction: f32,
    pub restitution: f32,
    pub rolling_resistance: f32,
    pub tangent_speed: f32,
    pub flags: ContactFlags,

    pub manifold: Manifold,

    pub set_index: u32,
    pub local_index: u32,

    /// This contact's node in `shape_a`'s intrusive contact-edge list.
    pub edge_a_next: Option<(Id, bool)>,
    /// This contact's node in `shape_b`'s intrusive contact-edge list.
    pub edge_b_next: Option<(Id, bool)>,
}

impl Contact {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Id,
        shape_a: Id,
        shape_b: Id,
        body_a: Id,
        body_b: Id,
        friction: f32,
        restitution: f32,
        rolling_resistance: f32,
        tangent_speed: f32,
        is_sensor: bool,
        enable_pre_solve: bool,
    ) -> Self {
        Self {
            id,
            shape_a,
            shape_b,
            body_a,
            body_b,
            friction,
            restitution,
            rolling_resistance,
            tangent_speed,
            flags: ContactFlags {
                touching: false,
                enabled: true,
                is_sensor,
                enable_pre_solve,
            },
            manifold: Manifold::default(),
            set_index: 0,
            local_index: 0,
            edge_a_next: None,
            edge_b_next: None,
        }
    }

    pub fn other_shape(&self, this_shape: Id) -> Id {
        if this_shape == self.shape_a {
            self.shape_b
        } else {
            self.shape_a
        }
    }
}

/// Transfers warm-start impulses from an old manifold to a new one by
/// matching each point's persistent feature `id` — points whose feature
/// disappeared this frame start cold.
pub fn warm_start_manifold(previous: &Manifold, next: &mut Manifold) {
    for point in &mut next.points {
        if let Some(old) = previous.points.iter().find(|p| p.id == point.id) {
            point.normal_impulse = old.normal_impulse;
            point.tangent_impulse = old.tangent_impulse;
        }
    }
}

/// Result of re-evaluating a contact's manifold this step: whether the
/// touching state flipped, driving `ContactBegin`/`ContactEnd` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchingTransition {
    StillNotTouching,
    Began,
    StillTouching,
    Ended,
}

/// Applies a freshly-computed manifold to a contact, warm-starting it
/// against the previous one and reporting the touching-state transition.
pub fn update_manifold(contact: &mut Contact, mut new_manifold: Manifold) -> TouchingTransition {
    warm_start_manifold(&contact.manifold, &mut new_manifold);
    let was_touching = contact.flags.touching;
    let is_touching = new_manifold.is_touching();
    contact.manifold = new_manifold;
    contact.flags.touching = is_touching;

    match (was_touching, is_touching) {
        (false, false) => TouchingTransition::StillNotTouching,
        (false, true) => TouchingTransition::Began,
        (true, true) => TouchingTransition::StillTouching,
        (true, false) => TouchingTransition::Ended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    use crate::collision::manifold::ManifoldPoint;

    fn manifold_with_ids(ids: &[u16]) -> Manifold {
        Manifold {
            normal: Vec2::Y,
            points: ids
                .iter()
                .map(|&id| ManifoldPoint {
                    id,
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn warm_start_carries_impulse_for_matching_feature_id() {
        let mut previous = manifold_with_ids(&[7]);
        previous.points[0].normal_impulse = 3.5;
        let mut next = manifold_with_ids(&[7]);
        warm_start_manifold(&previous, &mut next);
        assert_eq!(next.points[0].normal_impulse, 3.5);
    }

    #[test]
    fn warm_start_skips_unmatched_feature_id() {
        let mut previous = manifold_with_ids(&[7]);
        previous.points[0].normal_impulse = 3.5;
        let mut next = manifold_with_ids(&[9]);
        warm_start_manifold(&previous, &mut next);
        assert_eq!(next.points[0].normal_impulse, 0.0);
    }

    #[test]
    fn touching_transitions_report_begin_and_end() {
        let mut contact = Contact::new(
            Id::from_bits(1),
            Id::from_bits(2),
            Id::from_bits(3),
            Id::from_bits(4),
            Id::from_bits(5),
            0.3,
            0.0,
            0.0,
            0.0,
            false,
            false,
        );

        let begin = update_manifold(&mut contact, manifold_with_ids(&[1]));
        assert_eq!(begin, TouchingTransition::Began);

        let still = update_manifold(&mut contact, manifold_with_ids(&[1]));
        assert_eq!(still, TouchingTransition::StillTouching);

        let end = update_manifold(&mut contact, Manifold::default());
        assert_eq!(end, TouchingTransition::Ended);
    }
}
