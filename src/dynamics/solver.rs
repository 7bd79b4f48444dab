//! Substep constraint solver: splits `dt` into `substepCount` slices of
//! `h`, and per substep runs prepare → warm-start → two relaxation passes
//! (bias then no-bias) → integrate. Constraints are grouped by the color a
//! [`crate::dynamics::graph::ConstraintGraph`] assigned them; within one
//! substep's pass, color buckets are visited in order and constraints
//! within a bucket never touch the same body, which is what lets a future
//! pass parallelize them safely.
//!
//! Warm-start-then-iterate Gauss-Seidel relaxation with a per-joint-type
//! `match` dispatch, softness-based bias instead of plain Baumgarte
//! stabilization, and friction resolved by accumulate-then-clamp-to-
//! `mu*normal`.

use glam::{Mat2, Vec2};

use crate::config::WorldDef;
use crate::core::joint::JointType;
use crate::dynamics::solver_set::{BodySim, BodyState, ContactSim, JointSim};
use crate::utils::math::{cross_vs, cross_vv, left_perp, Softness};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A contact point whose normal-impulse rate crossed the world's hit-event
/// threshold this step, reported so the step orchestrator can push a
/// `ContactHitEvent`.
#[derive(Debug, Clone, Copy)]
pub struct ContactHit {
    pub contact_index: usize,
    pub point: Vec2,
    pub normal: Vec2,
    pub approach_speed: f32,
}

fn point_mass_matrix(inv_mass_a: f32, inv_i_a: f32, r_a: Vec2, inv_mass_b: f32, inv_i_b: f32, r_b: Vec2) -> Mat2 {
    let k11 = inv_mass_a + inv_mass_b + inv_i_a * r_a.y * r_a.y + inv_i_b * r_b.y * r_b.y;
    let k12 = -inv_i_a * r_a.x * r_a.y - inv_i_b * r_b.x * r_b.y;
    let k22 = inv_mass_a + inv_mass_b + inv_i_a * r_a.x * r_a.x + inv_i_b * r_b.x * r_b.x;
    Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22))
}

fn axial_mass(inv_mass_a: f32, inv_i_a: f32, r_a: Vec2, inv_mass_b: f32, inv_i_b: f32, r_b: Vec2, axis: Vec2) -> f32 {
    let cross_a = cross_vv(r_a, axis);
    let cross_b = cross_vv(r_b, axis);
    let k = inv_mass_a + inv_mass_b + inv_i_a * cross_a * cross_a + inv_i_b * cross_b * cross_b;
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

fn point_velocity(state: &BodyState, r: Vec2) -> Vec2 {
    state.linear_velocity + cross_vs(r, state.angular_velocity)
}

fn apply_point_impulse(sim_a: &BodySim, state_a: &mut BodyState, r_a: Vec2, sim_b: &BodySim, state_b: &mut BodyState, r_b: Vec2, impulse: Vec2) {
    state_a.linear_velocity -= impulse * sim_a.inverse_mass;
    state_a.angular_velocity -= sim_a.inverse_inertia * cross_vv(r_a, impulse);
    state_b.linear_velocity += impulse * sim_b.inverse_mass;
    state_b.angular_velocity += sim_b.inverse_inertia * cross_vv(r_b, impulse);
}

fn apply_angular_impulse(sim_a: &BodySim, state_a: &mut BodyState, sim_b: &BodySim, state_b: &mut BodyState, impulse: f32) {
    state_a.angular_velocity -= sim_a.inverse_inertia * impulse;
    state_b.angular_velocity += sim_b.inverse_inertia * impulse;
}

fn world_anchor(sim: &BodySim, local: Vec2) -> Vec2 {
    sim.transform.apply(local)
}

fn anchor_offset(sim: &BodySim, world_point: Vec2) -> Vec2 {
    world_point - sim.center_of_mass
}

fn build_color_buckets(colors: &[usize], color_count: usize) -> Vec<Vec<usize>> {
    let mut buckets = vec![Vec::new(); color_count];
    for (index, &color) in colors.iter().enumerate() {
        buckets[color.min(color_count - 1)].push(index);
    }
    buckets
}

/// Per-point scratch computed once per step, ahead of the substep loop: the
/// normal-relative velocity at the moment the contact was evaluated, used
/// to gate restitution bias on the first velocity iteration.
struct ContactPrestep {
    point_relative_velocity: Vec<f32>,
}

fn precompute_prestep(
    contacts: &[ContactSim],
    body_sims: &[BodySim],
    body_states: &[BodyState],
) -> Vec<ContactPrestep> {
    contacts
        .iter()
        .map(|contact| {
            let sim_a = &body_sims[contact.body_sim_index_a as usize];
            let sim_b = &body_sims[contact.body_sim_index_b as usize];
            let state_a = &body_states[contact.body_sim_index_a as usize];
            let state_b = &body_states[contact.body_sim_index_b as usize];
            let point_relative_velocity = contact
                .manifold
                .points
                .iter()
                .map(|point| {
                    let r_a = anchor_offset(sim_a, point.point);
                    let r_b = anchor_offset(sim_b, point.point);
                    let relative = point_velocity(state_b, r_b) - point_velocity(state_a, r_a);
                    relative.dot(contact.manifold.normal)
                })
                .collect();
            ContactPrestep { point_relative_velocity }
        })
        .collect()
}

fn apply_gravity_and_damping(body_sims: &[BodySim], body_states: &mut [BodyState], gravity: Vec2, h: f32) {
    let step = |sim: &BodySim, state: &mut BodyState| {
        if sim.is_static() {
            return;
        }
        state.linear_velocity += (gravity * sim.gravity_scale) * h;
        state.linear_velocity *= 1.0 / (1.0 + h * sim.linear_damping);
        state.angular_velocity *= 1.0 / (1.0 + h * sim.angular_damping);

        if sim.motion_locks.x {
            state.linear_velocity.x = 0.0;
        }
        if sim.motion_locks.y {
            state.linear_velocity.y = 0.0;
        }
        if sim.motion_locks.angular_z {
            state.angular_velocity = 0.0;
        }
    };

    #[cfg(feature = "parallel")]
    {
        body_sims
            .par_iter()
            .zip(body_states.par_iter_mut())
            .for_each(|(sim, state)| step(sim, state));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (sim, state) in body_sims.iter().zip(body_states.iter_mut()) {
            step(sim, state);
        }
    }
}

fn warm_start_contacts(contacts: &[ContactSim], body_sims: &[BodySim], body_states: &mut [BodyState]) {
    for contact in contacts {
        let idx_a = contact.body_sim_index_a as usize;
        let idx_b = contact.body_sim_index_b as usize;
        let normal = contact.manifold.normal;
        let tangent = left_perp(normal);
        for point in &contact.manifold.points {
            let impulse = normal * point.normal_impulse + tangent * point.tangent_impulse;
            if impulse == Vec2::ZERO {
                continue;
            }
            let (sim_a, sim_b) = (&body_sims[idx_a], &body_sims[idx_b]);
            let r_a = anchor_offset(sim_a, point.point);
            let r_b = anchor_offset(sim_b, point.point);
            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            apply_point_impulse(sim_a, state_a, r_a, sim_b, state_b, r_b, impulse);
        }
    }
}

fn index_pair_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "a contact/joint must not reference the same body on both sides");
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[allow(clippy::too_many_arguments)]
fn solve_contact(
    contact: &mut ContactSim,
    prestep: &ContactPrestep,
    body_sims: &[BodySim],
    body_states: &mut [BodyState],
    softness: Softness,
    use_bias: bool,
    apply_restitution: bool,
    restitution_threshold: f32,
    inv_h: f32,
    hit_threshold: f32,
) -> Option<ContactHit> {
    let idx_a = contact.body_sim_index_a as usize;
    let idx_b = contact.body_sim_index_b as usize;
    let (sim_a, sim_b) = (&body_sims[idx_a], &body_sims[idx_b]);
    let normal = contact.manifold.normal;
    let tangent = left_perp(normal);
    let friction = contact.friction;
    let restitution = contact.restitution;
    let tangent_speed = contact.tangent_speed;
    let rolling_resistance = contact.rolling_resistance;

    let mut hit = None;

    for (point_index, point) in contact.manifold.points.iter_mut().enumerate() {
        let r_a = anchor_offset(sim_a, point.point);
        let r_b = anchor_offset(sim_b, point.point);
        let normal_mass = {
            let k = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, r_a, sim_b.inverse_mass, sim_b.inverse_inertia, r_b, normal);
            if k > 0.0 {
                1.0 / k
            } else {
                0.0
            }
        };

        let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
        let relative = point_velocity(state_b, r_b) - point_velocity(state_a, r_a);
        let vn = relative.dot(normal);

        let mut bias = 0.0;
        let mut mass_scale = 1.0;
        let mut impulse_scale = 0.0;
        if point.separation > 0.0 {
            bias = point.separation * inv_h;
        } else if use_bias {
            bias = (softness.bias_rate * point.separation).max(-4.0);
            mass_scale = softness.mass_scale;
            impulse_scale = softness.impulse_scale;
        }

        let mut restitution_bias = 0.0;
        if apply_restitution {
            let initial_vn = prestep.point_relative_velocity.get(point_index).copied().unwrap_or(0.0);
            if initial_vn < -restitution_threshold {
                restitution_bias = -restitution * initial_vn;
            }
        }
        let effective_bias = bias.max(restitution_bias);

        let raw_impulse = -normal_mass * mass_scale * (vn + effective_bias) - impulse_scale * point.normal_impulse;
        let new_impulse = (point.normal_impulse + raw_impulse).max(0.0);
        let delta = new_impulse - point.normal_impulse;
        point.normal_impulse = new_impulse;
        point.max_normal_impulse = point.max_normal_impulse.max(new_impulse);

        apply_point_impulse(sim_a, state_a, r_a, sim_b, state_b, r_b, normal * delta);

        if delta.abs() * inv_h > hit_threshold {
            hit = Some(ContactHit {
                contact_index: 0,
                point: point.point,
                normal,
                approach_speed: -vn,
            });
        }

        // Friction, clamped to the Coulomb cone of the just-updated normal impulse.
        let tangent_mass = {
            let k = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, r_a, sim_b.inverse_mass, sim_b.inverse_inertia, r_b, tangent);
            if k > 0.0 {
                1.0 / k
            } else {
                0.0
            }
        };
        let relative = point_velocity(state_b, r_b) - point_velocity(state_a, r_a);
        let vt = relative.dot(tangent) - tangent_speed;
        let raw_tangent_impulse = -tangent_mass * vt;
        let max_friction = friction * point.normal_impulse;
        let new_tangent_impulse = (point.tangent_impulse + raw_tangent_impulse).clamp(-max_friction, max_friction);
        let tangent_delta = new_tangent_impulse - point.tangent_impulse;
        point.tangent_impulse = new_tangent_impulse;

        apply_point_impulse(sim_a, state_a, r_a, sim_b, state_b, r_b, tangent * tangent_delta);
    }

    if rolling_resistance > 0.0 {
        let total_normal_impulse: f32 = contact.manifold.points.iter().map(|p| p.normal_impulse).sum();
        let max_rolling_impulse = rolling_resistance * total_normal_impulse;
        if max_rolling_impulse > 0.0 {
            let rolling_mass = {
                let k = sim_a.inverse_inertia + sim_b.inverse_inertia;
                if k > 0.0 {
                    1.0 / k
                } else {
                    0.0
                }
            };
            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let cdot = state_b.angular_velocity - state_a.angular_velocity;
            let raw = -rolling_mass * cdot;
            let new_impulse = (contact.rolling_impulse + raw).clamp(-max_rolling_impulse, max_rolling_impulse);
            let delta = new_impulse - contact.rolling_impulse;
            contact.rolling_impulse = new_impulse;
            apply_angular_impulse(sim_a, state_a, sim_b, state_b, -delta);
        }
    }

    hit
}

fn solve_joint(joint: &mut JointSim, body_sims: &[BodySim], body_states: &mut [BodyState], softness: Softness, use_bias: bool, h: f32, inv_h: f32) {
    let idx_a = joint.body_sim_index_a as usize;
    let idx_b = joint.body_sim_index_b as usize;
    let (sim_a, sim_b) = (&body_sims[idx_a], &body_sims[idx_b]);
    let anchor_a = anchor_offset(sim_a, world_anchor(sim_a, joint.frame_a.position));
    let anchor_b = anchor_offset(sim_b, world_anchor(sim_b, joint.frame_b.position));

    match &mut joint.joint_type {
        JointType::Distance { length, min_length, max_length, enable_spring, hertz, damping_ratio } => {
            let point_a = sim_a.center_of_mass + anchor_a;
            let point_b = sim_b.center_of_mass + anchor_b;
            let delta = point_b - point_a;
            let current_length = delta.length().max(1e-6);
            let axis = delta / current_length;

            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let mass = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b, axis);
            let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(axis);

            if *enable_spring {
                let spring_softness = Softness::new(*hertz, *damping_ratio, h);
                let c = current_length - *length;
                let bias = spring_softness.bias_rate * c;
                let impulse = -mass * spring_softness.mass_scale * (vn + bias) - spring_softness.impulse_scale * joint.impulse.spring;
                joint.impulse.spring += impulse;
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * impulse);
            } else {
                let c = current_length - *length;
                let bias = if use_bias { softness.bias_rate * c } else { 0.0 };
                let mass_scale = if use_bias { softness.mass_scale } else { 1.0 };
                let impulse_scale = if use_bias { softness.impulse_scale } else { 0.0 };
                let impulse = -mass * mass_scale * (vn + bias) - impulse_scale * joint.impulse.linear.x;
                joint.impulse.linear.x += impulse;
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * impulse);
            }

            // Hard min/max limits, one-sided like the revolute angle limits.
            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(axis);
            if current_length <= *min_length {
                let c = (current_length - *min_length).min(0.0);
                let bias = (c * inv_h).max(-4.0);
                let impulse = (-mass * (vn + bias)).max(0.0);
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * impulse);
            } else if current_length >= *max_length {
                let c = (current_length - *max_length).max(0.0);
                let bias = (c * inv_h).min(4.0);
                let impulse = (-mass * (vn + bias)).min(0.0);
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * impulse);
            }
        }

        JointType::Mouse { target, hertz, damping_ratio, max_force } => {
            let point_a = sim_a.center_of_mass + anchor_a;
            let spring_softness = Softness::new(*hertz, *damping_ratio, h);
            let c = point_a - *target;

            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let k = point_mass_matrix(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b);
            let k_inv = k.inverse();
            let vn = point_velocity(state_a, anchor_a) - point_velocity(state_b, anchor_b);
            let bias = c * spring_softness.bias_rate;
            let raw = k_inv.mul_vec2(-(vn + bias) * spring_softness.mass_scale) - joint.impulse.linear * spring_softness.impulse_scale;
            let new_impulse = joint.impulse.linear + raw;
            let max_impulse = *max_force * h;
            let clamped = if new_impulse.length() > max_impulse {
                new_impulse * (max_impulse / new_impulse.length())
            } else {
                new_impulse
            };
            let delta = clamped - joint.impulse.linear;
            joint.impulse.linear = clamped;
            apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, -delta);
        }

        JointType::Revolute { enable_motor, motor_speed, max_motor_torque, enable_limit, lower_angle, upper_angle } => {
            let relative_angle = sim_a.transform.rotation.mul(joint.frame_a.rotation).relative_angle(sim_b.transform.rotation.mul(joint.frame_b.rotation));

            if *enable_motor {
                let axial = {
                    let k = sim_a.inverse_inertia + sim_b.inverse_inertia;
                    if k > 0.0 { 1.0 / k } else { 0.0 }
                };
                let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                let cdot = state_b.angular_velocity - state_a.angular_velocity - *motor_speed;
                let raw = -axial * cdot;
                let max_impulse = *max_motor_torque * h;
                let new_impulse = (joint.impulse.motor + raw).clamp(-max_impulse, max_impulse);
                let delta = new_impulse - joint.impulse.motor;
                joint.impulse.motor = new_impulse;
                apply_angular_impulse(sim_a, state_a, sim_b, state_b, -delta);
            }

            if *enable_limit {
                let axial = {
                    let k = sim_a.inverse_inertia + sim_b.inverse_inertia;
                    if k > 0.0 { 1.0 / k } else { 0.0 }
                };
                if relative_angle <= *lower_angle {
                    let c = relative_angle - *lower_angle;
                    let bias = (c * inv_h).min(0.0).max(-4.0);
                    let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                    let cdot = state_b.angular_velocity - state_a.angular_velocity;
                    let raw = (-axial * (cdot + bias)).max(0.0);
                    joint.impulse.lower += raw;
                    apply_angular_impulse(sim_a, state_a, sim_b, state_b, -raw);
                } else if relative_angle >= *upper_angle {
                    let c = relative_angle - *upper_angle;
                    let bias = (c * inv_h).max(0.0).min(4.0);
                    let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                    let cdot = state_b.angular_velocity - state_a.angular_velocity;
                    let raw = (-axial * (cdot + bias)).min(0.0);
                    joint.impulse.upper += raw;
                    apply_angular_impulse(sim_a, state_a, sim_b, state_b, -raw);
                }
            }

            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let k = point_mass_matrix(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b);
            let k_inv = k.inverse();
            let point_a = sim_a.center_of_mass + anchor_a;
            let point_b = sim_b.center_of_mass + anchor_b;
            let c = point_b - point_a;
            let bias = if use_bias { c * softness.bias_rate } else { Vec2::ZERO };
            let mass_scale = if use_bias { softness.mass_scale } else { 1.0 };
            let impulse_scale = if use_bias { softness.impulse_scale } else { 0.0 };
            let vn = point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a);
            let raw = k_inv.mul_vec2(-(vn + bias) * mass_scale) - joint.impulse.linear * impulse_scale;
            joint.impulse.linear += raw;
            apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, raw);
        }

        JointType::Prismatic { local_axis_a, enable_motor, motor_speed, max_motor_force, enable_limit, lower_translation, upper_translation } => {
            let axis = sim_a.transform.rotation.apply(*local_axis_a);
            let perp = left_perp(axis);
            let point_a = sim_a.center_of_mass + anchor_a;
            let point_b = sim_b.center_of_mass + anchor_b;
            let delta = point_b - point_a;
            let translation = delta.dot(axis);

            // Perpendicular lock (1-DOF) keeps the bodies from sliding sideways.
            {
                let mass = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b, perp);
                let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(perp);
                let c = delta.dot(perp);
                let bias = if use_bias { softness.bias_rate * c } else { 0.0 };
                let mass_scale = if use_bias { softness.mass_scale } else { 1.0 };
                let impulse_scale = if use_bias { softness.impulse_scale } else { 0.0 };
                let raw = -mass * mass_scale * (vn + bias) - impulse_scale * joint.impulse.linear.y;
                joint.impulse.linear.y += raw;
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, perp * raw);
            }

            if *enable_motor {
                let mass = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b, axis);
                let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(axis);
                let raw = -mass * (vn - *motor_speed);
                let max_impulse = *max_motor_force * h;
                let new_impulse = (joint.impulse.motor + raw).clamp(-max_impulse, max_impulse);
                let delta = new_impulse - joint.impulse.motor;
                joint.impulse.motor = new_impulse;
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * delta);
            }

            if *enable_limit {
                let mass = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b, axis);
                if translation <= *lower_translation {
                    let c = (translation - *lower_translation).min(0.0);
                    let bias = (c * inv_h).max(-4.0);
                    let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                    let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(axis);
                    let raw = (-mass * (vn + bias)).max(0.0);
                    joint.impulse.lower += raw;
                    apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * raw);
                } else if translation >= *upper_translation {
                    let c = (translation - *upper_translation).max(0.0);
                    let bias = (c * inv_h).min(4.0);
                    let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                    let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(axis);
                    let raw = (-mass * (vn + bias)).min(0.0);
                    joint.impulse.upper += raw;
                    apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * raw);
                }
            }

            // Angular lock: prismatic bodies never rotate relative to each other.
            let angular = {
                let k = sim_a.inverse_inertia + sim_b.inverse_inertia;
                if k > 0.0 { 1.0 / k } else { 0.0 }
            };
            let relative_angle = sim_a.transform.rotation.relative_angle(sim_b.transform.rotation);
            let bias = if use_bias { softness.bias_rate * relative_angle } else { 0.0 };
            let mass_scale = if use_bias { softness.mass_scale } else { 1.0 };
            let impulse_scale = if use_bias { softness.impulse_scale } else { 0.0 };
            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let cdot = state_b.angular_velocity - state_a.angular_velocity;
            let raw = -angular * mass_scale * (cdot + bias) - impulse_scale * joint.impulse.angular;
            joint.impulse.angular += raw;
            apply_angular_impulse(sim_a, state_a, sim_b, state_b, -raw);
        }

        JointType::Weld { linear_hertz, linear_damping_ratio, angular_hertz, angular_damping_ratio } => {
            let linear_softness = if *linear_hertz > 0.0 { Softness::new(*linear_hertz, *linear_damping_ratio, h) } else { softness };
            let angular_softness = if *angular_hertz > 0.0 { Softness::new(*angular_hertz, *angular_damping_ratio, h) } else { softness };

            let angular_mass = {
                let k = sim_a.inverse_inertia + sim_b.inverse_inertia;
                if k > 0.0 { 1.0 / k } else { 0.0 }
            };
            let relative_angle = sim_a.transform.rotation.relative_angle(sim_b.transform.rotation);
            let bias = angular_softness.bias_rate * relative_angle;
            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let cdot = state_b.angular_velocity - state_a.angular_velocity;
            let raw = -angular_mass * angular_softness.mass_scale * (cdot + bias) - angular_softness.impulse_scale * joint.impulse.angular;
            joint.impulse.angular += raw;
            apply_angular_impulse(sim_a, state_a, sim_b, state_b, -raw);

            let k = point_mass_matrix(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b);
            let k_inv = k.inverse();
            let point_a = sim_a.center_of_mass + anchor_a;
            let point_b = sim_b.center_of_mass + anchor_b;
            let c = point_b - point_a;
            let bias = c * linear_softness.bias_rate;
            let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
            let vn = point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a);
            let raw = k_inv.mul_vec2(-(vn + bias) * linear_softness.mass_scale) - joint.impulse.linear * linear_softness.impulse_scale;
            joint.impulse.linear += raw;
            apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, raw);
        }

        JointType::Wheel { local_axis_a, enable_spring, hertz, damping_ratio, enable_motor, motor_speed, max_motor_torque } => {
            let axis = sim_a.transform.rotation.apply(*local_axis_a);
            let perp = left_perp(axis);
            let point_a = sim_a.center_of_mass + anchor_a;
            let point_b = sim_b.center_of_mass + anchor_b;
            let delta = point_b - point_a;

            {
                let mass = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b, perp);
                let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(perp);
                let c = delta.dot(perp);
                let bias = if use_bias { softness.bias_rate * c } else { 0.0 };
                let mass_scale = if use_bias { softness.mass_scale } else { 1.0 };
                let impulse_scale = if use_bias { softness.impulse_scale } else { 0.0 };
                let raw = -mass * mass_scale * (vn + bias) - impulse_scale * joint.impulse.linear.y;
                joint.impulse.linear.y += raw;
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, perp * raw);
            }

            if *enable_spring {
                let spring_softness = Softness::new(*hertz, *damping_ratio, h);
                let mass = axial_mass(sim_a.inverse_mass, sim_a.inverse_inertia, anchor_a, sim_b.inverse_mass, sim_b.inverse_inertia, anchor_b, axis);
                let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                let vn = (point_velocity(state_b, anchor_b) - point_velocity(state_a, anchor_a)).dot(axis);
                let c = delta.dot(axis);
                let bias = spring_softness.bias_rate * c;
                let raw = -mass * spring_softness.mass_scale * (vn + bias) - spring_softness.impulse_scale * joint.impulse.spring;
                joint.impulse.spring += raw;
                apply_point_impulse(sim_a, state_a, anchor_a, sim_b, state_b, anchor_b, axis * raw);
            }

            if *enable_motor {
                let angular = {
                    let k = sim_a.inverse_inertia + sim_b.inverse_inertia;
                    if k > 0.0 { 1.0 / k } else { 0.0 }
                };
                let (state_a, state_b) = index_pair_mut(body_states, idx_a, idx_b);
                let cdot = state_b.angular_velocity - state_a.angular_velocity - *motor_speed;
                let raw = -angular * cdot;
                let max_impulse = *max_motor_torque * h;
                let new_impulse = (joint.impulse.motor + raw).clamp(-max_impulse, max_impulse);
                let delta = new_impulse - joint.impulse.motor;
                joint.impulse.motor = new_impulse;
                apply_angular_impulse(sim_a, state_a, sim_b, state_b, -delta);
            }
        }
    }
}

fn integrate_and_writeback(body_sims: &mut [BodySim], body_states: &mut [BodyState], h: f32) {
    let step = |sim: &mut BodySim, state: &mut BodyState| {
        if sim.is_static() {
            return;
        }
        let delta_position = state.linear_velocity * h;
        let delta_rotation = sim.transform.rotation.integrate(state.angular_velocity, h);
        sim.transform.position += delta_position;
        sim.center_of_mass += delta_position;
        sim.transform.rotation = delta_rotation;
        state.delta_position += delta_position;
        state.delta_rotation = delta_rotation;
    };

    #[cfg(feature = "parallel")]
    {
        body_sims
            .par_iter_mut()
            .zip(body_states.par_iter_mut())
            .for_each(|(sim, state)| step(sim, state));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (sim, state) in body_sims.iter_mut().zip(body_states.iter_mut()) {
            step(sim, state);
        }
    }
}

/// Runs the full `substepCount`-substep solve for one awake solver set,
/// mutating body transforms/velocities and contact/joint impulse caches in
/// place. Returns the contact points whose impulse rate crossed the
/// world's hit-event threshold, tagged with their index into `contacts`.
#[allow(clippy::too_many_arguments)]
pub fn solve_step(
    body_sims: &mut [BodySim],
    body_states: &mut [BodyState],
    contacts: &mut [ContactSim],
    contact_colors: &[usize],
    joints: &mut [JointSim],
    joint_colors: &[usize],
    world_def: &WorldDef,
    dt: f32,
) -> Vec<ContactHit> {
    let substep_count = world_def.substep_count.max(1);
    let h = dt / substep_count as f32;
    let inv_h = if h > 0.0 { 1.0 / h } else { 0.0 };

    let color_count = crate::dynamics::graph::OVERFLOW_COLOR + 1;
    let contact_buckets = build_color_buckets(contact_colors, color_count);
    let joint_buckets = build_color_buckets(joint_colors, color_count);

    let contact_softness = Softness::new(world_def.contact_hertz, world_def.contact_damping_ratio, h);
    let joint_softness = Softness::new(world_def.joint_hertz, world_def.joint_damping_ratio, h);

    let mut hits = Vec::new();

    for substep in 0..substep_count {
        apply_gravity_and_damping(body_sims, body_states, world_def.gravity, h);

        let prestep = precompute_prestep(contacts, body_sims, body_states);

        if world_def.enable_warm_starting {
            warm_start_contacts(contacts, body_sims, body_states);
        }

        for &use_bias in &[true, false] {
            for bucket in &contact_buckets {
                for &index in bucket {
                    let contact = &mut contacts[index];
                    if let Some(mut hit) = solve_contact(
                        contact,
                        &prestep[index],
                        body_sims,
                        body_states,
                        contact_softness,
                        use_bias,
                        substep == 0 && use_bias,
                        world_def.restitution_threshold,
                        inv_h,
                        world_def.hit_event_threshold,
                    ) {
                        hit.contact_index = index;
                        hits.push(hit);
                    }
                }
            }
            for bucket in &joint_buckets {
                for &index in bucket {
                    solve_joint(&mut joints[index], body_sims, body_states, joint_softness, use_bias, h, inv_h);
                }
            }
        }

        integrate_and_writeback(body_sims, body_states, h);
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform2;
    use crate::utils::allocator::Id;

    fn dynamic_sim(position: Vec2) -> BodySim {
        BodySim {
            body_id: Id::from_bits(1),
            transform: Transform2::new(position, crate::utils::math::Rot::IDENTITY),
            center_of_mass: position,
            inverse_mass: 1.0,
            inverse_inertia: 1.0,
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            min_extent: 0.5,
            is_bullet: false,
            is_fast: false,
            motion_locks: crate::core::body::MotionLocks::default(),
        }
    }

    fn static_sim(position: Vec2) -> BodySim {
        BodySim {
            body_id: Id::from_bits(2),
            transform: Transform2::new(position, crate::utils::math::Rot::IDENTITY),
            center_of_mass: position,
            inverse_mass: 0.0,
            inverse_inertia: 0.0,
            gravity_scale: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            min_extent: 0.5,
            is_bullet: false,
            is_fast: false,
            motion_locks: crate::core::body::MotionLocks::default(),
        }
    }

    #[test]
    fn free_falling_body_gains_downward_velocity_after_one_step() {
        let mut sims = vec![dynamic_sim(Vec2::new(0.0, 10.0))];
        let mut states = vec![BodyState::identity()];
        let world_def = WorldDef::new();

        let hits = solve_step(&mut sims, &mut states, &mut [], &[], &mut [], &[], &world_def, 1.0 / 60.0);

        assert!(states[0].linear_velocity.y < 0.0);
        assert!(sims[0].transform.position.y < 10.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn resting_contact_with_gravity_keeps_a_positive_normal_impulse() {
        use crate::collision::manifold::{Manifold, ManifoldPoint};

        let mut sims = vec![dynamic_sim(Vec2::new(0.0, 0.5)), static_sim(Vec2::new(0.0, 0.0))];
        let mut states = vec![BodyState::identity(), BodyState::identity()];

        let mut contacts = vec![ContactSim {
            contact_id: Id::from_bits(10),
            shape_a: Id::from_bits(20),
            shape_b: Id::from_bits(21),
            body_sim_index_a: 0,
            body_sim_index_b: 1,
            friction: 0.3,
            restitution: 0.0,
            rolling_resistance: 0.0,
            tangent_speed: 0.0,
            rolling_impulse: 0.0,
            manifold: Manifold {
                normal: Vec2::Y,
                points: vec![ManifoldPoint {
                    point: Vec2::new(0.0, 0.0),
                    separation: 0.0,
                    ..Default::default()
                }],
            },
        }];

        let world_def = WorldDef::new();
        solve_step(&mut sims, &mut states, &mut contacts, &[0], &mut [], &[], &world_def, 1.0 / 60.0);

        assert!(contacts[0].manifold.points[0].normal_impulse > 0.0);
        assert!(states[0].linear_velocity.y > -10.0);
    }
}
