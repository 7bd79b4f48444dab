//! Step orchestrator: owns every arena and subsystem and sequences one
//! fixed-timestep `step` through broad phase, contact/joint lifecycle,
//! narrow phase, island/graph bookkeeping, the substep solver, continuous
//! collision, and sleep management, ending with an event-queue flip. Each
//! phase is timed with a `ScopedTimer` the way a fixed-timestep physics loop
//! typically instruments itself, feeding the per-step metrics snapshot.

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec2;

use crate::collision::broadphase::{self, Aabb, BroadPhase};
use crate::collision::ccd::{self, Sweep, ToiState};
use crate::collision::contact::{update_manifold, Contact, TouchingTransition};
use crate::collision::manifold;
use crate::collision::queries;
use crate::config::{WorldDef, DEFAULT_ANGULAR_SLEEP_TOLERANCE, DEFAULT_LINEAR_SLEEP_TOLERANCE};
use crate::core::body::{Body, BodyType};
use crate::core::joint::Joint;
use crate::core::shape::{Filter, Shape, ShapeFlags, ShapeType};
use crate::core::types::{Material, Transform2, Velocity2};
use crate::dynamics::graph::ConstraintGraph;
use crate::dynamics::island::IslandBuilder;
use crate::dynamics::sleep::{SleepCandidate, SleepManager};
use crate::dynamics::solver;
use crate::dynamics::solver_set::{BodySim, BodyState, ContactSim, JointSim, SolverSetId};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::{self, EventQueues};
use crate::utils::allocator::{Arena, Id};
use crate::utils::logging::{self, ScopedTimer};
use crate::utils::math::Rot;
use crate::utils::profiling::StepMetrics;

/// Owns every arena, subsystem, and piece of per-step bookkeeping. Created
/// via [`World::new`] or the fluent [`WorldBuilder`].
pub struct World {
    def: WorldDef,

    bodies: Arena<Body>,
    shapes: Arena<Shape>,
    contacts: Arena<Contact>,
    joints: Arena<Joint>,

    broad_phase: BroadPhase,
    islands: IslandBuilder,
    graph: ConstraintGraph,
    sleep: SleepManager,
    events: EventQueues,

    /// Shape-pair lookup into `contacts`, kept alongside the broad phase's
    /// own `pair_set` so a lost pair can be turned into a contact id in
    /// O(1) rather than scanning every live contact.
    contact_lookup: HashMap<(Id, Id), Id>,

    metrics: StepMetrics,
    locked: bool,
}

impl World {
    pub fn new(def: WorldDef) -> Self {
        let margin = def.speculative_distance().max(0.01) * 4.0;
        let sleep = SleepManager::new(
            DEFAULT_LINEAR_SLEEP_TOLERANCE,
            DEFAULT_ANGULAR_SLEEP_TOLERANCE,
            def.time_to_sleep,
        );
        Self {
            def,
            bodies: Arena::new(0),
            shapes: Arena::new(0),
            contacts: Arena::new(0),
            joints: Arena::new(0),
            broad_phase: BroadPhase::new(5.0, margin),
            islands: IslandBuilder::new(),
            graph: ConstraintGraph::new(),
            sleep,
            events: EventQueues::new(),
            contact_lookup: HashMap::new(),
            metrics: StepMetrics::default(),
            locked: false,
        }
    }

    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    pub fn def(&self) -> &WorldDef {
        &self.def
    }

    pub fn events(&self) -> &EventQueues {
        &self.events
    }

    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    pub fn bodies(&self) -> impl Iterator<Item = (Id, &Body)> {
        self.bodies.iter()
    }

    pub fn shapes(&self) -> impl Iterator<Item = (Id, &Shape)> {
        self.shapes.iter()
    }

    pub fn contacts(&self) -> impl Iterator<Item = (Id, &Contact)> {
        self.contacts.iter()
    }

    pub fn joints(&self) -> impl Iterator<Item = (Id, &Joint)> {
        self.joints.iter()
    }

    // ---- Body lifecycle ---------------------------------------------

    /// Inserts a body built via [`crate::core::body::Body::builder`] (pass
    /// `Id::NULL` to its `build`; the real id is patched in here).
    pub fn create_body(&mut self, mut body: Body) -> Id {
        body.set_index = match body.body_type {
            BodyType::Static => SolverSetId::Static.to_index(),
            _ => SolverSetId::Awake.to_index(),
        };
        let id = self.bodies.insert(body);
        self.bodies.get_mut(id).unwrap().id = id;
        id
    }

    /// Removes a body along with every shape, contact, and joint attached
    /// to it.
    pub fn destroy_body(&mut self, body_id: Id) -> bool {
        if !self.bodies.contains(body_id) {
            return false;
        }
        let shape_ids: Vec<Id> = self
            .shapes
            .iter()
            .filter(|(_, s)| s.body_id == body_id)
            .map(|(id, _)| id)
            .collect();
        for shape_id in shape_ids {
            self.destroy_shape(shape_id);
        }
        let joint_ids: Vec<Id> = self
            .joints
            .iter()
            .filter(|(_, j)| j.body_a == body_id || j.body_b == body_id)
            .map(|(id, _)| id)
            .collect();
        for joint_id in joint_ids {
            self.destroy_joint(joint_id);
        }
        self.islands.remove_body(body_id);
        self.bodies.remove(body_id);
        true
    }

    pub fn body_transform(&self, body_id: Id) -> Option<Transform2> {
        self.bodies.get(body_id).map(|b| b.transform)
    }

    pub fn body_velocity(&self, body_id: Id) -> Option<Velocity2> {
        self.bodies.get(body_id).map(|b| b.velocity)
    }

    pub fn set_body_transform(&mut self, body_id: Id, transform: Transform2) -> bool {
        let is_static = match self.bodies.get_mut(body_id) {
            Some(body) => {
                body.transform = transform;
                body.body_type == BodyType::Static
            }
            None => return false,
        };
        if !is_static {
            self.wake_body(body_id);
        }
        true
    }

    pub fn set_body_velocity(&mut self, body_id: Id, velocity: Velocity2) -> bool {
        let is_static = match self.bodies.get_mut(body_id) {
            Some(body) => {
                body.velocity = velocity;
                body.body_type == BodyType::Static
            }
            None => return false,
        };
        if !is_static {
            self.wake_body(body_id);
        }
        true
    }

    /// Forces a body back into the awake set, resetting its accumulated
    /// sleep timer, then wakes every other body sharing its island so a
    /// disturbance (new contact, velocity/transform set, joint mutation)
    /// can't leave the rest of a sleeping stack behind.
    pub fn wake_body(&mut self, body_id: Id) {
        let was_static = matches!(self.bodies.get(body_id), Some(body) if body.body_type == BodyType::Static);
        if was_static {
            return;
        }
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.set_index = SolverSetId::Awake.to_index();
            body.sleep_time = 0.0;
        }

        if let Some(island_id) = self.islands.island_of_body(body_id) {
            let island_bodies: Vec<Id> = self.islands.get(island_id).map(|i| i.body_ids.clone()).unwrap_or_default();
            for other_id in island_bodies {
                if let Some(other) = self.bodies.get_mut(other_id) {
                    if other.body_type != BodyType::Static {
                        other.set_index = SolverSetId::Awake.to_index();
                        other.sleep_time = 0.0;
                    }
                }
            }
        }
    }

    pub fn is_body_awake(&self, body_id: Id) -> bool {
        self.body_is_active(body_id)
    }

    fn body_is_active(&self, body_id: Id) -> bool {
        matches!(
            self.bodies.get(body_id).map(|b| SolverSetId::from_index(b.set_index)),
            Some(SolverSetId::Awake)
        )
    }

    fn island_key(&self, body_id: Id) -> Option<Id> {
        match self.bodies.get(body_id) {
            Some(b) if b.body_type != BodyType::Static => Some(body_id),
            _ => None,
        }
    }

    /// A pair only reports contact-begin/end events when both shapes opt
    /// in, matching `enableContactEvents`'s per-shape-AND combination.
    fn shape_pair_wants_contact_events(&self, shape_a_id: Id, shape_b_id: Id) -> bool {
        let a = self.shapes.get(shape_a_id).map(|s| s.flags.enable_contact_events).unwrap_or(false);
        let b = self.shapes.get(shape_b_id).map(|s| s.flags.enable_contact_events).unwrap_or(false);
        a && b
    }

    /// A pair only reports a hard-hit event when both shapes opt in,
    /// matching `enableHitEvents`'s per-shape-AND combination.
    fn shape_pair_wants_hit_events(&self, shape_a_id: Id, shape_b_id: Id) -> bool {
        let a = self.shapes.get(shape_a_id).map(|s| s.flags.enable_hit_events).unwrap_or(false);
        let b = self.shapes.get(shape_b_id).map(|s| s.flags.enable_hit_events).unwrap_or(false);
        a && b
    }

    // ---- Shape lifecycle ----------------------------------------------

    pub fn create_shape(
        &mut self,
        body_id: Id,
        shape_type: ShapeType,
        local_transform: Transform2,
        material: Material,
        filter: Filter,
        is_sensor: bool,
    ) -> PhysicsResult<Id> {
        let body = self
            .bodies
            .get(body_id)
            .ok_or(PhysicsError::InvalidArgument("create_shape: body does not exist"))?;
        let is_static = body.body_type == BodyType::Static;
        let world_transform = body.transform.combine(&local_transform);
        let tight = broadphase::shape_aabb(&shape_type, &world_transform);

        let shape = Shape {
            id: Id::NULL,
            body_id,
            shape_type,
            local_transform,
            material,
            filter,
            is_sensor,
            flags: ShapeFlags::default(),
            head_contact_key: None,
        };
        let shape_id = self.shapes.insert(shape);
        self.shapes.get_mut(shape_id).unwrap().id = shape_id;
        self.broad_phase.create_proxy(shape_id, body_id, tight, filter, is_static);
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.head_shape_id = Some(shape_id);
        }
        Ok(shape_id)
    }

    /// Overrides a shape's default event-emission flags (contact events on,
    /// hit/pre-solve events off, no sensor index) after creation.
    pub fn set_shape_flags(&mut self, shape_id: Id, flags: ShapeFlags) -> bool {
        match self.shapes.get_mut(shape_id) {
            Some(shape) => {
                shape.flags = flags;
                true
            }
            None => false,
        }
    }

    pub fn shape_flags(&self, shape_id: Id) -> Option<ShapeFlags> {
        self.shapes.get(shape_id).map(|shape| shape.flags)
    }

    pub fn destroy_shape(&mut self, shape_id: Id) -> bool {
        let Some(shape) = self.shapes.remove(shape_id) else {
            return false;
        };
        self.broad_phase.destroy_proxy(shape_id);
        let contact_ids: Vec<Id> = self
            .contacts
            .iter()
            .filter(|(_, c)| c.shape_a == shape_id || c.shape_b == shape_id)
            .map(|(id, _)| id)
            .collect();
        for contact_id in contact_ids {
            self.destroy_contact(contact_id);
        }
        if let Some(body) = self.bodies.get_mut(shape.body_id) {
            if body.head_shape_id == Some(shape_id) {
                body.head_shape_id = None;
            }
        }
        true
    }

    // ---- Joint lifecycle ------------------------------------------------

    pub fn create_joint(&mut self, joint: Joint) -> Id {
        let body_a = joint.body_a;
        let body_b = joint.body_b;
        let id = self.joints.insert(joint);
        self.joints.get_mut(id).unwrap().id = id;
        let key_a = self.island_key(body_a);
        let key_b = self.island_key(body_b);
        self.islands.link_joint(key_a, key_b, id);
        id
    }

    pub fn destroy_joint(&mut self, joint_id: Id) -> bool {
        let Some(joint) = self.joints.remove(joint_id) else {
            return false;
        };
        if let Some(island_id) = self
            .islands
            .island_of_body(joint.body_a)
            .or_else(|| self.islands.island_of_body(joint.body_b))
        {
            self.islands.unlink_constraint(island_id, joint_id);
            self.islands.maybe_split(island_id);
        }
        true
    }

    // ---- Spatial queries ------------------------------------------------

    pub fn raycast_closest(&self, query: &queries::RaycastQuery) -> Option<queries::RaycastHit> {
        queries::raycast_closest(query, &self.shapes, |body_id| {
            self.body_transform(body_id).unwrap_or_default()
        })
    }

    pub fn raycast(&self, query: &queries::RaycastQuery, visitor: impl FnMut(queries::RaycastHit) -> bool) {
        queries::raycast(
            query,
            &self.shapes,
            |body_id| self.body_transform(body_id).unwrap_or_default(),
            visitor,
        );
    }

    pub fn overlap_aabb(&self, aabb: Aabb, filter: Filter, visitor: impl FnMut(Id) -> bool) {
        queries::overlap_aabb(
            aabb,
            filter,
            &self.shapes,
            |body_id| self.body_transform(body_id).unwrap_or_default(),
            visitor,
        );
    }

    pub fn overlap_shape(
        &self,
        probe: &ShapeType,
        probe_transform: Transform2,
        filter: Filter,
        visitor: impl FnMut(Id) -> bool,
    ) {
        queries::overlap_shape(
            probe,
            &probe_transform,
            filter,
            &self.shapes,
            |body_id| self.body_transform(body_id).unwrap_or_default(),
            visitor,
        );
    }

    // ---- Contact lifecycle helpers --------------------------------------

    fn create_contact_for_shapes(&mut self, shape_a_id: Id, shape_b_id: Id) {
        let (Some(shape_a), Some(shape_b)) = (self.shapes.get(shape_a_id), self.shapes.get(shape_b_id)) else {
            return;
        };
        let body_a = shape_a.body_id;
        let body_b = shape_b.body_id;
        let is_sensor = shape_a.is_sensor || shape_b.is_sensor;
        let props = Material::combine_pair(&shape_a.material, &shape_b.material);
        let friction = match &self.def.friction_callback {
            Some(callback) => callback(shape_a_id, &shape_a.material, shape_b_id, &shape_b.material),
            None => props.friction,
        };
        let restitution = match &self.def.restitution_callback {
            Some(callback) => callback(shape_a_id, &shape_a.material, shape_b_id, &shape_b.material),
            None => props.restitution,
        };

        let enable_pre_solve = shape_a.flags.enable_pre_solve_events || shape_b.flags.enable_pre_solve_events;

        let contact = Contact::new(
            Id::NULL,
            shape_a_id,
            shape_b_id,
            body_a,
            body_b,
            friction,
            restitution,
            props.rolling_resistance,
            props.tangent_speed,
            is_sensor,
            enable_pre_solve,
        );
        let contact_id = self.contacts.insert(contact);
        self.contacts.get_mut(contact_id).unwrap().id = contact_id;
        self.contact_lookup.insert(order_pair(shape_a_id, shape_b_id), contact_id);
    }

    fn destroy_contact_for_shapes(&mut self, shape_a_id: Id, shape_b_id: Id) {
        if let Some(contact_id) = self.contact_lookup.remove(&order_pair(shape_a_id, shape_b_id)) {
            self.destroy_contact(contact_id);
        }
    }

    fn destroy_contact(&mut self, contact_id: Id) {
        let Some(contact) = self.contacts.remove(contact_id) else {
            return;
        };
        self.contact_lookup.remove(&order_pair(contact.shape_a, contact.shape_b));
        if contact.flags.touching && !contact.flags.is_sensor {
            if self.shape_pair_wants_contact_events(contact.shape_a, contact.shape_b) {
                self.events
                    .record_touching_transition(TouchingTransition::Ended, contact.id, contact.shape_a, contact.shape_b);
            }
            if let Some(island_id) = self
                .islands
                .island_of_body(contact.body_a)
                .or_else(|| self.islands.island_of_body(contact.body_b))
            {
                self.islands.unlink_constraint(island_id, contact.id);
                self.islands.maybe_split(island_id);
            }
        }
    }

    // ---- Step phases ------------------------------------------------

    fn sync_broad_phase_proxies(&mut self) {
        let updates: Vec<(Id, Aabb)> = self
            .shapes
            .iter()
            .filter_map(|(shape_id, shape)| {
                let body_transform = self.bodies.get(shape.body_id)?.transform;
                let world_transform = shape.world_transform(&body_transform);
                Some((shape_id, broadphase::shape_aabb(&shape.shape_type, &world_transform)))
            })
            .collect();
        for (shape_id, aabb) in updates {
            self.broad_phase.update_proxy(shape_id, aabb);
        }
    }

    fn update_narrow_phase(&mut self) {
        let distance = self.def.speculative_distance();
        let contact_ids: Vec<Id> = self.contacts.iter().map(|(id, _)| id).collect();

        for contact_id in contact_ids {
            let (shape_a_id, shape_b_id, body_a, body_b, is_sensor) = {
                let Some(contact) = self.contacts.get(contact_id) else {
                    continue;
                };
                (contact.shape_a, contact.shape_b, contact.body_a, contact.body_b, contact.flags.is_sensor)
            };

            if !self.body_is_active(body_a) && !self.body_is_active(body_b) {
                continue;
            }

            let (Some(shape_a), Some(shape_b)) = (self.shapes.get(shape_a_id), self.shapes.get(shape_b_id)) else {
                continue;
            };
            let transform_a = shape_a.world_transform(&self.bodies.get(body_a).map(|b| b.transform).unwrap_or_default());
            let transform_b = shape_b.world_transform(&self.bodies.get(body_b).map(|b| b.transform).unwrap_or_default());

            if is_sensor {
                let touching = manifold::collide(&shape_a.shape_type, &transform_a, &shape_b.shape_type, &transform_b, 0.0)
                    .map(|m| m.points.iter().any(|p| p.separation <= 0.0))
                    .unwrap_or(false);
                let was_touching = self.contacts.get(contact_id).map(|c| c.flags.touching).unwrap_or(false);
                if let Some(contact) = self.contacts.get_mut(contact_id) {
                    contact.flags.touching = touching;
                }
                match (was_touching, touching) {
                    (false, true) => self.events.record_sensor_begin(shape_a_id, shape_b_id),
                    (true, false) => self.events.record_sensor_end(shape_a_id, shape_b_id),
                    _ => {}
                }
                continue;
            }

            let new_manifold = manifold::collide(&shape_a.shape_type, &transform_a, &shape_b.shape_type, &transform_b, distance)
                .unwrap_or_default();

            let props = Material::combine_pair(&shape_a.material, &shape_b.material);
            let friction = match &self.def.friction_callback {
                Some(callback) => callback(shape_a_id, &shape_a.material, shape_b_id, &shape_b.material),
                None => props.friction,
            };
            let restitution = match &self.def.restitution_callback {
                Some(callback) => callback(shape_a_id, &shape_a.material, shape_b_id, &shape_b.material),
                None => props.restitution,
            };

            let transition = {
                let contact = self.contacts.get_mut(contact_id).unwrap();
                contact.friction = friction;
                contact.restitution = restitution;
                contact.rolling_resistance = props.rolling_resistance;
                contact.tangent_speed = props.tangent_speed;
                update_manifold(contact, new_manifold)
            };
            if self.shape_pair_wants_contact_events(shape_a_id, shape_b_id) {
                self.events.record_touching_transition(transition, contact_id, shape_a_id, shape_b_id);
            }

            match transition {
                TouchingTransition::Began => {
                    self.wake_body(body_a);
                    self.wake_body(body_b);
                    let key_a = self.island_key(body_a);
                    let key_b = self.island_key(body_b);
                    self.islands.link_contact(key_a, key_b, contact_id);
                }
                TouchingTransition::Ended => {
                    if let Some(island_id) = self.islands.island_of_body(body_a).or_else(|| self.islands.island_of_body(body_b)) {
                        self.islands.unlink_constraint(island_id, contact_id);
                        self.islands.maybe_split(island_id);
                    }
                }
                _ => {}
            }
        }
    }

    fn compute_all_masses(&self) -> HashMap<Id, (f32, f32, Vec2, f32)> {
        let mut out = HashMap::new();
        for (body_id, body) in self.bodies.iter() {
            if body.body_type != BodyType::Dynamic {
                continue;
            }
            let mut mass = 0.0f32;
            let mut center = Vec2::ZERO;
            let mut inertia = 0.0f32;
            let mut min_extent = f32::MAX;
            for (_, shape) in self.shapes.iter().filter(|(_, s)| s.body_id == body_id) {
                let (shape_mass, local_centroid, inertia_about_centroid) = shape.compute_mass();
                let world_local_centroid = shape.local_transform.apply(local_centroid);
                if shape_mass > 0.0 {
                    mass += shape_mass;
                    center += world_local_centroid * shape_mass;
                    inertia += inertia_about_centroid + shape_mass * world_local_centroid.length_squared();
                }
                min_extent = min_extent.min(shape_extent_metric(&shape.shape_type));
            }
            if mass > 0.0 {
                center /= mass;
                inertia -= mass * center.length_squared();
            } else {
                mass = 1.0;
                inertia = 1.0;
            }
            if body.flags.fixed_rotation {
                inertia = 0.0;
            }
            if min_extent == f32::MAX {
                min_extent = 1.0;
            }
            let inverse_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
            let inverse_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
            out.insert(body_id, (inverse_mass, inverse_inertia, center, min_extent));
        }
        out
    }

    fn solve_awake_set(&mut self, dt: f32) -> Vec<events::ContactHitEvent> {
        self.graph.clear();
        let mass_cache = self.compute_all_masses();

        let mut body_index: HashMap<Id, u32> = HashMap::new();
        let mut body_sims: Vec<BodySim> = Vec::new();
        let mut body_states: Vec<BodyState> = Vec::new();

        let touching_contacts: Vec<Id> = self
            .contacts
            .iter()
            .filter(|(_, c)| c.flags.touching && !c.flags.is_sensor)
            .filter(|(_, c)| self.body_is_active(c.body_a) || self.body_is_active(c.body_b))
            .filter(|(id, c)| match &self.def.pre_solve_callback {
                Some(callback) if c.flags.enable_pre_solve => callback(*id, &c.manifold),
                _ => true,
            })
            .map(|(id, _)| id)
            .collect();

        let active_joints: Vec<Id> = self
            .joints
            .iter()
            .filter(|(_, j)| self.body_is_active(j.body_a) || self.body_is_active(j.body_b))
            .map(|(id, _)| id)
            .collect();

        let mut contact_sims = Vec::with_capacity(touching_contacts.len());
        let mut contact_colors = Vec::with_capacity(touching_contacts.len());

        for &contact_id in &touching_contacts {
            let contact = self.contacts.get(contact_id).unwrap();
            let idx_a = ensure_body_row(&self.bodies, &mass_cache, &mut body_index, &mut body_sims, &mut body_states, contact.body_a);
            let idx_b = ensure_body_row(&self.bodies, &mass_cache, &mut body_index, &mut body_sims, &mut body_states, contact.body_b);
            let key_a = self.island_key(contact.body_a);
            let key_b = self.island_key(contact.body_b);
            let color = self.graph.assign(key_a, key_b);
            contact_colors.push(color);
            contact_sims.push(ContactSim {
                contact_id,
                shape_a: contact.shape_a,
                shape_b: contact.shape_b,
                body_sim_index_a: idx_a,
                body_sim_index_b: idx_b,
                friction: contact.friction,
                restitution: contact.restitution,
                rolling_resistance: contact.rolling_resistance,
                tangent_speed: contact.tangent_speed,
                rolling_impulse: 0.0,
                manifold: contact.manifold.clone(),
            });
        }

        let mut joint_sims = Vec::with_capacity(active_joints.len());
        let mut joint_colors = Vec::with_capacity(active_joints.len());

        for &joint_id in &active_joints {
            let joint = self.joints.get(joint_id).unwrap();
            let idx_a = ensure_body_row(&self.bodies, &mass_cache, &mut body_index, &mut body_sims, &mut body_states, joint.body_a);
            let idx_b = ensure_body_row(&self.bodies, &mass_cache, &mut body_index, &mut body_sims, &mut body_states, joint.body_b);
            let key_a = self.island_key(joint.body_a);
            let key_b = self.island_key(joint.body_b);
            let color = self.graph.assign(key_a, key_b);
            joint_colors.push(color);
            joint_sims.push(JointSim {
                joint_id,
                body_sim_index_a: idx_a,
                body_sim_index_b: idx_b,
                joint_type: joint.joint_type.clone(),
                frame_a: joint.frame_a,
                frame_b: joint.frame_b,
                impulse: joint.impulse,
            });
        }

        let hits = solver::solve_step(
            &mut body_sims,
            &mut body_states,
            &mut contact_sims,
            &contact_colors,
            &mut joint_sims,
            &joint_colors,
            &self.def,
            dt,
        );

        for (&body_id, &index) in body_index.iter() {
            let sim = &body_sims[index as usize];
            let state = &body_states[index as usize];
            if let Some(body) = self.bodies.get_mut(body_id) {
                if body.body_type == BodyType::Dynamic {
                    body.transform = sim.transform;
                    body.velocity = Velocity2 {
                        linear: state.linear_velocity,
                        angular: state.angular_velocity,
                    };
                }
            }
        }
        for sim in &contact_sims {
            if let Some(contact) = self.contacts.get_mut(sim.contact_id) {
                contact.manifold = sim.manifold.clone();
            }
        }
        for sim in &joint_sims {
            if let Some(joint) = self.joints.get_mut(sim.joint_id) {
                joint.impulse = sim.impulse;
            }
        }

        self.metrics.body_count = body_sims.len();
        self.metrics.contacts_solved = contact_sims.len();
        self.metrics.colors_used = self.graph.color_count();
        self.metrics.overflow_contact_count =
            contact_colors.iter().filter(|&&c| ConstraintGraph::is_overflow(c)).count();
        self.metrics.awake_island_count = self.islands.islands().count();

        hits.into_iter()
            .filter_map(|hit| {
                let contact_sim = contact_sims.get(hit.contact_index)?;
                if !self.shape_pair_wants_hit_events(contact_sim.shape_a, contact_sim.shape_b) {
                    return None;
                }
                Some(events::ContactHitEvent {
                    contact_id: contact_sim.contact_id,
                    shape_a: contact_sim.shape_a,
                    shape_b: contact_sim.shape_b,
                    point: hit.point,
                    normal: hit.normal,
                    approach_speed: hit.approach_speed,
                })
            })
            .collect()
    }

    fn integrate_kinematic_bodies(&mut self, dt: f32) {
        for (_, body) in self.bodies.iter_mut() {
            if body.body_type == BodyType::Kinematic {
                body.transform.position += body.velocity.linear * dt;
                body.transform.rotation = body.transform.rotation.integrate(body.velocity.angular, dt);
            }
        }
    }

    fn min_extent_for_body(&self, body_id: Id) -> f32 {
        let mut min_extent = f32::MAX;
        for (_, shape) in self.shapes.iter().filter(|(_, s)| s.body_id == body_id) {
            min_extent = min_extent.min(shape_extent_metric(&shape.shape_type));
        }
        if min_extent == f32::MAX {
            1.0
        } else {
            min_extent
        }
    }

    /// Sweeps every dynamic body whose displacement this step qualifies as
    /// "fast" against every other live shape, clipping its final transform
    /// back to the earliest time of impact found. Other
    /// bodies are treated as stationary for the duration of the sweep, a
    /// simplification that still prevents tunneling through the rest of
    /// the world.
    fn run_continuous_collision(&mut self, old_transforms: &HashMap<Id, Transform2>) {
        if !self.def.enable_continuous {
            return;
        }

        let candidates: Vec<Id> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.body_type == BodyType::Dynamic)
            .filter_map(|(id, b)| {
                let old = old_transforms.get(&id)?;
                let displacement = b.transform.position - old.position;
                let angular = old.rotation.relative_angle(b.transform.rotation);
                let min_extent = self.min_extent_for_body(id);
                if b.flags.is_bullet || ccd::is_fast_body(displacement, angular, min_extent) {
                    Some(id)
                } else {
                    None
                }
            })
            .collect();

        for body_id in candidates {
            self.sweep_body_against_world(body_id, old_transforms);
        }
    }

    fn sweep_body_against_world(&mut self, body_id: Id, old_transforms: &HashMap<Id, Transform2>) {
        let Some(old_transform) = old_transforms.get(&body_id).copied() else {
            return;
        };
        let Some(new_transform) = self.bodies.get(body_id).map(|b| b.transform) else {
            return;
        };

        let moving_shapes: Vec<(ShapeType, Transform2, Transform2, Filter)> = self
            .shapes
            .iter()
            .filter(|(_, s)| s.body_id == body_id)
            .map(|(_, s)| {
                (
                    s.shape_type.clone(),
                    old_transform.combine(&s.local_transform),
                    new_transform.combine(&s.local_transform),
                    s.filter,
                )
            })
            .collect();

        let other_shapes: Vec<(ShapeType, Transform2, Filter)> = self
            .shapes
            .iter()
            .filter(|(_, s)| s.body_id != body_id)
            .map(|(_, s)| {
                let body_transform = self.bodies.get(s.body_id).map(|b| b.transform).unwrap_or_default();
                (s.shape_type.clone(), s.world_transform(&body_transform), s.filter)
            })
            .collect();

        let mut earliest: Option<f32> = None;
        for (shape_type, t0, t1, filter) in &moving_shapes {
            let moving_sweep = Sweep {
                shape_type: shape_type.clone(),
                transform0: *t0,
                transform1: *t1,
            };
            for (other_type, other_transform, other_filter) in &other_shapes {
                if !filter.should_collide(other_filter) {
                    continue;
                }
                let stationary_sweep = Sweep {
                    shape_type: other_type.clone(),
                    transform0: *other_transform,
                    transform1: *other_transform,
                };
                let slop = self.def.linear_slop;
                if let ToiState::Hit { t } = ccd::compute_toi(&moving_sweep, &stationary_sweep, slop, 0.25 * slop, 20) {
                    earliest = Some(earliest.map_or(t, |best: f32| best.min(t)));
                }
            }
        }

        if let Some(t) = earliest {
            if let Some(body) = self.bodies.get_mut(body_id) {
                let relative_angle = old_transform.rotation.relative_angle(new_transform.rotation);
                body.transform = Transform2 {
                    position: old_transform.position.lerp(new_transform.position, t),
                    rotation: old_transform.rotation.mul(Rot::from_angle(relative_angle * t)),
                };
            }
        }
    }

    fn update_sleep(&mut self, dt: f32) {
        if !self.def.enable_sleep {
            return;
        }

        let awake_dynamic_ids: Vec<Id> = self
            .bodies
            .iter()
            .filter(|(_, b)| {
                b.body_type == BodyType::Dynamic && matches!(SolverSetId::from_index(b.set_index), SolverSetId::Awake)
            })
            .map(|(id, _)| id)
            .collect();

        for body_id in &awake_dynamic_ids {
            if let Some(body) = self.bodies.get_mut(*body_id) {
                if !body.flags.enable_sleep {
                    body.sleep_time = 0.0;
                    continue;
                }
                let candidate_state = BodyState {
                    linear_velocity: body.velocity.linear,
                    angular_velocity: body.velocity.angular,
                    ..BodyState::identity()
                };
                body.sleep_time = self.sleep.update_sleep_time(body.sleep_time, &candidate_state, dt);
            }
        }

        let island_ids: Vec<Id> = self.islands.islands().map(|(id, _)| id).collect();
        for island_id in island_ids {
            let Some(island) = self.islands.get(island_id) else {
                continue;
            };
            let candidates: Vec<SleepCandidate> = island
                .body_ids
                .iter()
                .filter_map(|&body_id| {
                    let body = self.bodies.get(body_id)?;
                    if body.body_type != BodyType::Dynamic || !body.flags.enable_sleep {
                        return None;
                    }
                    Some(SleepCandidate {
                        sleep_time: body.sleep_time,
                        linear_velocity: body.velocity.linear,
                        angular_velocity: body.velocity.angular,
                    })
                })
                .collect();

            if candidates.is_empty() || !self.sleep.island_can_sleep(&candidates) {
                continue;
            }
            let body_ids = island.body_ids.clone();
            for body_id in body_ids {
                if let Some(body) = self.bodies.get_mut(body_id) {
                    body.set_index = SolverSetId::Sleeping(0).to_index();
                }
            }
        }
    }

    /// Advances the simulation by `dt` seconds, running every phase of the
    /// pipeline once. Returns [`PhysicsError::Locked`] if called
    /// re-entrantly (e.g. from within an event callback).
    pub fn step(&mut self, dt: f32) -> PhysicsResult<()> {
        if self.locked {
            return Err(PhysicsError::Locked);
        }
        self.locked = true;
        self.metrics.reset();
        let step_start = Instant::now();

        {
            let _timer = ScopedTimer::new("sync_broad_phase");
            self.sync_broad_phase_proxies();
        }

        let bp_start = Instant::now();
        let (new_pairs, removed_pairs) = {
            let _timer = ScopedTimer::new("broad_phase");
            self.broad_phase.find_new_pairs()
        };
        self.metrics.broad_phase_time = bp_start.elapsed();

        for (shape_a, shape_b) in removed_pairs {
            self.destroy_contact_for_shapes(shape_a, shape_b);
        }
        for (shape_a, shape_b) in new_pairs {
            let accepted = match &self.def.custom_filter_callback {
                Some(callback) => callback(shape_a, shape_b),
                None => true,
            };
            if accepted {
                self.create_contact_for_shapes(shape_a, shape_b);
            }
        }

        let np_start = Instant::now();
        {
            let _timer = ScopedTimer::new("narrow_phase");
            self.update_narrow_phase();
        }
        self.metrics.narrow_phase_time = np_start.elapsed();

        let old_transforms: HashMap<Id, Transform2> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.body_type == BodyType::Dynamic)
            .map(|(id, b)| (id, b.transform))
            .collect();

        let solve_start = Instant::now();
        let hit_events = {
            let _timer = ScopedTimer::new("solve");
            self.solve_awake_set(dt)
        };
        self.metrics.solver_time = solve_start.elapsed();
        for event in hit_events {
            self.events.record_hit(event);
        }

        let integrate_start = Instant::now();
        {
            let _timer = ScopedTimer::new("integrate_and_ccd");
            self.integrate_kinematic_bodies(dt);
            self.run_continuous_collision(&old_transforms);
        }
        self.metrics.integrate_time = integrate_start.elapsed();

        self.update_sleep(dt);

        self.metrics.total_step_time = step_start.elapsed();
        if self.def.step_metrics_logging {
            self.metrics.log_debug();
        }
        logging::warn_if_frame_budget_exceeded(self.metrics.total_step_time, 1000.0 / 30.0);

        self.events.flip();
        self.locked = false;
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        World::new(WorldDef::default())
    }
}

/// Fluent builder for [`World`], mirroring [`crate::core::body::BodyBuilder`]'s
/// consuming-`self` style.
#[derive(Default)]
pub struct WorldBuilder {
    def: WorldDef,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self { def: WorldDef::new() }
    }

    pub fn gravity(mut self, gravity: Vec2) -> Self {
        self.def = self.def.with_gravity(gravity);
        self
    }

    pub fn substep_count(mut self, count: u32) -> Self {
        self.def = self.def.with_substep_count(count);
        self
    }

    pub fn sleep_enabled(mut self, enabled: bool) -> Self {
        self.def = self.def.with_sleep_enabled(enabled);
        self
    }

    pub fn continuous_enabled(mut self, enabled: bool) -> Self {
        self.def = self.def.with_continuous_enabled(enabled);
        self
    }

    pub fn step_metrics_logging(mut self, enabled: bool) -> Self {
        self.def = self.def.with_step_metrics_logging(enabled);
        self
    }

    pub fn friction_callback(mut self, callback: crate::config::MixCallback) -> Self {
        self.def = self.def.with_friction_callback(callback);
        self
    }

    pub fn restitution_callback(mut self, callback: crate::config::MixCallback) -> Self {
        self.def = self.def.with_restitution_callback(callback);
        self
    }

    pub fn pre_solve_callback(mut self, callback: crate::config::PreSolveCallback) -> Self {
        self.def = self.def.with_pre_solve_callback(callback);
        self
    }

    pub fn custom_filter_callback(mut self, callback: crate::config::CustomFilterCallback) -> Self {
        self.def = self.def.with_custom_filter_callback(callback);
        self
    }

    pub fn build(self) -> World {
        World::new(self.def)
    }
}

fn order_pair(a: Id, b: Id) -> (Id, Id) {
    if a.to_bits() < b.to_bits() {
        (a, b)
    } else {
        (b, a)
    }
}

fn shape_extent_metric(shape_type: &ShapeType) -> f32 {
    let (lo, hi) = shape_type.local_bounds();
    let size = hi - lo;
    (size.x.min(size.y) * 0.5).max(1e-3)
}

#[allow(clippy::too_many_arguments)]
fn ensure_body_row(
    bodies: &Arena<Body>,
    mass_cache: &HashMap<Id, (f32, f32, Vec2, f32)>,
    body_index: &mut HashMap<Id, u32>,
    body_sims: &mut Vec<BodySim>,
    body_states: &mut Vec<BodyState>,
    body_id: Id,
) -> u32 {
    if let Some(&idx) = body_index.get(&body_id) {
        return idx;
    }
    let body = bodies
        .get(body_id)
        .expect("a contact/joint referenced a body that no longer exists");
    let (inverse_mass, inverse_inertia, local_center, min_extent) =
        mass_cache.get(&body_id).copied().unwrap_or((0.0, 0.0, Vec2::ZERO, 1.0));
    let sim = BodySim {
        body_id,
        transform: body.transform,
        center_of_mass: body.transform.apply(local_center),
        inverse_mass,
        inverse_inertia,
        gravity_scale: body.gravity_scale,
        linear_damping: body.linear_damping,
        angular_damping: body.angular_damping,
        min_extent,
        is_bullet: body.flags.is_bullet,
        is_fast: false,
        motion_locks: body.flags.motion_locks,
    };
    let state = BodyState {
        linear_velocity: body.velocity.linear,
        angular_velocity: body.velocity.angular,
        ..BodyState::identity()
    };
    let index = body_sims.len() as u32;
    body_sims.push(sim);
    body_states.push(state);
    body_index.insert(body_id, index);
    index
}
