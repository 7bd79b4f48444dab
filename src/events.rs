//! Event queues: four kinds of step-level notifications the caller drains
//! between steps. Each queue is double-buffered so events produced during
//! step N stay readable while step N+1 is already writing its own buffer;
//! `flip` swaps which half is "current" and clears the half that's about
//! to become the write target.

use glam::Vec2;

use crate::collision::contact::TouchingTransition;
use crate::utils::allocator::Id;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactBeginEvent {
    pub contact_id: Id,
    pub shape_a: Id,
    pub shape_b: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactEndEvent {
    pub contact_id: Id,
    pub shape_a: Id,
    pub shape_b: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactHitEvent {
    pub contact_id: Id,
    pub shape_a: Id,
    pub shape_b: Id,
    pub point: Vec2,
    pub normal: Vec2,
    pub approach_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorBeginEvent {
    pub sensor_shape: Id,
    pub visitor_shape: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorEndEvent {
    pub sensor_shape: Id,
    pub visitor_shape: Id,
}

#[derive(Debug, Default)]
struct DoubleBuffer<T> {
    buffers: [Vec<T>; 2],
    current: usize,
}

impl<T> DoubleBuffer<T> {
    fn new() -> Self {
        Self {
            buffers: [Vec::new(), Vec::new()],
            current: 0,
        }
    }

    fn push(&mut self, value: T) {
        self.buffers[self.current].push(value);
    }

    fn current(&self) -> &[T] {
        &self.buffers[self.current]
    }

    /// Flips the read/write halves and clears the new write half, so events
    /// pushed during the step that just finished remain readable until the
    /// next flip.
    fn flip(&mut self) {
        self.current ^= 1;
        self.buffers[self.current].clear();
    }
}

/// The world's four parallel event queues. Populated during `World::step`,
/// drained by the caller via the `*_events` accessors, and flipped once at
/// the end of every step.
#[derive(Debug, Default)]
pub struct EventQueues {
    contact_begin: DoubleBuffer<ContactBeginEvent>,
    contact_end: DoubleBuffer<ContactEndEvent>,
    contact_hit: DoubleBuffer<ContactHitEvent>,
    sensor_begin: DoubleBuffer<SensorBeginEvent>,
    sensor_end: DoubleBuffer<SensorEndEvent>,
}

impl EventQueues {
    pub fn new() -> Self {
        Self {
            contact_begin: DoubleBuffer::new(),
            contact_end: DoubleBuffer::new(),
            contact_hit: DoubleBuffer::new(),
            sensor_begin: DoubleBuffer::new(),
            sensor_end: DoubleBuffer::new(),
        }
    }

    /// Records a contact's touching-state transition as a Begin/End event.
    /// `StillTouching`/`StillNotTouching` produce nothing.
    pub fn record_touching_transition(
        &mut self,
        transition: TouchingTransition,
        contact_id: Id,
        shape_a: Id,
        shape_b: Id,
    ) {
        match transition {
            TouchingTransition::Began => {
                log::debug!("contact {contact_id:?} began touching");
                self.contact_begin.push(ContactBeginEvent {
                    contact_id,
                    shape_a,
                    shape_b,
                });
            }
            TouchingTransition::Ended => {
                log::debug!("contact {contact_id:?} stopped touching");
                self.contact_end.push(ContactEndEvent {
                    contact_id,
                    shape_a,
                    shape_b,
                });
            }
            TouchingTransition::StillTouching | TouchingTransition::StillNotTouching => {}
        }
    }

    pub fn record_hit(&mut self, event: ContactHitEvent) {
        self.contact_hit.push(event);
    }

    pub fn record_sensor_begin(&mut self, sensor_shape: Id, visitor_shape: Id) {
        self.sensor_begin.push(SensorBeginEvent {
            sensor_shape,
            visitor_shape,
        });
    }

    pub fn record_sensor_end(&mut self, sensor_shape: Id, visitor_shape: Id) {
        self.sensor_end.push(SensorEndEvent {
            sensor_shape,
            visitor_shape,
        });
    }

    pub fn contact_begin_events(&self) -> &[ContactBeginEvent] {
        self.contact_begin.current()
    }

    pub fn contact_end_events(&self) -> &[ContactEndEvent] {
        self.contact_end.current()
    }

    pub fn contact_hit_events(&self) -> &[ContactHitEvent] {
        self.contact_hit.current()
    }

    pub fn sensor_begin_events(&self) -> &[SensorBeginEvent] {
        self.sensor_begin.current()
    }

    pub fn sensor_end_events(&self) -> &[SensorEndEvent] {
        self.sensor_end.current()
    }

    /// Flips every queue's read/write half. Called once at the very end of
    /// `World::step`.
    pub fn flip(&mut self) {
        self.contact_begin.flip();
        self.contact_end.flip();
        self.contact_hit.flip();
        self.sensor_begin.flip();
        self.sensor_end.flip();
    }
}
