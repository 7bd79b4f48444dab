//! Sleep manager: accumulates per-body `sleepTime`, and puts an island to
//! sleep once every one of its bodies has stayed under the velocity
//! thresholds for `timeToSleep` seconds.

use glam::Vec2;

use crate::dynamics::solver_set::BodyState;

/// Per-body inputs the sleep manager needs; kept separate from [`BodyState`]
/// since `sleep_time` belongs to the logical `Body` record, not the
/// numeric per-substep row.
#[derive(Debug, Clone, Copy)]
pub struct SleepCandidate {
    pub sleep_time: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SleepManager {
    pub linear_tolerance_sq: f32,
    pub angular_tolerance: f32,
    pub time_to_sleep: f32,
}

impl SleepManager {
    pub fn new(linear_tolerance: f32, angular_tolerance: f32, time_to_sleep: f32) -> Self {
        Self {
            linear_tolerance_sq: linear_tolerance * linear_tolerance,
            angular_tolerance,
            time_to_sleep,
        }
    }

    /// Updates one body's `sleepTime` given its velocity this step:
    /// accumulate while under threshold, reset otherwise.
    pub fn update_sleep_time(&self, sleep_time: f32, state: &BodyState, dt: f32) -> f32 {
        let under_threshold = state.linear_velocity.length_squared() < self.linear_tolerance_sq
            && state.angular_velocity.abs() < self.angular_tolerance;
        if under_threshold {
            sleep_time + dt
        } else {
            0.0
        }
    }

    /// An island may sleep only once every one of its bodies has been under
    /// threshold for `timeToSleep` seconds.
    pub fn island_can_sleep(&self, bodies: &[SleepCandidate]) -> bool {
        !bodies.is_empty() && bodies.iter().all(|b| b.sleep_time >= self.time_to_sleep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_time_accumulates_while_slow() {
        let manager = SleepManager::new(0.01, 0.05, 0.5);
        let state = BodyState {
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            ..BodyState::identity()
        };
        let time = manager.update_sleep_time(0.3, &state, 1.0 / 60.0);
        assert!(time > 0.3);
    }

    #[test]
    fn sleep_time_resets_on_motion() {
        let manager = SleepManager::new(0.01, 0.05, 0.5);
        let state = BodyState {
            linear_velocity: Vec2::new(5.0, 0.0),
            angular_velocity: 0.0,
            ..BodyState::identity()
        };
        let time = manager.update_sleep_time(0.3, &state, 1.0 / 60.0);
        assert_eq!(time, 0.0);
    }

    #[test]
    fn island_sleeps_only_once_every_body_crosses_the_threshold() {
        let manager = SleepManager::new(0.01, 0.05, 0.5);
        let sleepy = SleepCandidate { sleep_time: 0.6, linear_velocity: Vec2::ZERO, angular_velocity: 0.0 };
        let awake = SleepCandidate { sleep_time: 0.1, linear_velocity: Vec2::ZERO, angular_velocity: 0.0 };

        assert!(manager.island_can_sleep(&[sleepy]));
        assert!(!manager.island_can_sleep(&[sleepy, awake]));
        assert!(!manager.island_can_sleep(&[]));
    }
}
