use std::time::Duration;

/// Per-step timing and topology counters, reported via `log::debug!` when a
/// world's `step_metrics_logging` flag is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepMetrics {
    pub broad_phase_time: Duration,
    pub narrow_phase_time: Duration,
    pub solver_time: Duration,
    pub integrate_time: Duration,
    pub total_step_time: Duration,

    pub body_count: usize,
    pub awake_island_count: usize,
    pub contacts_solved: usize,
    pub colors_used: usize,
    pub overflow_contact_count: usize,
}

impl StepMetrics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn log_debug(&self) {
        if self.total_step_time.as_micros() == 0 {
            return;
        }
        log::debug!(
            "step: {} bodies, {} islands, {} contacts ({} colors, {} overflow), \
             broad={:.2}ms narrow={:.2}ms solve={:.2}ms integrate={:.2}ms total={:.2}ms",
            self.body_count,
            self.awake_island_count,
            self.contacts_solved,
            self.colors_used,
            self.overflow_contact_count,
            self.broad_phase_time.as_secs_f32() * 1000.0,
            self.narrow_phase_time.as_secs_f32() * 1000.0,
            self.solver_time.as_secs_f32() * 1000.0,
            self.integrate_time.as_secs_f32() * 1000.0,
            self.total_step_time.as_secs_f32() * 1000.0,
        );
    }
}
