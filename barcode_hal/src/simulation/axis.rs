//! Axis physics simulator.
//!
//! Positioning-only axis with a triangular velocity profile. Move commands
//! are latched on the next `update()`; `is_done()` turns true once the axis
//! has settled inside the in-position window of the latest target.

use barcode_common::hal::motion::MotionRequester;
use std::time::Duration;
use tracing::{debug, trace};

use super::machine::SimConfig;

/// Simulated linear axis driven by absolute move commands.
#[derive(Debug, Clone)]
pub struct SimulatedAxis {
    /// Current position [user units]
    position: f64,
    /// Current velocity [user units/s]
    velocity: f64,
    /// Active target position
    target_position: f64,
    /// Target written this cycle, latched on the next update
    pending_target: Option<f64>,
    max_velocity: f64,
    max_acceleration: f64,
    in_position_window: f64,
    /// Travelling towards `target_position`
    moving: bool,
    /// Latest move completed and settled
    done: bool,
    /// Fault injection: axis ignores motion (never completes)
    stalled: bool,
    /// Number of move commands received
    moves_issued: u64,
}

impl SimulatedAxis {
    /// Create a new axis at `config.start_position`, settled.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            position: config.start_position,
            velocity: 0.0,
            target_position: config.start_position,
            pending_target: None,
            max_velocity: config.max_velocity,
            max_acceleration: config.max_acceleration,
            in_position_window: config.in_position_window,
            moving: false,
            done: true,
            stalled: false,
            moves_issued: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    pub fn moves_issued(&self) -> u64 {
        self.moves_issued
    }

    /// Freeze the axis so the active move never completes.
    pub fn set_stalled(&mut self, stalled: bool) {
        if stalled != self.stalled {
            debug!("Sim axis stall injection: {}", stalled);
        }
        self.stalled = stalled;
    }

    /// Advance the axis by one cycle.
    pub fn update(&mut self, dt: Duration) {
        if let Some(target) = self.pending_target.take() {
            self.target_position = target;
            self.moving = true;
        }

        if !self.moving || self.stalled {
            if self.stalled {
                self.velocity = 0.0;
            }
            return;
        }

        let dt_s = dt.as_secs_f64();
        let position_error = self.target_position - self.position;

        // Triangular profile: brake once inside the stopping distance.
        let stopping_distance = self.velocity * self.velocity / (2.0 * self.max_acceleration);
        let desired_velocity = if position_error.abs() <= stopping_distance {
            position_error.signum()
                * (2.0 * self.max_acceleration * position_error.abs())
                    .sqrt()
                    .min(self.max_velocity)
        } else {
            position_error.signum() * self.max_velocity
        };

        let max_vel_change = self.max_acceleration * dt_s;
        self.velocity += (desired_velocity - self.velocity).clamp(-max_vel_change, max_vel_change);
        self.velocity = self.velocity.clamp(-self.max_velocity, self.max_velocity);

        let step = self.velocity * dt_s;
        if step.abs() >= position_error.abs() || position_error.abs() <= self.in_position_window {
            self.position = self.target_position;
            self.velocity = 0.0;
            self.moving = false;
            self.done = true;
            debug!("Sim axis settled at {:.4}", self.position);
        } else {
            self.position += step;
        }

        trace!(
            "Sim axis: pos={:.4}, vel={:.3}, target={:.4}",
            self.position,
            self.velocity,
            self.target_position
        );
    }
}

impl MotionRequester for SimulatedAxis {
    fn move_absolute(&mut self, position: f64) {
        self.pending_target = Some(position);
        self.done = false;
        self.moves_issued += 1;
        debug!("Sim axis move_absolute({:.4})", position);
    }

    fn stop(&mut self) {
        self.pending_target = None;
        self.target_position = self.position;
        self.velocity = 0.0;
        self.moving = false;
        self.done = true;
        debug!("Sim axis stopped at {:.4}", self.position);
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
