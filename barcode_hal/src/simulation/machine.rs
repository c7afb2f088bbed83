//! Simulated machine: one axis plus its pulse unit, stepped together.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::axis::SimulatedAxis;
use super::pulse_unit::SimulatedPulseUnit;

/// Simulated axis parameters (`[simulation]` section).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Axis position at power-up [user units].
    pub start_position: f64,
    /// Velocity limit [user units/s].
    pub max_velocity: f64,
    /// Acceleration limit [user units/s²].
    pub max_acceleration: f64,
    /// Settling window around the target [user units].
    pub in_position_window: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_position: 0.0,
            max_velocity: 20.0,
            max_acceleration: 500.0,
            in_position_window: 1e-6,
        }
    }
}

/// Axis and pulse unit advanced in lockstep, one call per control cycle.
#[derive(Debug, Clone)]
pub struct SimMachine {
    pub axis: SimulatedAxis,
    pub pulse: SimulatedPulseUnit,
    cycle_time: Duration,
    cycles: u64,
}

impl SimMachine {
    pub fn new(config: &SimConfig, fifo_depth: usize, cycle_time: Duration) -> Self {
        Self {
            axis: SimulatedAxis::new(config),
            pulse: SimulatedPulseUnit::new(fifo_depth),
            cycle_time,
            cycles: 0,
        }
    }

    /// Enable the pulse log on the simulated unit.
    pub fn with_pulse_log(mut self) -> Self {
        self.pulse = self.pulse.with_pulse_log();
        self
    }

    /// Advance the hardware by one cycle: latch writes, move, fire pulses.
    pub fn step(&mut self) {
        self.axis.update(self.cycle_time);
        self.pulse.update(self.axis.position());
        self.cycles += 1;
    }

    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
