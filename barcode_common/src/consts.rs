//! System-wide constants shared by the simulator and the control unit.

/// Default sequencer cycle time in microseconds (1 kHz isochronous task).
pub const DEFAULT_CYCLE_TIME_US: u32 = 1000;

/// Upper bound on segments per row pattern (fixed-capacity storage).
pub const MAX_SEGMENTS: usize = 32;

/// Upper bound on the pulse-output FIFO depth any driver may report.
pub const MAX_FIFO_DEPTH: usize = 64;

/// Size of the host integer parameter table.
pub const PARAMETER_COUNT: usize = 16;

/// Tolerance for position comparisons (pulse triggers, geometry checks).
pub const POSITION_TOLERANCE: f64 = 1e-9;

/// Relative precision of the pulse unit's reference register, which holds a
/// single-precision float. A read-back of `x` is within `|x| * this` of the
/// value written.
pub const REFERENCE_REGISTER_EPSILON: f64 = f32::EPSILON as f64;

static_assertions::const_assert!(MAX_SEGMENTS <= MAX_FIFO_DEPTH);
