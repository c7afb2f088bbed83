//! Prelude module for common re-exports.
//!
//! ```rust
//! use barcode_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CYCLE_TIME_US, MAX_FIFO_DEPTH, MAX_SEGMENTS};

// ─── State ──────────────────────────────────────────────────────────
pub use crate::fault::SequencerFault;
pub use crate::state::{Command, Direction, SequencerState};

// ─── Hardware Interfaces ────────────────────────────────────────────
pub use crate::hal::motion::MotionRequester;
pub use crate::hal::pulse::{FifoEntry, PulseEmitter, PulseMode, PulseOutput};
pub use crate::hal::registers::ControlRegisters;
