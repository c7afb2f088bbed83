//! Pulse-output FIFO interface.
//!
//! All writes are single-cycle and non-blocking; they take effect on the
//! hardware's next emission cycle. Read-backs report what the hardware has
//! actually latched, which is what the sequencer's guards confirm against.

use serde::{Deserialize, Serialize};

/// Pulse unit operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum PulseMode {
    #[default]
    Disabled = 0,
    /// Emit bursts from the hardware FIFO, keyed to position deltas.
    Fifo = 1,
}

/// Physical pulse output driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum PulseOutput {
    #[default]
    Disabled = 0,
    Ttl = 1,
}

/// One burst descriptor appended to the hardware FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FifoEntry {
    /// Signed position step between consecutive pulses [user units].
    pub delta: f64,
    /// Pulse width [s]. Zero suppresses the pulse but still advances position.
    pub pulse_width: f64,
    /// Number of pulses in the burst.
    pub count: u32,
}

/// Boundary to the pulse-output hardware.
///
/// # Guard Policy
///
/// - `set_mode(Fifo)` must be observed via `current_mode()` before any
///   `append_segment()`.
/// - `set_reference_position()` only latches while the unit is not in Fifo
///   mode, and must be confirmed via `current_reference_position()` before
///   Fifo mode is enabled.
/// - `append_segment()` with mode not confirmed is a caller bug; drivers may
///   drop the entry.
pub trait PulseEmitter {
    /// Disable output and clear mode, reference, FIFO and burst registers.
    /// Idempotent.
    fn reset(&mut self);

    /// Enable or disable the physical output driver.
    fn set_output(&mut self, output: PulseOutput);

    fn set_mode(&mut self, mode: PulseMode);

    fn set_reference_position(&mut self, position: f64);

    /// Queue one burst.
    fn append_segment(&mut self, entry: FifoEntry);

    /// Latched mode.
    fn current_mode(&self) -> PulseMode;

    /// Latched reference position.
    fn current_reference_position(&self) -> f64;

    /// Total FIFO capacity in entries.
    fn fifo_depth(&self) -> usize;

    /// Entries the FIFO can still accept.
    fn free_entries(&self) -> usize;

    /// Pulses accepted by the hardware and not yet emitted.
    fn actual_pulse_count(&self) -> u32;
}

impl<T: PulseEmitter + ?Sized> PulseEmitter for &mut T {
    fn reset(&mut self) {
        (**self).reset();
    }

    fn set_output(&mut self, output: PulseOutput) {
        (**self).set_output(output);
    }

    fn set_mode(&mut self, mode: PulseMode) {
        (**self).set_mode(mode);
    }

    fn set_reference_position(&mut self, position: f64) {
        (**self).set_reference_position(position);
    }

    fn append_segment(&mut self, entry: FifoEntry) {
        (**self).append_segment(entry);
    }

    fn current_mode(&self) -> PulseMode {
        (**self).current_mode()
    }

    fn current_reference_position(&self) -> f64 {
        (**self).current_reference_position()
    }

    fn fifo_depth(&self) -> usize {
        (**self).fifo_depth()
    }

    fn free_entries(&self) -> usize {
        (**self).free_entries()
    }

    fn actual_pulse_count(&self) -> u32 {
        (**self).actual_pulse_count()
    }
}
