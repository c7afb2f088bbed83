//! Sticky sequencer fault flags.
//!
//! Set by the sequencer when a run is aborted by a detected condition and
//! cleared only when the next `Go` is accepted.

use bitflags::bitflags;

bitflags! {
    /// Reasons a run ended in `Idle` with the fault flag raised.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SequencerFault: u8 {
        /// Row motion completed with pulses still queued in the FIFO.
        const RESIDUAL_PULSES = 0x01;
        /// A reference/mode/drain guard did not confirm within its deadline.
        const GUARD_STALL     = 0x02;
        /// A commanded move did not report done within its deadline.
        const MOTION_STALL    = 0x04;
    }
}

impl Default for SequencerFault {
    fn default() -> Self {
        Self::empty()
    }
}
