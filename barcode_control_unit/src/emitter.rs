//! FIFO pulse emitter adapter.
//!
//! Everything the sequencer does to the pulse unit goes through here:
//! arming a direction, the reference/mode guards, drain confirmation of the
//! previous append and the residual check at the end of a pass.
//!
//! Guard policy: at most one configuration write per cycle, and no append in
//! a cycle where the read-back mode is not `Fifo` or the read-back reference
//! differs from the direction's reference.

use barcode_common::consts::{POSITION_TOLERANCE, REFERENCE_REGISTER_EPSILON};
use barcode_common::hal::pulse::{FifoEntry, PulseEmitter, PulseMode, PulseOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hardware signal that confirms an append before the next one is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainSignal {
    /// Queued pulse counter equals the pulses appended so far.
    #[default]
    ActualPulseCount,
    /// Free FIFO entries equal depth minus entries appended so far.
    FreeEntries,
}

/// Appends issued during the current fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillTracker {
    appended: usize,
    queued_pulses: u64,
}

impl FillTracker {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn appended(&self) -> usize {
        self.appended
    }

    #[inline]
    pub fn queued_pulses(&self) -> u64 {
        self.queued_pulses
    }

    fn record(&mut self, entry: &FifoEntry) {
        self.appended += 1;
        self.queued_pulses += u64::from(entry.count);
    }
}

/// Outcome of one fill cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillStep {
    /// Reference not confirmed; a reference or mode-disable write was issued.
    ReferencePending,
    /// Reference confirmed, mode not yet `Fifo`; the mode write was issued.
    ModePending,
    /// Previous append not yet visible in the drain signal.
    AwaitingConfirmation,
    /// No free FIFO entry.
    FifoFull,
    /// Zero-count segment, nothing to queue.
    Skipped,
    /// One burst appended.
    Appended(FifoEntry),
    /// Every segment appended and confirmed.
    Complete,
}

impl FillStep {
    /// Whether the segment index moves on after this step.
    #[inline]
    pub const fn advances(&self) -> bool {
        matches!(self, Self::Skipped | Self::Appended(_))
    }
}

/// Stateless policy wrapper around a `PulseEmitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FifoAdapter {
    drain_signal: DrainSignal,
}

impl FifoAdapter {
    pub const fn new(drain_signal: DrainSignal) -> Self {
        Self { drain_signal }
    }

    /// Arm the unit for a pass: output on, direction reference written.
    /// Fifo mode is left to the guard so it never shares a cycle with the
    /// reference write.
    pub fn prepare<E: PulseEmitter>(&self, emitter: &mut E, reference: f64) {
        emitter.set_output(PulseOutput::Ttl);
        emitter.set_reference_position(reference);
    }

    /// Leave FIFO mode and switch the output off.
    pub fn release<E: PulseEmitter>(&self, emitter: &mut E) {
        emitter.set_mode(PulseMode::Disabled);
        emitter.set_output(PulseOutput::Disabled);
    }

    /// Whether the latched reference matches `reference` to register precision.
    #[inline]
    pub fn reference_confirmed<E: PulseEmitter>(&self, emitter: &E, reference: f64) -> bool {
        let tolerance = (reference.abs() * REFERENCE_REGISTER_EPSILON).max(POSITION_TOLERANCE);
        (emitter.current_reference_position() - reference).abs() <= tolerance
    }

    /// Whether every append of this fill shows up in the drain signal.
    pub fn confirmed<E: PulseEmitter>(&self, emitter: &E, tracker: &FillTracker) -> bool {
        match self.drain_signal {
            DrainSignal::ActualPulseCount => {
                u64::from(emitter.actual_pulse_count()) == tracker.queued_pulses
            }
            DrainSignal::FreeEntries => {
                emitter.free_entries() == emitter.fifo_depth().saturating_sub(tracker.appended)
            }
        }
    }

    /// Pulses or bursts still queued after a pass.
    pub fn has_residual<E: PulseEmitter>(&self, emitter: &E) -> bool {
        emitter.actual_pulse_count() != 0 || emitter.free_entries() < emitter.fifo_depth()
    }

    /// Run one fill cycle for a pass firing from `reference`.
    ///
    /// `next` is the burst for the current segment index, `None` once the
    /// pattern is exhausted.
    pub fn fill_step<E: PulseEmitter>(
        &self,
        emitter: &mut E,
        tracker: &mut FillTracker,
        reference: f64,
        next: Option<FifoEntry>,
    ) -> FillStep {
        let mode = emitter.current_mode();

        if !self.reference_confirmed(emitter, reference) {
            // The reference only latches outside Fifo mode.
            if mode == PulseMode::Fifo {
                debug!("Reference guard: leaving Fifo mode to rewrite reference");
                emitter.set_mode(PulseMode::Disabled);
            } else {
                debug!("Reference guard: writing reference {:.4}", reference);
                emitter.set_reference_position(reference);
            }
            return FillStep::ReferencePending;
        }

        if mode != PulseMode::Fifo {
            debug!("Mode guard: requesting Fifo mode");
            emitter.set_mode(PulseMode::Fifo);
            return FillStep::ModePending;
        }

        if !self.confirmed(emitter, tracker) {
            return FillStep::AwaitingConfirmation;
        }

        let Some(entry) = next else {
            return FillStep::Complete;
        };
        if entry.count == 0 {
            return FillStep::Skipped;
        }
        if emitter.free_entries() == 0 {
            return FillStep::FifoFull;
        }

        emitter.append_segment(entry);
        tracker.record(&entry);
        FillStep::Appended(entry)
    }
}
