//! Pulse-output unit simulator.
//!
//! Models the option-module pulse generator in FIFO mode: bursts are queued
//! as `(delta, width, count)` descriptors and fired one pulse at a time as
//! the axis crosses `reference + k·delta`. Register writes land in command
//! registers and are latched on the next `update()`, so every configuration
//! write needs one cycle before it can be read back.
//!
//! The reference position only latches while the unit is not in Fifo mode.
//! Within one update the mode is latched before the reference, so writing
//! both in the same cycle leaves the old reference in effect.

use barcode_common::consts::{MAX_FIFO_DEPTH, POSITION_TOLERANCE};
use barcode_common::hal::pulse::{FifoEntry, PulseEmitter, PulseMode, PulseOutput};
use heapless::{Deque, Vec};
use tracing::{debug, trace, warn};

/// A burst in the hardware FIFO with its remaining pulse budget.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueuedBurst {
    entry: FifoEntry,
    remaining: u32,
}

/// Record of one fired pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedPulse {
    /// Trigger position the pulse fired at.
    pub position: f64,
    /// Whether the pulse was physically driven (output on, width > 0).
    pub visible: bool,
}

/// Simulated FIFO pulse generator.
#[derive(Debug, Clone)]
pub struct SimulatedPulseUnit {
    depth: usize,

    // ── Command registers (written by the sequencer) ──
    cmd_output: PulseOutput,
    cmd_mode: PulseMode,
    cmd_reference: f64,
    pending_appends: Vec<FifoEntry, MAX_FIFO_DEPTH>,

    // ── Latched state (read back by the sequencer) ──
    output: PulseOutput,
    mode: PulseMode,
    reference: f64,
    fifo: Deque<QueuedBurst, MAX_FIFO_DEPTH>,
    /// Next trigger position.
    cursor: f64,

    // ── Telemetry ──
    appended_total: u64,
    rejected_appends: u64,
    emitted_pulses: u64,
    visible_pulses: u64,
    /// Fault injection: phantom pulses reported as still queued.
    injected_residual: u32,
    pulse_log: Option<std::vec::Vec<EmittedPulse>>,
}

impl SimulatedPulseUnit {
    /// Create a unit with a FIFO of `depth` entries (clamped to `MAX_FIFO_DEPTH`).
    pub fn new(depth: usize) -> Self {
        let depth = depth.clamp(1, MAX_FIFO_DEPTH);
        Self {
            depth,
            cmd_output: PulseOutput::Disabled,
            cmd_mode: PulseMode::Disabled,
            cmd_reference: 0.0,
            pending_appends: Vec::new(),
            output: PulseOutput::Disabled,
            mode: PulseMode::Disabled,
            reference: 0.0,
            fifo: Deque::new(),
            cursor: 0.0,
            appended_total: 0,
            rejected_appends: 0,
            emitted_pulses: 0,
            visible_pulses: 0,
            injected_residual: 0,
            pulse_log: None,
        }
    }

    /// Keep a log of every fired pulse (test/diagnostic use).
    pub fn with_pulse_log(mut self) -> Self {
        self.pulse_log = Some(std::vec::Vec::new());
        self
    }

    /// Latched output driver.
    #[inline]
    pub fn output(&self) -> PulseOutput {
        self.output
    }

    /// Appends accepted by `append_segment()` since construction.
    #[inline]
    pub fn appended_total(&self) -> u64 {
        self.appended_total
    }

    /// Appends dropped because the guard policy was violated or the FIFO was full.
    #[inline]
    pub fn rejected_appends(&self) -> u64 {
        self.rejected_appends
    }

    #[inline]
    pub fn emitted_pulses(&self) -> u64 {
        self.emitted_pulses
    }

    #[inline]
    pub fn visible_pulses(&self) -> u64 {
        self.visible_pulses
    }

    /// Fired pulses, if logging was enabled.
    pub fn pulse_log(&self) -> &[EmittedPulse] {
        self.pulse_log.as_deref().unwrap_or(&[])
    }

    /// Report `pulses` extra pulses as queued until the next reset or mode disable.
    pub fn inject_residual(&mut self, pulses: u32) {
        debug!("Sim pulse unit residual injection: {}", pulses);
        self.injected_residual = pulses;
    }

    /// Latch command registers and fire every pulse whose trigger the axis
    /// has reached at `position`.
    pub fn update(&mut self, position: f64) {
        self.latch();
        self.emit(position);
    }

    fn latch(&mut self) {
        self.output = self.cmd_output;

        if self.cmd_mode != self.mode {
            self.mode = self.cmd_mode;
            match self.mode {
                PulseMode::Fifo => {
                    self.cursor = self.reference;
                    debug!("Sim pulse unit: Fifo mode, reference {:.4}", self.reference);
                }
                PulseMode::Disabled => {
                    self.fifo.clear();
                    self.injected_residual = 0;
                    debug!("Sim pulse unit: mode disabled, FIFO flushed");
                }
            }
        }

        if self.mode != PulseMode::Fifo {
            self.reference = self.cmd_reference;
        }

        let pending = core::mem::take(&mut self.pending_appends);
        for entry in pending {
            if self.fifo.len() >= self.depth {
                self.rejected_appends += 1;
                warn!("Sim pulse unit: FIFO overflow, entry dropped");
                continue;
            }
            let burst = QueuedBurst {
                entry,
                remaining: entry.count,
            };
            if self.fifo.push_back(burst).is_err() {
                self.rejected_appends += 1;
                warn!("Sim pulse unit: FIFO overflow, entry dropped");
            }
        }
    }

    fn emit(&mut self, position: f64) {
        if self.mode != PulseMode::Fifo {
            return;
        }

        while let Some(head) = self.fifo.front_mut() {
            if head.remaining == 0 {
                self.fifo.pop_front();
                continue;
            }

            let direction = head.entry.delta.signum();
            if (position - self.cursor) * direction < -POSITION_TOLERANCE {
                break;
            }

            let visible = self.output != PulseOutput::Disabled && head.entry.pulse_width > 0.0;
            let fired_at = self.cursor;
            self.cursor += head.entry.delta;
            head.remaining -= 1;
            if head.remaining == 0 {
                self.fifo.pop_front();
            }

            self.emitted_pulses += 1;
            if visible {
                self.visible_pulses += 1;
            }
            if let Some(log) = self.pulse_log.as_mut() {
                log.push(EmittedPulse {
                    position: fired_at,
                    visible,
                });
            }
            trace!("Sim pulse at {:.4} (visible={})", fired_at, visible);
        }
    }
}

impl PulseEmitter for SimulatedPulseUnit {
    fn reset(&mut self) {
        self.cmd_output = PulseOutput::Disabled;
        self.cmd_mode = PulseMode::Disabled;
        self.cmd_reference = 0.0;
        self.pending_appends.clear();
        self.output = PulseOutput::Disabled;
        self.mode = PulseMode::Disabled;
        self.reference = 0.0;
        self.fifo.clear();
        self.cursor = 0.0;
        self.injected_residual = 0;
    }

    fn set_output(&mut self, output: PulseOutput) {
        self.cmd_output = output;
    }

    fn set_mode(&mut self, mode: PulseMode) {
        self.cmd_mode = mode;
    }

    fn set_reference_position(&mut self, position: f64) {
        self.cmd_reference = position;
    }

    fn append_segment(&mut self, entry: FifoEntry) {
        if self.mode != PulseMode::Fifo {
            self.rejected_appends += 1;
            warn!("Sim pulse unit: append while not in Fifo mode, entry dropped");
            return;
        }
        if self.pending_appends.push(entry).is_err() {
            self.rejected_appends += 1;
            warn!("Sim pulse unit: append register overflow, entry dropped");
            return;
        }
        self.appended_total += 1;
    }

    fn current_mode(&self) -> PulseMode {
        self.mode
    }

    fn current_reference_position(&self) -> f64 {
        self.reference
    }

    fn fifo_depth(&self) -> usize {
        self.depth
    }

    fn free_entries(&self) -> usize {
        self.depth.saturating_sub(self.fifo.len())
    }

    fn actual_pulse_count(&self) -> u32 {
        let queued: u32 = self.fifo.iter().map(|b| b.remaining).sum();
        queued + self.injected_residual
    }
}
