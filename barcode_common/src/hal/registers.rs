//! Host-facing control register block.
//!
//! The only observability the external host has: a command register it
//! writes, a state register and fault outputs it reads, and a general
//! purpose integer parameter table.

use serde::{Deserialize, Serialize};

use crate::consts::PARAMETER_COUNT;
use crate::fault::SequencerFault;
use crate::state::{Command, SequencerState};

/// Register block shared between the host and the sequencer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ControlRegisters {
    /// Command register (`Command` discriminant), written by the host.
    pub command: i32,
    /// Status register mirroring `SequencerState`.
    pub state: i32,
    /// Fault output, set when a run aborts on a detected condition.
    pub fault: bool,
    /// Raw `SequencerFault` bits for diagnostics.
    pub fault_bits: u8,
    /// General purpose integer parameters.
    pub integers: [i32; PARAMETER_COUNT],
}

impl ControlRegisters {
    /// Decode the command register. Unknown values read as `None`.
    #[inline]
    pub fn command(&self) -> Command {
        Command::from_i32(self.command).unwrap_or(Command::None)
    }

    /// Host-side helper: post a command.
    #[inline]
    pub fn post(&mut self, command: Command) {
        self.command = command as i32;
    }

    /// Mark the pending command as consumed.
    #[inline]
    pub fn acknowledge(&mut self) {
        self.command = Command::None as i32;
    }

    /// Decode the status register.
    #[inline]
    pub fn state(&self) -> Option<SequencerState> {
        u8::try_from(self.state).ok().and_then(SequencerState::from_u8)
    }

    /// Publish sequencer status.
    #[inline]
    pub fn publish(&mut self, state: SequencerState, fault: bool, flags: SequencerFault) {
        self.state = state as i32;
        self.fault = fault;
        self.fault_bits = flags.bits();
    }

    /// Read an integer parameter. Out-of-range indices read as `None`.
    #[inline]
    pub fn integer(&self, index: usize) -> Option<i32> {
        self.integers.get(index).copied()
    }
}
