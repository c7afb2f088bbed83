//! Sequencer state, host command and row direction enums.
//!
//! `SequencerState` and `Command` carry explicit discriminants because they
//! are mirrored through integer host registers.

use serde::{Deserialize, Serialize};

/// Row sequencer state, mirrored to the host status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum SequencerState {
    /// Waiting for a `Go` command. Initial and terminal state.
    #[default]
    Idle = 0,
    /// Axis travelling to the row start position.
    MoveToStart = 1,
    /// Confirming guards and loading the positive-direction pattern.
    FillFifoPositive = 2,
    /// Axis travelling the positive row while the FIFO drains.
    MoveRowPositive = 3,
    /// Confirming guards and loading the negative-direction pattern.
    FillFifoNegative = 4,
    /// Axis travelling the negative row while the FIFO drains.
    MoveRowNegative = 5,
}

impl SequencerState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::MoveToStart),
            2 => Some(Self::FillFifoPositive),
            3 => Some(Self::MoveRowPositive),
            4 => Some(Self::FillFifoNegative),
            5 => Some(Self::MoveRowNegative),
            _ => None,
        }
    }

    /// Direction being filled or travelled, if any.
    #[inline]
    pub const fn direction(&self) -> Option<Direction> {
        match self {
            Self::FillFifoPositive | Self::MoveRowPositive => Some(Direction::Positive),
            Self::FillFifoNegative | Self::MoveRowNegative => Some(Direction::Negative),
            Self::Idle | Self::MoveToStart => None,
        }
    }

    /// Whether the axis is expected to be moving in this state.
    #[inline]
    pub const fn is_motion(&self) -> bool {
        matches!(
            self,
            Self::MoveToStart | Self::MoveRowPositive | Self::MoveRowNegative
        )
    }

    /// Whether this is one of the FIFO fill states.
    #[inline]
    pub const fn is_fill(&self) -> bool {
        matches!(self, Self::FillFifoPositive | Self::FillFifoNegative)
    }
}

/// Host command, read from the integer command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(i32)]
pub enum Command {
    /// No request pending.
    #[default]
    None = 0,
    /// Start a run from `Idle`.
    Go = 1,
    /// Stop everything and return to `Idle` from any state.
    Abort = 2,
}

impl Command {
    /// Convert from the raw register value. Returns `None` for unknown values.
    #[inline]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Go),
            2 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Travel direction of a row pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    /// `+1.0` or `-1.0`.
    #[inline]
    pub const fn sign(&self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Positive => f.write_str("positive"),
            Self::Negative => f.write_str("negative"),
        }
    }
}
