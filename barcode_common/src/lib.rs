//! Barcode Common Library
//!
//! Shared vocabulary for the barcode pulse workspace: sequencer state and
//! command enums, fault flags, the hardware collaborator traits, the host
//! register block, and TOML configuration plumbing.
//!
//! # Module Structure
//!
//! - [`state`] - Sequencer state, host commands and row direction
//! - [`fault`] - Sticky fault bitflags
//! - [`hal`] - Motion and pulse-output hardware interfaces, host registers
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use barcode_common::prelude::*;
//!
//! assert_eq!(SequencerState::default(), SequencerState::Idle);
//! assert_eq!(Command::from_i32(1), Some(Command::Go));
//! ```

pub mod config;
pub mod consts;
pub mod fault;
pub mod hal;
pub mod prelude;
pub mod state;
