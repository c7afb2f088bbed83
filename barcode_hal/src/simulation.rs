//! Simulation driver modules.

pub mod axis;
pub mod machine;
pub mod pulse_unit;
