//! # Barcode HAL
//!
//! Simulation backends for the two hardware collaborators of the row
//! sequencer:
//!
//! - [`SimulatedAxis`]: path-planner axis implementing `MotionRequester`
//! - [`SimulatedPulseUnit`]: position-keyed pulse FIFO implementing `PulseEmitter`
//! - [`SimMachine`]: steps both once per cycle and couples axis position to
//!   pulse emission
//!
//! Writes issued by the sequencer during a cycle are latched by the next
//! `SimMachine::step()`, so read-backs lag writes by one cycle the way the
//! real register interface does.

pub mod simulation;

pub use simulation::axis::SimulatedAxis;
pub use simulation::machine::{SimConfig, SimMachine};
pub use simulation::pulse_unit::{EmittedPulse, SimulatedPulseUnit};
