//! Hardware collaborator interfaces.
//!
//! The sequencer only ever talks to hardware through these traits, so it can
//! be driven by the simulator in tests and by a real driver in production.

pub mod motion;
pub mod pulse;
pub mod registers;
