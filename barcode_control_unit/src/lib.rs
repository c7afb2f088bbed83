//! # Barcode Control Unit
//!
//! Isochronous row sequencer for a motion-synchronized pulse-train
//! generator. Once per cycle the sequencer reads axis and pulse-unit status,
//! makes at most one state transition and issues one coherent set of
//! register writes, then returns.
//!
//! ## Layers
//!
//! 1. **SegmentTable** ([`pattern`]): per-direction burst patterns
//! 2. **FifoAdapter** ([`emitter`]): reference/mode guards and drain confirmation
//! 3. **RowSequencer** ([`sequencer`]): `tick(context, inputs) -> outputs`
//! 4. **CycleRunner** ([`cycle`]): host registers, simulated hardware, pacing
//!
//! ## Zero-Allocation Cycle
//!
//! Patterns live in fixed-capacity vectors and the sequencer context is
//! plain data, so `RowSequencer::tick()` performs no heap allocation.

pub mod config;
pub mod cycle;
pub mod deadline;
pub mod emitter;
pub mod geometry;
pub mod pattern;
pub mod sequencer;
