//! Row sequencer: the per-cycle state machine.
//!
//! ```text
//! Idle ─Go─▶ MoveToStart ─done─▶ FillFifoPositive ─filled─▶ MoveRowPositive
//!   ▲                                                             │ done
//!   │                                                             ▼
//!   └──── MoveRowNegative ◀─filled─ FillFifoNegative ◀────────────┘
//!              │ done, more rows
//!              └──────────▶ FillFifoPositive
//! ```
//!
//! `tick()` runs once per cycle, never blocks and makes at most one state
//! transition. Every wait (motion done, guard confirmation, drain
//! confirmation) is expressed as staying in the same state. A row is one
//! positive plus one negative pass; `row_index` counts completed rows.
//!
//! Detected failures never leave the cycle as errors: they set the sticky
//! `fault` flag plus a `SequencerFault` reason, reset the pulse unit and
//! return to `Idle`.

use barcode_common::fault::SequencerFault;
use barcode_common::hal::motion::MotionRequester;
use barcode_common::hal::pulse::{PulseEmitter, PulseMode};
use barcode_common::state::{Command, Direction, SequencerState};
use tracing::{debug, info, trace, warn};

use crate::config::{GuardConfig, LoadedConfig, RowSource, RowsConfig};
use crate::deadline::CycleDeadline;
use crate::emitter::{FifoAdapter, FillStep, FillTracker};
use crate::geometry::RowGeometry;
use crate::pattern::SegmentTable;

// ─── Context ────────────────────────────────────────────────────────

/// Mutable sequencer state, owned by the control task and passed into
/// every `tick()`.
#[derive(Debug, Clone)]
pub struct SequencerContext {
    state: SequencerState,
    row_index: u32,
    segment_index: usize,
    rows_total: u32,
    fault: bool,
    faults: SequencerFault,
    tracker: FillTracker,
    guard_deadline: CycleDeadline,
    motion_deadline: CycleDeadline,
    /// Bursts appended since the last accepted `Go`.
    segments_appended: u64,
}

impl SequencerContext {
    pub fn new(guards: &GuardConfig) -> Self {
        Self {
            state: SequencerState::Idle,
            row_index: 0,
            segment_index: 0,
            rows_total: 0,
            fault: false,
            faults: SequencerFault::empty(),
            tracker: FillTracker::default(),
            guard_deadline: CycleDeadline::new(guards.guard_timeout_cycles),
            motion_deadline: CycleDeadline::new(guards.motion_timeout_cycles),
            segments_appended: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> SequencerState {
        self.state
    }

    #[inline]
    pub fn row_index(&self) -> u32 {
        self.row_index
    }

    #[inline]
    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    #[inline]
    pub fn rows_total(&self) -> u32 {
        self.rows_total
    }

    #[inline]
    pub fn fault(&self) -> bool {
        self.fault
    }

    #[inline]
    pub fn faults(&self) -> SequencerFault {
        self.faults
    }

    #[inline]
    pub fn segments_appended(&self) -> u64 {
        self.segments_appended
    }

    fn begin_run(&mut self, rows_total: u32) {
        self.row_index = 0;
        self.segment_index = 0;
        self.rows_total = rows_total;
        self.fault = false;
        self.faults = SequencerFault::empty();
        self.tracker.reset();
        self.segments_appended = 0;
    }
}

// ─── Cycle I/O ──────────────────────────────────────────────────────

/// Host inputs sampled at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerInputs {
    pub command: Command,
    /// Row count parameter, read when rows come from the host table.
    pub rows_parameter: Option<i32>,
}

/// State change made by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SequencerState,
    pub to: SequencerState,
}

/// Status published after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerOutputs {
    pub state: SequencerState,
    pub fault: bool,
    pub faults: SequencerFault,
    pub row_index: u32,
    pub segment_index: usize,
    /// The command took effect this cycle.
    pub command_accepted: bool,
    pub transition: Option<Transition>,
}

// ─── Sequencer ──────────────────────────────────────────────────────

#[inline]
const fn fill_state(direction: Direction) -> SequencerState {
    match direction {
        Direction::Positive => SequencerState::FillFifoPositive,
        Direction::Negative => SequencerState::FillFifoNegative,
    }
}

#[inline]
const fn move_state(direction: Direction) -> SequencerState {
    match direction {
        Direction::Positive => SequencerState::MoveRowPositive,
        Direction::Negative => SequencerState::MoveRowNegative,
    }
}

/// Immutable sequencer configuration and the transition logic.
#[derive(Debug, Clone)]
pub struct RowSequencer {
    table: SegmentTable,
    geometry: RowGeometry,
    adapter: FifoAdapter,
    rows: RowsConfig,
    guards: GuardConfig,
}

impl RowSequencer {
    pub fn new(loaded: &LoadedConfig) -> Self {
        Self {
            table: loaded.table.clone(),
            geometry: loaded.geometry,
            adapter: FifoAdapter::new(loaded.config.emitter.drain_signal),
            rows: loaded.config.rows,
            guards: loaded.config.guards,
        }
    }

    /// Fresh context in `Idle` with this sequencer's deadlines.
    pub fn context(&self) -> SequencerContext {
        SequencerContext::new(&self.guards)
    }

    /// Host parameter index to sample into `SequencerInputs::rows_parameter`.
    pub fn rows_parameter_index(&self) -> Option<usize> {
        match self.rows.source {
            RowSource::Config => None,
            RowSource::Parameter => Some(self.rows.parameter_index),
        }
    }

    /// Evaluate one cycle.
    pub fn tick<M, E>(
        &self,
        ctx: &mut SequencerContext,
        inputs: SequencerInputs,
        motion: &mut M,
        emitter: &mut E,
    ) -> SequencerOutputs
    where
        M: MotionRequester,
        E: PulseEmitter,
    {
        let from = ctx.state;

        let command_accepted = match inputs.command {
            Command::Abort => {
                self.abort(ctx, motion, emitter);
                true
            }
            Command::Go if ctx.state == SequencerState::Idle => {
                self.start_run(ctx, inputs.rows_parameter, motion, emitter);
                true
            }
            Command::Go => {
                debug!("Go ignored in {:?}", ctx.state);
                false
            }
            Command::None => false,
        };

        if !command_accepted {
            self.step(ctx, motion, emitter);
        }

        let transition = (ctx.state != from).then_some(Transition {
            from,
            to: ctx.state,
        });
        if let Some(t) = transition {
            debug!(
                "Sequencer {:?} -> {:?} (row {}/{}, segment {})",
                t.from, t.to, ctx.row_index, ctx.rows_total, ctx.segment_index
            );
        }

        SequencerOutputs {
            state: ctx.state,
            fault: ctx.fault,
            faults: ctx.faults,
            row_index: ctx.row_index,
            segment_index: ctx.segment_index,
            command_accepted,
            transition,
        }
    }

    fn resolve_rows(&self, parameter: Option<i32>) -> u32 {
        match self.rows.source {
            RowSource::Config => self.rows.rows_total,
            RowSource::Parameter => match parameter {
                Some(value) => u32::try_from(value).unwrap_or_else(|_| {
                    warn!("Row count parameter {} is negative, using 0", value);
                    0
                }),
                None => {
                    warn!(
                        "Row count parameter {} unavailable, using configured {}",
                        self.rows.parameter_index, self.rows.rows_total
                    );
                    self.rows.rows_total
                }
            },
        }
    }

    fn start_run<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        rows_parameter: Option<i32>,
        motion: &mut M,
        emitter: &mut E,
    ) {
        let rows_total = self.resolve_rows(rows_parameter);
        info!("Go accepted: {} rows", rows_total);

        ctx.begin_run(rows_total);
        emitter.reset();
        self.request_move(ctx, motion, self.geometry.row_start().position);
        ctx.state = SequencerState::MoveToStart;
    }

    fn abort<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        motion: &mut M,
        emitter: &mut E,
    ) {
        emitter.reset();
        if ctx.state == SequencerState::Idle {
            debug!("Abort in Idle: pulse unit reset");
            return;
        }
        motion.stop();
        info!(
            "Run aborted in {:?} at row {}/{}",
            ctx.state, ctx.row_index, ctx.rows_total
        );
        ctx.fault = false;
        ctx.faults = SequencerFault::empty();
        ctx.state = SequencerState::Idle;
    }

    fn step<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        motion: &mut M,
        emitter: &mut E,
    ) {
        match ctx.state {
            SequencerState::Idle => {}
            SequencerState::MoveToStart => {
                if !motion.is_done() {
                    self.wait_for_motion(ctx, motion, emitter);
                } else if ctx.rows_total == 0 {
                    info!("Run complete: no rows requested");
                    ctx.state = SequencerState::Idle;
                } else {
                    self.enter_fill(ctx, Direction::Positive, emitter);
                }
            }
            SequencerState::FillFifoPositive => self.fill(ctx, Direction::Positive, motion, emitter),
            SequencerState::FillFifoNegative => self.fill(ctx, Direction::Negative, motion, emitter),
            SequencerState::MoveRowPositive => {
                self.finish_pass(ctx, Direction::Positive, motion, emitter)
            }
            SequencerState::MoveRowNegative => {
                self.finish_pass(ctx, Direction::Negative, motion, emitter)
            }
        }
    }

    fn request_move<M: MotionRequester>(&self, ctx: &mut SequencerContext, motion: &mut M, position: f64) {
        motion.move_absolute(position);
        ctx.motion_deadline.restart();
    }

    fn wait_for_motion<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        motion: &mut M,
        emitter: &mut E,
    ) {
        if ctx.motion_deadline.tick() {
            warn!(
                "Motion stall in {:?}: not done after {} cycles",
                ctx.state,
                ctx.motion_deadline.waited()
            );
            self.fail(ctx, SequencerFault::MOTION_STALL, motion, emitter);
        }
    }

    /// Arm the pulse unit for a pass and start filling at segment 0.
    fn enter_fill<E: PulseEmitter>(&self, ctx: &mut SequencerContext, direction: Direction, emitter: &mut E) {
        self.adapter.prepare(emitter, self.geometry.reference(direction));
        ctx.segment_index = 0;
        ctx.tracker.reset();
        ctx.guard_deadline.restart();
        ctx.state = fill_state(direction);
    }

    fn fill<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        direction: Direction,
        motion: &mut M,
        emitter: &mut E,
    ) {
        if ctx.row_index >= ctx.rows_total {
            self.complete_run(ctx, emitter);
            return;
        }

        let next = self
            .table
            .segment_at(direction, ctx.segment_index)
            .ok()
            .map(|segment| self.geometry.burst(direction, segment));
        let reference = self.geometry.reference(direction);

        match self.adapter.fill_step(emitter, &mut ctx.tracker, reference, next) {
            step if step.advances() => {
                trace!("{} segment {} {:?}", direction, ctx.segment_index, step);
                if step != FillStep::Skipped {
                    ctx.segments_appended += 1;
                }
                ctx.segment_index += 1;
                ctx.guard_deadline.restart();
            }
            FillStep::Complete => {
                let target = self.geometry.row_end_target(direction);
                self.request_move(ctx, motion, target.position);
                ctx.state = move_state(direction);
            }
            pending => {
                if ctx.guard_deadline.tick() {
                    warn!(
                        "Guard stall in {:?}: {:?} for {} cycles",
                        ctx.state,
                        pending,
                        ctx.guard_deadline.waited()
                    );
                    self.fail(ctx, SequencerFault::GUARD_STALL, motion, emitter);
                }
            }
        }
    }

    fn finish_pass<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        direction: Direction,
        motion: &mut M,
        emitter: &mut E,
    ) {
        if !motion.is_done() {
            self.wait_for_motion(ctx, motion, emitter);
            return;
        }

        if self.adapter.has_residual(emitter) {
            warn!(
                "Residual pulses after {} pass of row {}: {} queued",
                direction,
                ctx.row_index,
                emitter.actual_pulse_count()
            );
            self.fail(ctx, SequencerFault::RESIDUAL_PULSES, motion, emitter);
            return;
        }

        match direction {
            Direction::Positive => {
                emitter.set_mode(PulseMode::Disabled);
                self.enter_fill(ctx, Direction::Negative, emitter);
            }
            Direction::Negative => {
                ctx.row_index += 1;
                debug!("Row {}/{} complete", ctx.row_index, ctx.rows_total);
                if self.rows.loop_rows && ctx.row_index < ctx.rows_total {
                    emitter.set_mode(PulseMode::Disabled);
                    self.enter_fill(ctx, Direction::Positive, emitter);
                } else {
                    self.complete_run(ctx, emitter);
                }
            }
        }
    }

    fn complete_run<E: PulseEmitter>(&self, ctx: &mut SequencerContext, emitter: &mut E) {
        self.adapter.release(emitter);
        info!(
            "Run complete: {}/{} rows, {} segments appended",
            ctx.row_index, ctx.rows_total, ctx.segments_appended
        );
        ctx.state = SequencerState::Idle;
    }

    fn fail<M: MotionRequester, E: PulseEmitter>(
        &self,
        ctx: &mut SequencerContext,
        reason: SequencerFault,
        motion: &mut M,
        emitter: &mut E,
    ) {
        emitter.reset();
        motion.stop();
        ctx.fault = true;
        ctx.faults |= reason;
        ctx.state = SequencerState::Idle;
    }
}
