//! Reference/mode guard ordering against the simulated pulse unit.

use std::time::Duration;

use barcode_common::fault::SequencerFault;
use barcode_common::hal::pulse::{FifoEntry, PulseEmitter, PulseMode, PulseOutput};
use barcode_common::state::{Command, Direction, SequencerState};
use barcode_control_unit::config::{MIN_GUARD_TIMEOUT_CYCLES, load_config_from_str};
use barcode_control_unit::sequencer::{RowSequencer, SequencerInputs};
use barcode_hal::{SimConfig, SimulatedAxis, SimulatedPulseUnit};

use super::{RUN_CYCLES, runner};

#[test]
fn appends_only_after_mode_and_reference_latched() {
    let mut r = runner("");
    r.registers.post(Command::Go);

    let mut appends = 0;
    for _ in 0..RUN_CYCLES {
        // What the sequencer reads back this cycle.
        let mode = r.hardware.pulse.current_mode();
        let reference = r.hardware.pulse.current_reference_position();
        let state = r.context().state();
        let before = r.hardware.pulse.appended_total();

        let out = r.cycle_once();

        let appended = r.hardware.pulse.appended_total() - before;
        assert!(appended <= 1, "{appended} appends in one cycle");
        if appended == 1 {
            appends += 1;
            assert_eq!(mode, PulseMode::Fifo);
            let expected = match state.direction() {
                Some(Direction::Positive) => 20.0,
                Some(Direction::Negative) => 22.9,
                None => panic!("append outside a fill state: {state:?}"),
            };
            assert!((reference - expected).abs() < 1e-9);
        }
        if out.transition.is_some_and(|t| t.to == SequencerState::Idle) {
            break;
        }
    }
    assert_eq!(appends, 20);
    assert_eq!(r.hardware.pulse.rejected_appends(), 0);
}

#[test]
fn guards_cost_one_cycle_each() {
    let mut r = runner("");
    super::start_and_run_to(&mut r, SequencerState::FillFifoPositive);

    // Reference latched with this step; the mode write comes next.
    assert_eq!(r.hardware.pulse.current_mode(), PulseMode::Disabled);
    assert!((r.hardware.pulse.current_reference_position() - 20.0).abs() < 1e-9);
    assert_eq!(r.hardware.pulse.output(), PulseOutput::Ttl);

    r.cycle_once();
    assert_eq!(r.hardware.pulse.current_mode(), PulseMode::Fifo);
    assert_eq!(r.hardware.pulse.appended_total(), 0);

    r.cycle_once();
    assert_eq!(r.hardware.pulse.appended_total(), 1);
    assert_eq!(r.context().segment_index(), 1);
}

#[test]
fn minimum_guard_timeout_completes_run() {
    let mut r = runner(&format!(
        "[guards]\nguard_timeout_cycles = {MIN_GUARD_TIMEOUT_CYCLES}\n"
    ));
    r.registers.post(Command::Go);

    assert!(r.run_until_idle(RUN_CYCLES).is_some());
    assert!(!r.context().fault(), "faults: {:?}", r.context().faults());
    assert_eq!(r.context().row_index(), 2);
    assert_eq!(r.context().segments_appended(), 20);
}

#[test]
fn negative_pass_leaves_fifo_mode_to_rewrite_reference() {
    let mut r = runner("");
    super::start_and_run_to(&mut r, SequencerState::FillFifoNegative);
    assert_eq!(r.hardware.pulse.current_mode(), PulseMode::Disabled);
    assert!((r.hardware.pulse.current_reference_position() - 22.9).abs() < 1e-9);
}

/// Pulse unit whose reference register never takes a write.
struct StuckReference(SimulatedPulseUnit);

impl PulseEmitter for StuckReference {
    fn reset(&mut self) {
        self.0.reset();
    }
    fn set_output(&mut self, output: PulseOutput) {
        self.0.set_output(output);
    }
    fn set_mode(&mut self, mode: PulseMode) {
        self.0.set_mode(mode);
    }
    fn set_reference_position(&mut self, _position: f64) {}
    fn append_segment(&mut self, entry: FifoEntry) {
        self.0.append_segment(entry);
    }
    fn current_mode(&self) -> PulseMode {
        self.0.current_mode()
    }
    fn current_reference_position(&self) -> f64 {
        self.0.current_reference_position()
    }
    fn fifo_depth(&self) -> usize {
        self.0.fifo_depth()
    }
    fn free_entries(&self) -> usize {
        self.0.free_entries()
    }
    fn actual_pulse_count(&self) -> u32 {
        self.0.actual_pulse_count()
    }
}

#[test]
fn stuck_reference_raises_guard_stall() {
    let loaded = load_config_from_str(
        "[guards]\nguard_timeout_cycles = 20\n[simulation]\nstart_position = 19.9\n",
    )
    .unwrap();
    let sequencer = RowSequencer::new(&loaded);
    let mut ctx = sequencer.context();
    let mut axis = SimulatedAxis::new(&SimConfig {
        start_position: 19.9,
        ..Default::default()
    });
    let mut pulse = StuckReference(SimulatedPulseUnit::new(16));
    let dt = Duration::from_millis(1);

    let mut inputs = SequencerInputs {
        command: Command::Go,
        rows_parameter: None,
    };
    let mut fill_cycles = 0;
    for _ in 0..1_000 {
        let out = sequencer.tick(&mut ctx, inputs, &mut axis, &mut pulse);
        inputs.command = Command::None;
        axis.update(dt);
        pulse.0.update(axis.position());

        if out.state == SequencerState::FillFifoPositive {
            fill_cycles += 1;
        }
        if out.transition.is_some_and(|t| t.to == SequencerState::Idle) {
            break;
        }
    }

    assert_eq!(ctx.state(), SequencerState::Idle);
    assert!(ctx.fault());
    assert_eq!(ctx.faults(), SequencerFault::GUARD_STALL);
    assert_eq!(fill_cycles, 20);
    assert_eq!(pulse.0.appended_total(), 0);
}
