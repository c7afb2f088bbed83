//! Host register handshake: Go, Abort, acknowledgement and row parameter.

use barcode_common::fault::SequencerFault;
use barcode_common::hal::pulse::{PulseEmitter, PulseMode, PulseOutput};
use barcode_common::state::{Command, SequencerState};

use super::{RUN_CYCLES, run_to, runner, start_and_run_to};

#[test]
fn go_is_consumed_when_accepted() {
    let mut r = runner("");
    r.registers.post(Command::Go);
    let out = r.cycle_once();
    assert!(out.command_accepted);
    assert_eq!(r.registers.command(), Command::None);
    assert_eq!(r.registers.state(), Some(SequencerState::MoveToStart));
}

#[test]
fn go_during_a_run_is_dropped() {
    let mut r = runner("");
    start_and_run_to(&mut r, SequencerState::MoveRowPositive);
    r.registers.post(Command::Go);
    let out = r.cycle_once();
    assert!(!out.command_accepted);
    assert_eq!(r.registers.command(), Command::None);
    assert_eq!(out.state, SequencerState::MoveRowPositive);

    r.run_until_idle(RUN_CYCLES).expect("run must finish");
    assert_eq!(r.context().segments_appended(), 20);
}

#[test]
fn abort_mid_row_stops_everything() {
    let mut r = runner("");
    start_and_run_to(&mut r, SequencerState::MoveRowNegative);
    for _ in 0..20 {
        r.cycle_once();
    }
    r.registers.post(Command::Abort);
    let out = r.cycle_once();

    assert!(out.command_accepted);
    assert_eq!(out.state, SequencerState::Idle);
    assert!(!out.fault);
    assert_eq!(r.registers.state(), Some(SequencerState::Idle));
    assert_eq!(r.hardware.pulse.current_mode(), PulseMode::Disabled);
    assert_eq!(r.hardware.pulse.output(), PulseOutput::Disabled);
    assert_eq!(r.hardware.pulse.actual_pulse_count(), 0);

    let held = r.hardware.axis.position();
    for _ in 0..100 {
        r.cycle_once();
    }
    assert_eq!(r.hardware.axis.position(), held);
    assert_eq!(r.context().state(), SequencerState::Idle);
}

/// Abort after a couple of appends in `fill`, then check nothing else is queued.
fn abort_during_fill(fill: SequencerState) {
    let mut r = runner("");
    start_and_run_to(&mut r, fill);
    let entered_with = r.context().segments_appended();
    while r.context().segments_appended() < entered_with + 2 {
        assert_eq!(r.cycle_once().state, fill);
    }
    let appended = r.hardware.pulse.appended_total();

    r.registers.post(Command::Abort);
    let out = r.cycle_once();

    assert!(out.command_accepted);
    assert_eq!(out.state, SequencerState::Idle);
    assert!(!out.fault);
    assert_eq!(r.hardware.pulse.current_mode(), PulseMode::Disabled);
    assert_eq!(r.hardware.pulse.output(), PulseOutput::Disabled);
    assert_eq!(r.hardware.pulse.free_entries(), r.hardware.pulse.fifo_depth());
    assert_eq!(r.hardware.pulse.actual_pulse_count(), 0);

    for _ in 0..100 {
        r.cycle_once();
    }
    assert_eq!(r.hardware.pulse.appended_total(), appended);
    assert_eq!(r.hardware.pulse.rejected_appends(), 0);
    assert_eq!(r.context().segments_appended(), entered_with + 2);
    assert_eq!(r.context().state(), SequencerState::Idle);
}

#[test]
fn abort_while_filling_positive_pass() {
    abort_during_fill(SequencerState::FillFifoPositive);
}

#[test]
fn abort_while_filling_negative_pass() {
    abort_during_fill(SequencerState::FillFifoNegative);
}

#[test]
fn abort_in_idle_keeps_fault_until_go() {
    let mut r = runner("");
    start_and_run_to(&mut r, SequencerState::MoveRowPositive);
    r.hardware.pulse.inject_residual(2);
    run_to(&mut r, SequencerState::Idle);
    assert!(r.registers.fault);

    r.registers.post(Command::Abort);
    let out = r.cycle_once();
    assert!(out.command_accepted);
    assert!(out.fault);
    assert_eq!(out.faults, SequencerFault::RESIDUAL_PULSES);

    r.registers.post(Command::Go);
    let out = r.cycle_once();
    assert!(!out.fault);
    assert!(!r.registers.fault);
    assert_eq!(r.registers.fault_bits, 0);
}

#[test]
fn second_go_runs_again() {
    let mut r = runner("[rows]\nrows_total = 1\n");
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("first run");
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("second run");

    assert_eq!(r.context().segments_appended(), 10);
    assert_eq!(r.context().row_index(), 1);
    assert_eq!(r.hardware.pulse.appended_total(), 20);
    assert_eq!(r.hardware.pulse.emitted_pulses(), 4 * 31);
}

#[test]
fn rows_come_from_parameter_table() {
    let mut r = runner("[rows]\nsource = \"parameter\"\nparameter_index = 5\nrows_total = 9\n");
    r.registers.integers[5] = 3;
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("run must finish");

    assert_eq!(r.context().rows_total(), 3);
    assert_eq!(r.context().row_index(), 3);
    assert_eq!(r.context().segments_appended(), 30);
    assert!(!r.context().fault());
}

#[test]
fn negative_row_parameter_is_an_empty_run() {
    let mut r = runner("[rows]\nsource = \"parameter\"\n");
    r.registers.integers[0] = -1;
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("run must finish");

    assert_eq!(r.context().rows_total(), 0);
    assert_eq!(r.hardware.pulse.appended_total(), 0);
}

#[test]
fn report_reflects_finished_run() {
    let mut r = runner("[shared]\nservice_name = \"line-7\"\n");
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("run must finish");

    let report = r.report();
    assert_eq!(report.service, "line-7");
    assert_eq!(report.state, SequencerState::Idle);
    assert_eq!(report.rows_completed, 2);
    assert_eq!(report.segments_appended, 20);
    assert_eq!(report.pulses_visible, 84);
    assert!(report.faults.is_empty());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["rows_total"], 2);
}
