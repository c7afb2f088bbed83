//! End-to-end runs of the production barcode pattern.

use barcode_common::fault::SequencerFault;
use barcode_common::hal::pulse::{PulseEmitter, PulseMode};
use barcode_common::state::{Command, SequencerState};

use super::{RUN_CYCLES, run_to, runner, start_and_run_to};

#[test]
fn two_rows_append_twenty_segments() {
    let mut r = runner("");
    r.registers.post(Command::Go);
    let cycles = r.run_until_idle(RUN_CYCLES).expect("run must finish");
    assert!(cycles > 100);

    let ctx = r.context();
    assert_eq!(ctx.state(), SequencerState::Idle);
    assert!(!ctx.fault());
    assert_eq!(ctx.row_index(), 2);
    assert_eq!(ctx.segments_appended(), 20);

    let pulse = &r.hardware.pulse;
    assert_eq!(pulse.appended_total(), 20);
    assert_eq!(pulse.rejected_appends(), 0);
    // 31 pulses per pass, 21 of them in enabled segments.
    assert_eq!(pulse.emitted_pulses(), 4 * 31);
    assert_eq!(pulse.visible_pulses(), 4 * 21);
    assert_eq!(pulse.actual_pulse_count(), 0);

    assert!(!r.registers.fault);
    assert_eq!(r.registers.state(), Some(SequencerState::Idle));
    assert!((r.hardware.axis.position() - 19.9).abs() < 1e-6);
}

#[test]
fn pulses_land_on_the_reference_grid() {
    let mut r = runner("[rows]\nrows_total = 1\n");
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("run must finish");

    let log = r.hardware.pulse.pulse_log();
    assert_eq!(log.len(), 62);

    let (positive, negative) = log.split_at(31);
    for (k, pulse) in positive.iter().enumerate() {
        let expected = 20.0 + k as f64 * 0.1;
        assert!((pulse.position - expected).abs() < 1e-9, "pulse {k} at {}", pulse.position);
    }
    for (k, pulse) in negative.iter().enumerate() {
        let expected = 22.9 - k as f64 * 0.1;
        assert!((pulse.position - expected).abs() < 1e-9, "pulse {k} at {}", pulse.position);
    }

    // Positive bars: 8 on, 5 off, 8 on, 5 off, 5 on.
    let visible: Vec<bool> = positive.iter().map(|p| p.visible).collect();
    assert!(visible[..8].iter().all(|v| *v));
    assert!(visible[8..13].iter().all(|v| !*v));
    assert!(visible[13..21].iter().all(|v| *v));
    assert!(visible[21..26].iter().all(|v| !*v));
    assert!(visible[26..].iter().all(|v| *v));
}

#[test]
fn free_entries_signal_runs_the_same_pattern() {
    let mut r = runner("[emitter]\ndrain_signal = \"free_entries\"\n");
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("run must finish");

    assert!(!r.context().fault());
    assert_eq!(r.context().segments_appended(), 20);
    assert_eq!(r.hardware.pulse.rejected_appends(), 0);
    assert_eq!(r.hardware.pulse.emitted_pulses(), 4 * 31);
}

#[test]
fn zero_rows_never_fills() {
    let mut r = runner("[rows]\nrows_total = 0\n");
    r.registers.post(Command::Go);

    let mut states = Vec::new();
    for _ in 0..RUN_CYCLES {
        let out = r.cycle_once();
        if let Some(t) = out.transition {
            states.push(t.to);
            if t.to == SequencerState::Idle {
                break;
            }
        }
    }
    assert_eq!(states, vec![SequencerState::MoveToStart, SequencerState::Idle]);
    assert_eq!(r.hardware.pulse.appended_total(), 0);
    assert!(!r.context().fault());
}

#[test]
fn stalled_row_motion_waits_indefinitely() {
    let mut r = runner("");
    start_and_run_to(&mut r, SequencerState::MoveRowPositive);
    r.hardware.axis.set_stalled(true);

    for _ in 0..5_000 {
        r.cycle_once();
    }
    assert_eq!(r.context().state(), SequencerState::MoveRowPositive);
    assert!(!r.context().fault());
}

#[test]
fn stalled_row_motion_faults_after_deadline() {
    // Long enough for the initial move to the row start.
    let mut r = runner("[guards]\nmotion_timeout_cycles = 2000\n");
    start_and_run_to(&mut r, SequencerState::MoveRowPositive);
    r.hardware.axis.set_stalled(true);

    run_to(&mut r, SequencerState::Idle);
    let ctx = r.context();
    assert!(ctx.fault());
    assert_eq!(ctx.faults(), SequencerFault::MOTION_STALL);
    assert_eq!(ctx.row_index(), 0);
    assert!(r.registers.fault);
    assert_eq!(r.registers.fault_bits, SequencerFault::MOTION_STALL.bits());
    assert_eq!(r.hardware.pulse.current_mode(), PulseMode::Disabled);
}

#[test]
fn residual_pulses_fault_the_row() {
    let mut r = runner("");
    start_and_run_to(&mut r, SequencerState::MoveRowPositive);
    r.hardware.pulse.inject_residual(7);

    run_to(&mut r, SequencerState::Idle);
    let ctx = r.context();
    assert!(ctx.fault());
    assert_eq!(ctx.faults(), SequencerFault::RESIDUAL_PULSES);
    assert_eq!(ctx.row_index(), 0);
    assert_eq!(ctx.segments_appended(), 5);
    assert_eq!(r.hardware.pulse.actual_pulse_count(), 0);
    assert!(r.registers.fault);
}

#[test]
fn residual_on_negative_pass_keeps_completed_rows() {
    let mut r = runner("");
    start_and_run_to(&mut r, SequencerState::MoveRowNegative);
    run_to(&mut r, SequencerState::FillFifoPositive);
    run_to(&mut r, SequencerState::MoveRowNegative);
    assert_eq!(r.context().row_index(), 1);
    r.hardware.pulse.inject_residual(1);

    run_to(&mut r, SequencerState::Idle);
    assert!(r.context().fault());
    assert_eq!(r.context().row_index(), 1);
}
