mod config_loading;
mod guards;
mod host_commands;
mod scenarios;

use barcode_common::state::{Command, SequencerState};
use barcode_control_unit::config::load_config_from_str;
use barcode_control_unit::cycle::CycleRunner;

/// Upper bound for one complete default run at 1 ms per cycle.
pub const RUN_CYCLES: u64 = 20_000;

pub fn runner(toml: &str) -> CycleRunner {
    CycleRunner::new(load_config_from_str(toml).expect("test config must load")).with_pulse_log()
}

/// Post `Go` and step until the sequencer reaches `state`.
pub fn start_and_run_to(runner: &mut CycleRunner, state: SequencerState) {
    runner.registers.post(Command::Go);
    run_to(runner, state);
}

/// Step until the sequencer reaches `state`.
pub fn run_to(runner: &mut CycleRunner, state: SequencerState) {
    for _ in 0..RUN_CYCLES {
        if runner.cycle_once().state == state {
            return;
        }
    }
    panic!(
        "never reached {state:?}, stuck in {:?}",
        runner.context().state()
    );
}
