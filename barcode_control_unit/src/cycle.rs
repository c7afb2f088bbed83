//! Deterministic cycle: read → process → write.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. Prefault stack pages
//! 3. `sched_setaffinity` to the configured core
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`
//!
//! ## Cycle Body
//! Sample the host command and row parameter → `RowSequencer::tick()` →
//! acknowledge the command, publish status → step the hardware so this
//! cycle's writes latch before the next read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use barcode_common::config::ConfigError;
use barcode_common::fault::SequencerFault;
use barcode_common::hal::pulse::PulseEmitter;
use barcode_common::hal::registers::ControlRegisters;
use barcode_common::state::{Command, SequencerState};
use barcode_hal::SimMachine;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LoadedConfig;
use crate::sequencer::{RowSequencer, SequencerContext, SequencerInputs, SequencerOutputs};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    sum_cycle_ns: i64,
    pub overruns: u64,
    /// Worst wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or cycle execution.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("RT setup error: {0}")]
    RtSetup(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Hard deadline missed (RT builds only).
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun { actual_ns: i64, budget_ns: i64 },
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never takes a stack page fault.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xA5) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Lock memory, prefault the stack, pin the thread and raise its priority.
///
/// Without the `rt` feature only the stack prefault runs.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Run Report ─────────────────────────────────────────────────────

/// Summary of a run, printed by the binary as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub service: String,
    pub state: SequencerState,
    pub fault: bool,
    pub faults: Vec<String>,
    pub rows_completed: u32,
    pub rows_total: u32,
    pub segments_appended: u64,
    pub pulses_emitted: u64,
    pub pulses_visible: u64,
    pub rejected_appends: u64,
    pub final_position: f64,
    pub stats: CycleStats,
    pub avg_cycle_ns: i64,
}

fn fault_names(faults: SequencerFault) -> Vec<String> {
    faults.iter_names().map(|(name, _)| name.to_string()).collect()
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Binds the sequencer to the host registers and the simulated machine.
pub struct CycleRunner {
    pub config: LoadedConfig,
    /// Host register block; tests and the binary post commands here.
    pub registers: ControlRegisters,
    pub hardware: SimMachine,
    pub stats: CycleStats,
    sequencer: RowSequencer,
    context: SequencerContext,
    cycle_time_ns: i64,
}

impl CycleRunner {
    pub fn new(config: LoadedConfig) -> Self {
        let cycle_time_us = config.config.cycle.cycle_time_us;
        let hardware = SimMachine::new(
            &config.config.simulation,
            config.config.emitter.fifo_depth,
            Duration::from_micros(u64::from(cycle_time_us)),
        );
        let sequencer = RowSequencer::new(&config);
        let context = sequencer.context();
        Self {
            config,
            registers: ControlRegisters::default(),
            hardware,
            stats: CycleStats::new(),
            sequencer,
            context,
            cycle_time_ns: i64::from(cycle_time_us) * 1000,
        }
    }

    /// Keep a per-pulse log on the simulated pulse unit.
    pub fn with_pulse_log(mut self) -> Self {
        self.hardware = self.hardware.with_pulse_log();
        self
    }

    #[inline]
    pub fn context(&self) -> &SequencerContext {
        &self.context
    }

    #[inline]
    pub fn sequencer(&self) -> &RowSequencer {
        &self.sequencer
    }

    /// Execute one cycle body without pacing.
    pub fn cycle_once(&mut self) -> SequencerOutputs {
        // ═══ READ ═══
        let inputs = SequencerInputs {
            command: self.registers.command(),
            rows_parameter: self
                .sequencer
                .rows_parameter_index()
                .and_then(|index| self.registers.integer(index)),
        };

        // ═══ PROCESS ═══
        let outputs = self.sequencer.tick(
            &mut self.context,
            inputs,
            &mut self.hardware.axis,
            &mut self.hardware.pulse,
        );

        // ═══ WRITE ═══
        if inputs.command != Command::None {
            self.registers.acknowledge();
        }
        self.registers
            .publish(outputs.state, outputs.fault, outputs.faults);
        if let Some(t) = outputs.transition {
            if t.to == SequencerState::Idle && outputs.fault {
                warn!("Run ended with fault {:?}", fault_names(outputs.faults));
            }
        }

        self.hardware.step();
        outputs
    }

    /// Step unpaced until a run returns to `Idle`, at most `max_cycles`.
    ///
    /// Returns the cycles taken, or `None` if the limit was hit first.
    pub fn run_until_idle(&mut self, max_cycles: u64) -> Option<u64> {
        for cycle in 1..=max_cycles {
            let outputs = self.cycle_once();
            if Self::run_ended(&outputs) {
                return Some(cycle);
            }
        }
        None
    }

    fn run_ended(outputs: &SequencerOutputs) -> bool {
        matches!(outputs.transition, Some(t) if t.to == SequencerState::Idle)
    }

    /// Paced cycle loop.
    ///
    /// Returns when `running` is cleared, after `max_cycles` (0 = unbounded),
    /// or, with `stop_when_idle`, once a run has returned to `Idle`.
    pub fn run(
        &mut self,
        running: &AtomicBool,
        max_cycles: u64,
        stop_when_idle: bool,
    ) -> Result<(), CycleError> {
        info!(
            "Entering cycle loop: {}µs period",
            self.config.config.cycle.cycle_time_us
        );

        #[cfg(feature = "rt")]
        {
            self.run_rt_loop(running, max_cycles, stop_when_idle)
        }

        #[cfg(not(feature = "rt"))]
        {
            self.run_sim_loop(running, max_cycles, stop_when_idle)
        }
    }

    fn should_stop(&self, running: &AtomicBool, max_cycles: u64) -> bool {
        if !running.load(Ordering::Relaxed) {
            info!("Shutdown requested after {} cycles", self.stats.cycle_count);
            return true;
        }
        if max_cycles > 0 && self.stats.cycle_count >= max_cycles {
            info!("Cycle limit {} reached", max_cycles);
            return true;
        }
        false
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(
        &mut self,
        running: &AtomicBool,
        max_cycles: u64,
        stop_when_idle: bool,
    ) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")));
        let mut next_wake = now()?;

        while !self.should_stop(running, max_cycles) {
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let cycle_start = now()?;
            let outputs = self.cycle_once();
            let cycle_end = now()?;

            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            self.stats.record(duration_ns, 0);
            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns: self.cycle_time_ns,
                });
            }
            if stop_when_idle && Self::run_ended(&outputs) {
                break;
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
            let woke = now()?;
            self.stats.max_latency_ns = self
                .stats
                .max_latency_ns
                .max(timespec_diff_ns(&woke, &next_wake));
        }
        Ok(())
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(
        &mut self,
        running: &AtomicBool,
        max_cycles: u64,
        stop_when_idle: bool,
    ) -> Result<(), CycleError> {
        use std::time::Instant;

        let cycle_duration = Duration::from_nanos(self.cycle_time_ns as u64);

        while !self.should_stop(running, max_cycles) {
            let cycle_start = Instant::now();
            let outputs = self.cycle_once();
            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;

            self.stats.record(duration_ns, 0);
            if duration_ns > self.cycle_time_ns {
                // Simulation only counts overruns.
                self.stats.overruns += 1;
                tracing::debug!("Cycle overrun: {}ns", duration_ns);
            }
            if stop_when_idle && Self::run_ended(&outputs) {
                break;
            }

            if let Some(remaining) = cycle_duration.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    /// Snapshot of the current run for reporting.
    pub fn report(&self) -> RunReport {
        let pulse = &self.hardware.pulse;
        RunReport {
            service: self.config.config.shared.service_name.clone(),
            state: self.context.state(),
            fault: self.context.fault(),
            faults: fault_names(self.context.faults()),
            rows_completed: self.context.row_index(),
            rows_total: self.context.rows_total(),
            segments_appended: self.context.segments_appended(),
            pulses_emitted: pulse.emitted_pulses(),
            pulses_visible: pulse.visible_pulses(),
            rejected_appends: pulse.rejected_appends(),
            final_position: self.hardware.axis.position(),
            stats: self.stats.clone(),
            avg_cycle_ns: self.stats.avg_cycle_ns(),
        }
    }

    /// Pulses still queued on the pulse unit.
    #[inline]
    pub fn queued_pulses(&self) -> u32 {
        self.hardware.pulse.actual_pulse_count()
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let total = ts.tv_nsec() + ns;
    let secs = ts.tv_sec() + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    TimeSpec::new(secs, nanos)
}

#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}
