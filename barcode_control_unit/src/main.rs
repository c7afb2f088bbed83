//! # Barcode Control Unit
//!
//! Loads the sequencer configuration, performs RT setup and runs the row
//! sequencer against the simulated axis and pulse unit at the configured
//! cycle period.
//!
//! With `--go` the binary posts a `Go` command itself, stops once the run
//! has returned to `Idle` and prints a JSON run report.

use barcode_common::config::{ConfigError, LogLevel};
use barcode_common::state::Command;
use barcode_control_unit::config::{LoadedConfig, RowSource, load_config};
use barcode_control_unit::cycle::{CycleRunner, rt_setup};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Barcode Control Unit: isochronous row sequencer
#[derive(Parser, Debug)]
#[command(name = "barcode_control_unit")]
#[command(version)]
#[command(about = "Motion-synchronized pulse-train row sequencer")]
struct Args {
    /// Path to the sequencer configuration TOML.
    #[arg(default_value = "config/barcode.toml")]
    config: PathBuf,

    /// CPU core to pin the RT thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Post a Go command at startup and exit when the run returns to Idle.
    #[arg(long)]
    go: bool,

    /// Row count written to the host parameter table before Go.
    #[arg(long, value_name = "N")]
    rows: Option<i32>,

    /// Stop after this many cycles (overrides `[cycle] max_cycles`).
    #[arg(long, value_name = "N")]
    max_cycles: Option<u64>,

    /// Print the JSON run report on exit.
    #[arg(long)]
    report: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Config first so `[shared] log_level` can seed the filter.
    let loaded = load_config(&args.config);
    let level = loaded
        .as_ref()
        .map(|l| l.config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    info!("Barcode Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| config_error(&args, e))
        .and_then(|loaded| run(&args, loaded));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Barcode Control Unit shutdown complete");
}

fn config_error(args: &Args, e: ConfigError) -> Box<dyn std::error::Error> {
    match e {
        ConfigError::FileNotFound(_) | ConfigError::ReadError { .. } => e.into(),
        _ => format!("{}: {e}", args.config.display()).into(),
    }
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: service={}, cycle_time={}µs, rows={} ({:?}), fifo_depth={}, drain={:?}",
        loaded.config.shared.service_name,
        loaded.config.cycle.cycle_time_us,
        loaded.config.rows.rows_total,
        loaded.config.rows.source,
        loaded.config.emitter.fifo_depth,
        loaded.config.emitter.drain_signal,
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let max_cycles = args.max_cycles.unwrap_or(loaded.config.cycle.max_cycles);
    let mut runner = CycleRunner::new(loaded);

    if let Some(rows) = args.rows {
        let source = runner.config.config.rows;
        if source.source == RowSource::Parameter {
            runner.registers.integers[source.parameter_index] = rows;
        } else {
            warn!("--rows ignored: rows.source is \"config\"");
        }
    }
    if args.go {
        runner.registers.post(Command::Go);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    runner.run(&running, max_cycles, args.go)?;

    let report = runner.report();
    info!(
        "Final state {:?}: rows {}/{}, {} segments, fault={}",
        report.state, report.rows_completed, report.rows_total, report.segments_appended, report.fault
    );
    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if report.fault {
        return Err(format!("run ended with fault {:?}", report.faults).into());
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
