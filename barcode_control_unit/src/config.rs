//! TOML configuration loader with validation.
//!
//! Loads the sequencer configuration from a single TOML file and validates
//! everything that could otherwise surface mid-row: pattern shape, FIFO
//! capacity, geometry ordering and whether each pattern fits inside its row
//! travel. A config that passes here cannot produce an index error or an
//! unavoidable residual-pulse fault at runtime.

use std::path::Path;

use barcode_common::config::{ConfigError, ConfigLoader, SharedConfig};
use barcode_common::consts::{
    DEFAULT_CYCLE_TIME_US, MAX_FIFO_DEPTH, PARAMETER_COUNT, POSITION_TOLERANCE,
};
use barcode_common::state::Direction;
use barcode_hal::SimConfig;
use serde::{Deserialize, Serialize};

use crate::emitter::DrainSignal;
use crate::geometry::RowGeometry;
use crate::pattern::{PulseSegment, SegmentTable};

// ─── Sections ───────────────────────────────────────────────────────

/// Cycle timing (`[cycle]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    /// Isochronous period [µs].
    pub cycle_time_us: u32,
    /// Stop the loop after this many cycles (0 = unbounded).
    pub max_cycles: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: DEFAULT_CYCLE_TIME_US,
            max_cycles: 0,
        }
    }
}

/// Where `rows_total` comes from when a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowSource {
    /// Fixed value from this file.
    #[default]
    Config,
    /// Host integer parameter table, read at `Go`.
    Parameter,
}

/// Row count and looping (`[rows]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RowsConfig {
    /// Positive/negative row pairs per run.
    pub rows_total: u32,
    pub source: RowSource,
    /// Index into the host integer table when `source = "parameter"`.
    pub parameter_index: usize,
    /// Continue with the next positive pass after a negative pass.
    pub loop_rows: bool,
}

impl Default for RowsConfig {
    fn default() -> Self {
        Self {
            rows_total: 2,
            source: RowSource::Config,
            parameter_index: 0,
            loop_rows: true,
        }
    }
}

/// Row positions and pulse spacing (`[geometry]`), in axis user units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    /// Row start; the negative pass ends here.
    pub start_position: f64,
    /// Row end; the positive pass ends here.
    pub end_position: f64,
    /// First pulse position of the positive pass.
    pub reference_positive: f64,
    /// First pulse position of the negative pass.
    pub reference_negative: f64,
    /// Distance between consecutive pulses.
    pub delta_position: f64,
    /// Width of an enabled pulse [s].
    pub pulse_width: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        let start_position = 19.9;
        let delta_position = 0.1;
        let end_position = start_position + 31.0 * delta_position;
        Self {
            start_position,
            end_position,
            reference_positive: start_position + delta_position,
            reference_negative: end_position - delta_position,
            delta_position,
            pulse_width: 0.00001,
        }
    }
}

/// Row patterns (`[pattern]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternConfig {
    pub positive: Vec<PulseSegment>,
    pub negative: Vec<PulseSegment>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        let table = SegmentTable::default();
        Self {
            positive: table.pattern(Direction::Positive).to_vec(),
            negative: table.pattern(Direction::Negative).to_vec(),
        }
    }
}

/// Pulse unit parameters (`[emitter]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterConfig {
    /// Hardware signal confirming each append before the next one.
    pub drain_signal: DrainSignal,
    /// FIFO capacity [entries].
    pub fifo_depth: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            drain_signal: DrainSignal::default(),
            fifo_depth: 16,
        }
    }
}

/// Smallest usable `guard_timeout_cycles`: every fill spends one cycle on
/// the mode write before the first append, and a write is read back one
/// cycle later.
pub const MIN_GUARD_TIMEOUT_CYCLES: u32 = 2;

/// Stall deadlines (`[guards]`). Absent values wait indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Consecutive fill cycles without progress before `GUARD_STALL`.
    pub guard_timeout_cycles: Option<u32>,
    /// Cycles a move may take before `MOTION_STALL`.
    pub motion_timeout_cycles: Option<u32>,
}

/// Complete sequencer configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "barcode-line-1"
///
/// [rows]
/// rows_total = 2
///
/// [pattern]
/// positive = [{ count = 8 }, { count = 5, enabled = false }, { count = 8 }]
/// negative = [{ count = 8 }, { count = 5, enabled = false }, { count = 8 }]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BarcodeConfig {
    pub shared: SharedConfig,
    pub cycle: CycleConfig,
    pub rows: RowsConfig,
    pub geometry: GeometryConfig,
    pub pattern: PatternConfig,
    pub emitter: EmitterConfig,
    pub guards: GuardConfig,
    pub simulation: SimConfig,
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Validated configuration with the derived runtime tables.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BarcodeConfig,
    pub table: SegmentTable,
    pub geometry: RowGeometry,
}

/// Load and validate the sequencer configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    validate(BarcodeConfig::load(path)?)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    validate(BarcodeConfig::from_toml(content)?)
}

/// Validate a parsed config and build the runtime tables.
pub fn validate(config: BarcodeConfig) -> Result<LoadedConfig, ConfigError> {
    config.shared.validate()?;
    validate_cycle(&config.cycle)?;
    validate_rows(&config.rows)?;
    validate_emitter(&config.emitter)?;
    validate_guards(&config.guards)?;
    validate_simulation(&config.simulation)?;

    let table = SegmentTable::new(&config.pattern.positive, &config.pattern.negative)
        .map_err(|e| ConfigError::invalid("pattern", e.to_string()))?;
    validate_fifo_capacity(&table, config.emitter.fifo_depth)?;

    validate_geometry(&config.geometry)?;
    let geometry = RowGeometry::from_config(&config.geometry);
    validate_pattern_span(&table, &geometry)?;

    Ok(LoadedConfig {
        config,
        table,
        geometry,
    })
}

fn validate_cycle(cycle: &CycleConfig) -> Result<(), ConfigError> {
    if cycle.cycle_time_us == 0 {
        return Err(ConfigError::invalid("cycle", "cycle_time_us must be > 0"));
    }
    Ok(())
}

fn validate_rows(rows: &RowsConfig) -> Result<(), ConfigError> {
    if rows.source == RowSource::Parameter && rows.parameter_index >= PARAMETER_COUNT {
        return Err(ConfigError::invalid(
            "rows",
            format!(
                "parameter_index {} out of range [0, {})",
                rows.parameter_index, PARAMETER_COUNT
            ),
        ));
    }
    Ok(())
}

fn validate_emitter(emitter: &EmitterConfig) -> Result<(), ConfigError> {
    if emitter.fifo_depth == 0 || emitter.fifo_depth > MAX_FIFO_DEPTH {
        return Err(ConfigError::invalid(
            "emitter",
            format!(
                "fifo_depth {} out of range [1, {}]",
                emitter.fifo_depth, MAX_FIFO_DEPTH
            ),
        ));
    }
    Ok(())
}

fn validate_guards(guards: &GuardConfig) -> Result<(), ConfigError> {
    if let Some(cycles) = guards
        .guard_timeout_cycles
        .filter(|&c| c < MIN_GUARD_TIMEOUT_CYCLES)
    {
        return Err(ConfigError::invalid(
            "guards",
            format!(
                "guard_timeout_cycles {} below minimum {}",
                cycles, MIN_GUARD_TIMEOUT_CYCLES
            ),
        ));
    }
    if guards.motion_timeout_cycles == Some(0) {
        return Err(ConfigError::invalid(
            "guards",
            "motion_timeout_cycles must be > 0 when set",
        ));
    }
    Ok(())
}

fn validate_simulation(sim: &SimConfig) -> Result<(), ConfigError> {
    if !(sim.max_velocity > 0.0) || !(sim.max_acceleration > 0.0) {
        return Err(ConfigError::invalid(
            "simulation",
            "max_velocity and max_acceleration must be > 0",
        ));
    }
    if !sim.start_position.is_finite() || !(sim.in_position_window >= 0.0) {
        return Err(ConfigError::invalid(
            "simulation",
            "start_position/in_position_window invalid",
        ));
    }
    Ok(())
}

/// The axis is stationary while a pass is loaded, so the whole pattern has
/// to fit in the FIFO at once.
fn validate_fifo_capacity(table: &SegmentTable, fifo_depth: usize) -> Result<(), ConfigError> {
    for direction in [Direction::Positive, Direction::Negative] {
        let count = table.segment_count(direction);
        if count > fifo_depth {
            return Err(ConfigError::invalid(
                "pattern",
                format!(
                    "{direction} pattern has {count} segments but fifo_depth is {fifo_depth}"
                ),
            ));
        }
    }
    Ok(())
}

fn validate_geometry(g: &GeometryConfig) -> Result<(), ConfigError> {
    let values = [
        g.start_position,
        g.end_position,
        g.reference_positive,
        g.reference_negative,
        g.delta_position,
        g.pulse_width,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ConfigError::invalid("geometry", "values must be finite"));
    }
    if g.delta_position <= 0.0 {
        return Err(ConfigError::invalid("geometry", "delta_position must be > 0"));
    }
    if g.pulse_width < 0.0 {
        return Err(ConfigError::invalid("geometry", "pulse_width must be >= 0"));
    }
    if g.start_position >= g.end_position {
        return Err(ConfigError::invalid(
            "geometry",
            format!(
                "start_position {} must be below end_position {}",
                g.start_position, g.end_position
            ),
        ));
    }
    // A reference on the parking position would fire while the FIFO is filling.
    for (name, reference) in [
        ("reference_positive", g.reference_positive),
        ("reference_negative", g.reference_negative),
    ] {
        if reference <= g.start_position + POSITION_TOLERANCE
            || reference >= g.end_position - POSITION_TOLERANCE
        {
            return Err(ConfigError::invalid(
                "geometry",
                format!(
                    "{name} {reference} must lie strictly between start {} and end {}",
                    g.start_position, g.end_position
                ),
            ));
        }
    }
    Ok(())
}

/// Last pulse of each pass must be reachable before the row-end target.
fn validate_pattern_span(table: &SegmentTable, geometry: &RowGeometry) -> Result<(), ConfigError> {
    for direction in [Direction::Positive, Direction::Negative] {
        let pulses = table.total_pulses(direction);
        if pulses == 0 {
            continue;
        }
        let span = (pulses - 1) as f64 * geometry.delta_position();
        let last = geometry.reference(direction) + direction.sign() * span;
        let end = geometry.row_end(direction);
        if (end - last) * direction.sign() < -1e-6 {
            return Err(ConfigError::invalid(
                "pattern",
                format!(
                    "{direction} pattern ({pulses} pulses) ends at {last:.6}, beyond row end {end}"
                ),
            ));
        }
    }
    Ok(())
}
