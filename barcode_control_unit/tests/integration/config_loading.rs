//! Loading configuration files from disk.

use std::io::Write;
use std::path::Path;

use barcode_common::config::ConfigError;
use barcode_common::state::{Command, Direction};
use barcode_control_unit::config::{RowSource, load_config};
use barcode_control_unit::cycle::CycleRunner;
use tempfile::NamedTempFile;

use super::RUN_CYCLES;

#[test]
fn shipped_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/barcode.toml");
    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.config.rows.rows_total, 2);
    assert_eq!(loaded.config.rows.source, RowSource::Config);
    assert_eq!(loaded.table.segment_count(Direction::Positive), 5);
    assert_eq!(loaded.table.total_pulses(Direction::Negative), 31);
}

#[test]
fn custom_pattern_from_file_runs() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[rows]
rows_total = 1

[geometry]
start_position = 0.0
end_position = 1.0
reference_positive = 0.1
reference_negative = 0.9
delta_position = 0.05

[pattern]
positive = [{{ count = 4 }}, {{ count = 2, enabled = false }}, {{ count = 4 }}]
negative = [{{ count = 10 }}]

[emitter]
fifo_depth = 4

[simulation]
start_position = 0.0
"#
    )
    .unwrap();

    let loaded = load_config(file.path()).unwrap();
    let mut r = CycleRunner::new(loaded);
    r.registers.post(Command::Go);
    r.run_until_idle(RUN_CYCLES).expect("run must finish");

    assert!(!r.context().fault());
    assert_eq!(r.context().segments_appended(), 4);
    assert_eq!(r.hardware.pulse.emitted_pulses(), 20);
    assert_eq!(r.hardware.pulse.visible_pulses(), 18);
}

#[test]
fn invalid_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[geometry]\ndelta_position = -0.1").unwrap();
    let err = load_config(file.path()).unwrap_err();
    assert_eq!(err.section(), Some("geometry"));
    assert!(err.to_string().starts_with("invalid [geometry] config"), "{err}");
}

#[test]
fn malformed_file_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[rows\nrows_total = ").unwrap();
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}
