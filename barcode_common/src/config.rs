//! Barcode configuration file plumbing.
//!
//! The sequencer configuration is one TOML file. [`ConfigLoader`] turns it
//! into any deserializable section tree; the `[shared]` table every file
//! carries is [`SharedConfig`]. Semantic checks live with the sections they
//! guard and report through [`ConfigError::ValidationError`], tagged with the
//! offending TOML table.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("barcode config {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot read barcode config {}: {message}", .path.display())]
    ReadError { path: PathBuf, message: String },

    /// TOML syntax error, unknown key or wrong value type.
    #[error("malformed barcode config: {0}")]
    ParseError(String),

    /// A value parsed but is unusable for the table named by `section`
    /// (`"rows"`, `"geometry"`, `"pattern"`, ...).
    #[error("invalid [{section}] config: {message}")]
    ValidationError {
        section: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Validation failure in the `[section]` table.
    pub fn invalid(section: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            section,
            message: message.into(),
        }
    }

    /// Table that failed validation, if any.
    pub fn section(&self) -> Option<&'static str> {
        match self {
            Self::ValidationError { section, .. } => Some(*section),
            _ => None,
        }
    }
}

/// `[shared] log_level`, the floor for the tracing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// `[shared]` table: which production line this sequencer drives and how
/// loudly it logs.
///
/// ```toml
/// [shared]
/// service_name = "barcode-line-1"
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharedConfig {
    /// Line identifier, echoed in logs and the run report.
    pub service_name: String,
    pub log_level: LogLevel,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            service_name: "barcode".to_owned(),
            log_level: LogLevel::default(),
        }
    }
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::invalid("shared", "service_name is blank"));
        }
        Ok(())
    }
}

/// Read a TOML file into a section tree.
///
/// A missing file is [`ConfigError::FileNotFound`], other I/O failures
/// [`ConfigError::ReadError`], syntax and schema errors
/// [`ConfigError::ParseError`]. No semantic validation happens here.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::ReadError {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
