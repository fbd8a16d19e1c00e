//! Configuration loading and management
//!
//! Handles parsing of `.daysheet.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::book::{validate_date_format, BookSettings, DEFAULT_DATE_FORMAT};
use crate::error::{Error, Result};
use crate::grid::DEFAULT_COLUMN_COUNT;
use crate::history::{HistoryOptions, DEFAULT_WORKERS};
use crate::ledger::LedgerStrategy;
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::resolve::ColumnPolicy;
use crate::status::{validate_tolerance, ColorCodec, DEFAULT_TOLERANCE};
use crate::storage::CONFIG_FILE;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Grid document configuration
    #[serde(default)]
    pub grid: GridConfig,

    /// Status color codec configuration
    #[serde(default)]
    pub codec: CodecConfig,

    /// History read configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Log/metadata ledger configuration
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Grid document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Grid document path, relative to the data root
    #[serde(default = "default_grid_path")]
    pub path: PathBuf,

    /// Sheets read by history commands, in order
    #[serde(default = "default_sheets")]
    pub sheets: Vec<String>,

    /// Sheet receiving updates that name none
    #[serde(default = "default_sheet")]
    pub default_sheet: String,

    /// chrono format of a day column label
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Whether updates may target older day columns
    #[serde(default)]
    pub column_policy: ColumnPolicy,

    /// Column capacity of sheets created by `init`
    #[serde(default = "default_initial_columns")]
    pub initial_columns: usize,
}

fn default_grid_path() -> PathBuf {
    PathBuf::from("grid.json")
}

fn default_sheets() -> Vec<String> {
    vec!["DEV".to_string(), "Managers".to_string()]
}

fn default_sheet() -> String {
    "DEV".to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_initial_columns() -> usize {
    DEFAULT_COLUMN_COUNT
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            path: default_grid_path(),
            sheets: default_sheets(),
            default_sheet: default_sheet(),
            date_format: default_date_format(),
            column_policy: ColumnPolicy::default(),
            initial_columns: default_initial_columns(),
        }
    }
}

/// Status color codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Per-channel match tolerance in (0, 1]
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

/// History read configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Non-empty days returned per employee; 0 means all
    #[serde(default = "default_max_days")]
    pub max_days: usize,

    /// Concurrent sheet reads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_max_days() -> usize {
    7
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
            workers: default_workers(),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub strategy: LedgerStrategy,

    /// Directory (locked) or database file (sqlite), relative to the data root
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,

    /// File lock / busy timeout in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("ledger")
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            strategy: LedgerStrategy::default(),
            path: default_ledger_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.daysheet.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data root, or return defaults when absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn codec(&self) -> ColorCodec {
        // Tolerance is checked by `validate`; fall back for hand-built configs.
        ColorCodec::new(self.codec.tolerance).unwrap_or_default()
    }

    pub fn book_settings(&self) -> BookSettings {
        BookSettings {
            default_sheet: self.grid.default_sheet.clone(),
            date_format: self.grid.date_format.clone(),
            column_policy: self.grid.column_policy,
            codec: self.codec(),
        }
    }

    /// History options, with `max_days` overriding the configured limit
    pub fn history_options(&self, max_days: Option<usize>) -> HistoryOptions {
        HistoryOptions {
            max_days: max_days.unwrap_or(self.history.max_days),
            workers: self.history.workers,
            codec: self.codec(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        validate_tolerance(self.codec.tolerance)?;
        if self.history.workers == 0 {
            return Err(Error::InvalidConfig(
                "history.workers must be >= 1".to_string(),
            ));
        }
        if self.ledger.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "ledger.path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("grid.path cannot be empty".to_string()));
        }
        if self.sheets.is_empty() {
            return Err(Error::InvalidConfig("grid.sheets cannot be empty".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for sheet in &self.sheets {
            let trimmed = sheet.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidConfig(
                    "grid.sheets cannot include empty entries".to_string(),
                ));
            }
            if !seen.insert(trimmed.to_lowercase()) {
                return Err(Error::InvalidConfig(format!(
                    "grid.sheets has duplicate entry '{trimmed}'"
                )));
            }
        }

        if self.default_sheet.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "grid.default_sheet cannot be empty".to_string(),
            ));
        }
        if self.initial_columns < 2 {
            return Err(Error::InvalidConfig(
                "grid.initial_columns must be >= 2".to_string(),
            ));
        }
        validate_date_format(&self.date_format)
    }
}
