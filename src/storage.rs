//! Storage layer for daysheet
//!
//! Everything lives under one data root:
//!
//! ```text
//! <root>/
//!   .daysheet.toml              # Configuration
//!   grid.json                   # Grid document (sheets, rows, cells)
//!   grid.json.lock              # Lock for structural grid writes
//!   grid.json.cells.lock        # Lock for task cell read-merge-write
//!   ledger/                     # Locked ledger strategy
//!     logs.jsonl                # One LogEntry per (employee, day)
//!     employees.jsonl           # One MetadataEntry per employee
//!   ledger.db                   # SQLite ledger strategy (when configured)
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::cell::CellData;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grid::{GridDocument, GridStore, SheetInfo};
use crate::lock::{self, FileLock, KeyspaceLock};

/// Name of the configuration file at the data root
pub const CONFIG_FILE: &str = ".daysheet.toml";

/// Paths and file helpers for one data root
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Grid document path, relative config paths resolved against the root
    pub fn grid_file(&self, config: &Config) -> PathBuf {
        self.resolve(&config.grid.path)
    }

    /// Ledger directory (locked strategy) or database file (sqlite strategy)
    pub fn ledger_path(&self, config: &Config) -> PathBuf {
        self.resolve(&config.ledger.path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

// =============================================================================
// JSON helpers
// =============================================================================

/// Write JSON to a file atomically
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    lock::write_atomic(path, json.as_bytes())
}

/// Read JSON from a file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Read every record of a JSONL file; a missing file is empty
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }

    Ok(records)
}

/// Replace a JSONL file with `records`, one per line, atomically
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record)?);
        buf.push('\n');
    }
    lock::write_atomic(path, buf.as_bytes())
}

// =============================================================================
// File-backed grid
// =============================================================================

/// Grid document persisted as one JSON file.
///
/// Reads load the whole document without locking; every mutation reloads
/// it under the sidecar file lock and replaces the file atomically.
#[derive(Debug, Clone)]
pub struct FileGrid {
    path: PathBuf,
    timeout_ms: u64,
}

impl FileGrid {
    /// Open an existing grid document.
    pub fn open(path: impl Into<PathBuf>, timeout_ms: u64) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "grid document {} (run `daysheet init`)",
                path.display()
            )));
        }
        Ok(Self { path, timeout_ms })
    }

    /// Create the grid document unless it already exists.
    pub fn create(path: impl Into<PathBuf>, doc: &GridDocument, timeout_ms: u64) -> Result<Self> {
        let path = path.into();
        let grid = Self { path, timeout_ms };
        if !grid.path.exists() {
            let _lock = FileLock::acquire(lock::lock_path_for(&grid.path), timeout_ms)?;
            if !grid.path.exists() {
                write_json(&grid.path, doc)?;
                tracing::info!(path = %grid.path.display(), sheets = doc.sheets.len(), "grid created");
            }
        }
        Ok(grid)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keyspace lock serializing task cell updates on this document.
    ///
    /// It uses its own lock file so holders can still call the mutating
    /// store methods, which take the structural lock.
    pub fn cell_lock(&self) -> KeyspaceLock {
        let path = PathBuf::from(format!("{}.cells.lock", self.path.display()));
        KeyspaceLock::new(format!("grid:{}", self.path.display()), path, self.timeout_ms)
    }

    fn load(&self) -> Result<GridDocument> {
        read_json(&self.path)
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut GridDocument) -> Result<T>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.timeout_ms)?;

        let mut doc = self.load()?;
        let result = f(&mut doc)?;
        write_json(&self.path, &doc)?;
        Ok(result)
    }
}

impl GridStore for FileGrid {
    fn list_sheets(&self) -> Result<Vec<SheetInfo>> {
        Ok(self.load()?.list_sheets())
    }

    fn read_header(&self, sheet: &str) -> Result<Vec<String>> {
        self.load()?.read_header(sheet)
    }

    fn read_names(&self, sheet: &str) -> Result<Vec<String>> {
        self.load()?.read_names(sheet)
    }

    fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<CellData>> {
        self.load()?.read_row(sheet, row)
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<CellData>>> {
        self.load()?.read_rows(sheet)
    }

    fn read_cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellData> {
        self.load()?.read_cell(sheet, row, col)
    }

    fn write_cell(&self, sheet: &str, row: usize, col: usize, cell: &CellData) -> Result<()> {
        self.update(|doc| doc.write_cell(sheet, row, col, cell))
    }

    fn append_row(&self, sheet: &str, values: &[String]) -> Result<()> {
        self.update(|doc| doc.append_row(sheet, values))
    }

    fn expand_columns(&self, sheet: &str, count: usize) -> Result<()> {
        self.update(|doc| doc.expand_columns(sheet, count))
    }

    fn add_sheet(&self, title: &str, column_count: usize) -> Result<()> {
        self.update(|doc| doc.add_sheet(title, column_count))
    }
}
