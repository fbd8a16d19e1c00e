//! Upsert ledgers for daily logs and employee metadata.
//!
//! Both records are insert-or-touch: the first upsert for a key creates the
//! record, later ones only move `updated_at` forward. Keys are the trimmed,
//! lower-cased employee name (plus the day label for logs).
//!
//! Two strategies, chosen per ledger by configuration and never mixed:
//! - [`LockedLedger`]: JSONL files, each keyspace behind its own
//!   [`KeyspaceLock`] held across read-decide-write.
//! - [`SqliteLedger`]: one `INSERT ... ON CONFLICT DO UPDATE` statement per
//!   call; SQLite provides the atomicity.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::KeyspaceLock;
use crate::storage::{read_jsonl, write_jsonl};

/// One day of activity for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub employee_name: String,
    pub task_date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogEntry {
    fn matches(&self, name_key: &str, date_key: &str) -> bool {
        normalize(&self.employee_name) == name_key && normalize(&self.task_date) == date_key
    }
}

/// Profile record of one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub employee_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Persistence strategy of a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStrategy {
    #[default]
    Locked,
    Sqlite,
}

/// Idempotent record keeping for logs and metadata.
pub trait Ledger: Send + Sync {
    /// Insert the log for `(name, date)` or move its `updated_at` forward.
    fn upsert_log(&self, name: &str, date: &str) -> Result<LogEntry>;

    /// Insert the employee or move its `updated_at` forward.
    fn upsert_metadata(&self, name: &str) -> Result<MetadataEntry> {
        self.upsert_profile(name, None, None)
    }

    /// Like [`Ledger::upsert_metadata`], also setting the given profile fields.
    fn upsert_profile(
        &self,
        name: &str,
        employee_id: Option<&str>,
        project_name: Option<&str>,
    ) -> Result<MetadataEntry>;

    /// Move `updated_at` of an existing employee; absent employees are left
    /// alone.
    fn touch_metadata(&self, name: &str) -> Result<Option<MetadataEntry>>;

    fn list_logs(&self) -> Result<Vec<LogEntry>>;

    fn list_metadata(&self) -> Result<Vec<MetadataEntry>>;
}

/// Open the ledger at `path` with the given strategy.
pub fn open_ledger(
    strategy: LedgerStrategy,
    path: &Path,
    lock_timeout_ms: u64,
) -> Result<Box<dyn Ledger>> {
    Ok(match strategy {
        LedgerStrategy::Locked => Box::new(LockedLedger::open(path, lock_timeout_ms)?),
        LedgerStrategy::Sqlite => Box::new(SqliteLedger::open(path, lock_timeout_ms)?),
    })
}

// =============================================================================
// Input normalization
// =============================================================================

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Normalized identity of a name or label.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// True for labels shaped like `Mon 02-Jan`.
pub fn is_day_label(label: &str) -> bool {
    let Some((weekday, rest)) = label.trim().split_once(' ') else {
        return false;
    };
    let Some((day, month)) = rest.split_once('-') else {
        return false;
    };
    let day_ok = day.len() == 2
        && day.bytes().all(|b| b.is_ascii_digit())
        && matches!(day.parse::<u32>(), Ok(1..=31));
    day_ok
        && WEEKDAYS.contains(&weekday.to_ascii_lowercase().as_str())
        && MONTHS.contains(&month.to_ascii_lowercase().as_str())
}

fn clean_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("employee name cannot be empty".to_string()));
    }
    Ok(name)
}

fn clean_date(date: &str) -> Result<&str> {
    let date = date.trim();
    if date.is_empty() {
        return Err(Error::Validation("task date cannot be empty".to_string()));
    }
    if !is_day_label(date) {
        return Err(Error::Validation(format!(
            "task date '{date}' must look like 'Mon 02-Jan'"
        )));
    }
    Ok(date)
}

fn clean_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Locked JSONL strategy
// =============================================================================

/// File names inside a locked ledger directory
pub const LOGS_FILE: &str = "logs.jsonl";
pub const EMPLOYEES_FILE: &str = "employees.jsonl";

/// JSONL ledger guarded by one keyspace lock per file.
#[derive(Debug)]
pub struct LockedLedger {
    dir: PathBuf,
    logs: KeyspaceLock,
    metadata: KeyspaceLock,
}

impl LockedLedger {
    pub fn open(dir: impl Into<PathBuf>, lock_timeout_ms: u64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let logs = KeyspaceLock::for_file("logs", &dir.join(LOGS_FILE), lock_timeout_ms);
        let metadata =
            KeyspaceLock::for_file("metadata", &dir.join(EMPLOYEES_FILE), lock_timeout_ms);
        Ok(Self {
            dir,
            logs,
            metadata,
        })
    }

    pub fn logs_file(&self) -> PathBuf {
        self.dir.join(LOGS_FILE)
    }

    pub fn employees_file(&self) -> PathBuf {
        self.dir.join(EMPLOYEES_FILE)
    }

    fn update_metadata<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<MetadataEntry>) -> Result<(T, bool)>,
    {
        let _guard = self.metadata.lock()?;
        let path = self.employees_file();
        let mut records: Vec<MetadataEntry> = read_jsonl(&path)?;
        let (result, changed) = f(&mut records)?;
        if changed {
            write_jsonl(&path, &records)?;
        }
        Ok(result)
    }
}

fn later(current: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    current.max(now)
}

impl Ledger for LockedLedger {
    fn upsert_log(&self, name: &str, date: &str) -> Result<LogEntry> {
        let name = clean_name(name)?;
        let date = clean_date(date)?;
        let (name_key, date_key) = (normalize(name), normalize(date));

        let _guard = self.logs.lock()?;
        let path = self.logs_file();
        let mut records: Vec<LogEntry> = read_jsonl(&path)?;
        let now = Utc::now();

        let entry = match records.iter_mut().find(|r| r.matches(&name_key, &date_key)) {
            Some(existing) => {
                existing.updated_at = later(existing.updated_at, now);
                existing.clone()
            }
            None => {
                let entry = LogEntry {
                    employee_name: name.to_string(),
                    task_date: date.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                records.push(entry.clone());
                tracing::info!(employee = name, date, "daily log created");
                entry
            }
        };
        write_jsonl(&path, &records)?;
        Ok(entry)
    }

    fn upsert_profile(
        &self,
        name: &str,
        employee_id: Option<&str>,
        project_name: Option<&str>,
    ) -> Result<MetadataEntry> {
        let name = clean_name(name)?;
        let key = normalize(name);
        let employee_id = clean_field(employee_id);
        let project_name = clean_field(project_name);

        self.update_metadata(|records| {
            let now = Utc::now();
            let entry = match records
                .iter_mut()
                .find(|r| normalize(&r.employee_name) == key)
            {
                Some(existing) => {
                    if employee_id.is_some() {
                        existing.employee_id = employee_id;
                    }
                    if project_name.is_some() {
                        existing.project_name = project_name;
                    }
                    existing.updated_at = Some(existing.updated_at.map_or(now, |t| later(t, now)));
                    existing.clone()
                }
                None => {
                    let entry = MetadataEntry {
                        employee_name: name.to_string(),
                        employee_id,
                        project_name,
                        created_at: now,
                        updated_at: Some(now),
                    };
                    records.push(entry.clone());
                    tracing::info!(employee = name, "employee metadata created");
                    entry
                }
            };
            Ok((entry, true))
        })
    }

    fn touch_metadata(&self, name: &str) -> Result<Option<MetadataEntry>> {
        let key = normalize(clean_name(name)?);
        self.update_metadata(|records| {
            let Some(existing) = records
                .iter_mut()
                .find(|r| normalize(&r.employee_name) == key)
            else {
                return Ok((None, false));
            };
            let now = Utc::now();
            existing.updated_at = Some(existing.updated_at.map_or(now, |t| later(t, now)));
            Ok((Some(existing.clone()), true))
        })
    }

    fn list_logs(&self) -> Result<Vec<LogEntry>> {
        read_jsonl(&self.logs_file())
    }

    fn list_metadata(&self) -> Result<Vec<MetadataEntry>> {
        read_jsonl(&self.employees_file())
    }
}

// =============================================================================
// SQLite strategy
// =============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS daily_logs (
    employee_key  TEXT NOT NULL,
    date_key      TEXT NOT NULL,
    employee_name TEXT NOT NULL,
    task_date     TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (employee_key, date_key)
);

CREATE TABLE IF NOT EXISTS employees (
    employee_key  TEXT PRIMARY KEY,
    employee_name TEXT NOT NULL,
    employee_id   TEXT,
    project_name  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT
);
"#;

/// Server clock as fixed-width RFC 3339, so text order is time order.
const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// SQLite ledger. Each call opens its own connection, so concurrent callers
/// only contend inside SQLite.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteLedger {
    pub fn open(path: impl Into<PathBuf>, busy_timeout_ms: u64) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let ledger = Self {
            path,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        };
        ledger.connect()?.execute_batch(SCHEMA)?;
        tracing::debug!(path = %ledger.path.display(), "sqlite ledger opened");
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

fn parse_time(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
        })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        employee_name: row.get(0)?,
        task_date: row.get(1)?,
        created_at: parse_time(&row.get::<_, String>(2)?)?,
        updated_at: parse_time(&row.get::<_, String>(3)?)?,
    })
}

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<MetadataEntry> {
    let updated_at: Option<String> = row.get(4)?;
    Ok(MetadataEntry {
        employee_name: row.get(0)?,
        employee_id: row.get(1)?,
        project_name: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
        updated_at: updated_at.as_deref().map(parse_time).transpose()?,
    })
}

impl Ledger for SqliteLedger {
    fn upsert_log(&self, name: &str, date: &str) -> Result<LogEntry> {
        let name = clean_name(name)?;
        let date = clean_date(date)?;
        let sql = format!(
            "INSERT INTO daily_logs (employee_key, date_key, employee_name, task_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, {NOW}, {NOW})
             ON CONFLICT(employee_key, date_key) DO UPDATE SET
                 updated_at = max(daily_logs.updated_at, excluded.updated_at)
             RETURNING employee_name, task_date, created_at, updated_at"
        );
        let entry = self.connect()?.query_row(
            &sql,
            params![normalize(name), normalize(date), name, date],
            log_from_row,
        )?;
        tracing::info!(employee = name, date, "daily log upserted");
        Ok(entry)
    }

    fn upsert_profile(
        &self,
        name: &str,
        employee_id: Option<&str>,
        project_name: Option<&str>,
    ) -> Result<MetadataEntry> {
        let name = clean_name(name)?;
        let sql = format!(
            "INSERT INTO employees (employee_key, employee_name, employee_id, project_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, {NOW}, {NOW})
             ON CONFLICT(employee_key) DO UPDATE SET
                 employee_id = coalesce(excluded.employee_id, employees.employee_id),
                 project_name = coalesce(excluded.project_name, employees.project_name),
                 updated_at = max(coalesce(employees.updated_at, ''), excluded.updated_at)
             RETURNING employee_name, employee_id, project_name, created_at, updated_at"
        );
        let entry = self.connect()?.query_row(
            &sql,
            params![
                normalize(name),
                name,
                clean_field(employee_id),
                clean_field(project_name)
            ],
            metadata_from_row,
        )?;
        tracing::info!(employee = name, "employee metadata upserted");
        Ok(entry)
    }

    fn touch_metadata(&self, name: &str) -> Result<Option<MetadataEntry>> {
        let name = clean_name(name)?;
        let sql = format!(
            "UPDATE employees SET updated_at = max(coalesce(updated_at, ''), {NOW})
             WHERE employee_key = ?1
             RETURNING employee_name, employee_id, project_name, created_at, updated_at"
        );
        Ok(self
            .connect()?
            .query_row(&sql, params![normalize(name)], metadata_from_row)
            .optional()?)
    }

    fn list_logs(&self) -> Result<Vec<LogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT employee_name, task_date, created_at, updated_at FROM daily_logs ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], log_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_metadata(&self) -> Result<Vec<MetadataEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT employee_name, employee_id, project_name, created_at, updated_at
             FROM employees ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], metadata_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
