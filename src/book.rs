//! Task book: the update pipeline for one grid document.
//!
//! An update resolves sheet, row and day column, decodes the current cell,
//! merges the reported statuses and writes the cell back. The whole
//! sequence runs under the document's keyspace lock so concurrent updates
//! to the same cell never drop each other's tasks.

use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use serde::Serialize;

use crate::cell::{decode_cell, encode_cell, TaskEntry};
use crate::error::{Error, Result};
use crate::grid::GridStore;
use crate::lock::KeyspaceLock;
use crate::merge::{merge_tasks_with_summary, MergeSummary};
use crate::resolve::{
    column_name, find_or_create_column, find_or_create_row, resolve_sheet, ColumnPolicy,
};
use crate::status::ColorCodec;

/// Default chrono format of a day column label, e.g. `Mon 02-Jan`.
pub const DEFAULT_DATE_FORMAT: &str = "%a %d-%b";

/// How a book picks sheets and day columns.
#[derive(Debug, Clone)]
pub struct BookSettings {
    pub default_sheet: String,
    pub date_format: String,
    pub column_policy: ColumnPolicy,
    pub codec: ColorCodec,
}

impl Default for BookSettings {
    fn default() -> Self {
        Self {
            default_sheet: "DEV".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            column_policy: ColumnPolicy::default(),
            codec: ColorCodec::default(),
        }
    }
}

/// A batch of reported task statuses for one employee and day.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub employee_name: String,
    /// Target sheet; the book's default sheet when absent.
    pub sheet: Option<String>,
    /// Day label; today's label when absent.
    pub date: Option<String>,
    pub tasks: Vec<TaskEntry>,
}

/// Where an update landed and what the cell holds afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub employee_name: String,
    pub sheet: String,
    pub date: String,
    pub row: usize,
    /// A1 address of the written cell.
    pub cell: String,
    pub tasks: Vec<TaskEntry>,
    pub summary: MergeSummary,
}

/// Check that `format` is a usable chrono format string.
pub fn validate_date_format(format: &str) -> Result<()> {
    if format.trim().is_empty() {
        return Err(Error::InvalidConfig("grid.date_format cannot be empty".to_string()));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidConfig(format!(
            "grid.date_format: invalid format '{format}'"
        )));
    }
    Ok(())
}

/// Label of today's column in local time.
pub fn today_label(format: &str) -> Result<String> {
    validate_date_format(format)?;
    Ok(chrono::Local::now().format(format).to_string())
}

/// Update pipeline bound to one grid document.
pub struct TaskBook {
    store: Arc<dyn GridStore>,
    lock: KeyspaceLock,
    settings: BookSettings,
}

impl TaskBook {
    /// `lock` must guard the same document as `store`.
    pub fn new(store: Arc<dyn GridStore>, lock: KeyspaceLock, settings: BookSettings) -> Self {
        Self {
            store,
            lock,
            settings,
        }
    }

    /// Merge `update` into the target cell.
    ///
    /// Nothing is written to the cell unless every earlier step succeeded.
    /// Row and column creation are find-or-create steps and may already have
    /// happened when a later step fails.
    pub fn record_tasks(&self, update: &TaskUpdate) -> Result<UpdateOutcome> {
        let name = update.employee_name.trim();
        if name.is_empty() {
            return Err(Error::Validation("employee name cannot be empty".to_string()));
        }
        if update.tasks.is_empty() {
            return Err(Error::Validation("at least one task is required".to_string()));
        }
        let date = match update.date.as_deref().map(str::trim) {
            Some("") => return Err(Error::Validation("date label cannot be empty".to_string())),
            Some(label) => label.to_string(),
            None => today_label(&self.settings.date_format)?,
        };
        let wanted = update
            .sheet
            .as_deref()
            .unwrap_or(&self.settings.default_sheet);

        let store = self.store.as_ref();
        let _guard = self.lock.lock()?;

        let sheet = resolve_sheet(store, wanted)?;
        let row = find_or_create_row(store, &sheet, name)?;
        let col = find_or_create_column(store, &sheet, &date, self.settings.column_policy)?;

        let current = store.read_cell(&sheet, row, col)?;
        let existing = decode_cell(&current, &self.settings.codec)?;
        let (merged, summary) = merge_tasks_with_summary(&existing, &update.tasks);
        store.write_cell(&sheet, row, col, &encode_cell(&merged, &self.settings.codec))?;

        let cell = format!("{}{}", column_name(col), row + 1);
        tracing::info!(
            sheet = %sheet,
            cell = %cell,
            added = summary.added,
            updated = summary.updated,
            "task cell written"
        );
        Ok(UpdateOutcome {
            employee_name: name.to_string(),
            sheet,
            date,
            row,
            cell,
            tasks: merged,
            summary,
        })
    }
}
