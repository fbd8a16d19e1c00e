//! Row and column resolution.
//!
//! Rows are found by a case-insensitive scan of the name column; columns by
//! a case-insensitive match on the header row. Both have find-or-create
//! variants used by the update pipeline.

use serde::{Deserialize, Serialize};

use crate::cell::{same_text, CellData};
use crate::error::{Error, Result};
use crate::grid::GridStore;

/// Label written to A1 when a sheet has no header row yet.
pub const NAME_HEADER: &str = "Name";

/// Whether updates may target a day column other than the rightmost one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPolicy {
    #[default]
    AllowBackdated,
    LatestOnly,
}

/// A located employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowMatch {
    pub row: usize,
    /// Name as stored in the sheet.
    pub name: String,
}

/// Zero-based column index to A1 letters: 0 -> "A", 26 -> "AA".
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn require_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("employee name cannot be empty".to_string()));
    }
    Ok(name)
}

fn scan_names(names: &[String], name: &str) -> Option<RowMatch> {
    names
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, stored)| !stored.trim().is_empty() && same_text(stored, name))
        .map(|(row, stored)| RowMatch {
            row,
            name: stored.clone(),
        })
}

/// Locate an employee's row without modifying the sheet.
pub fn find_row(store: &dyn GridStore, sheet: &str, name: &str) -> Result<Option<RowMatch>> {
    let name = require_name(name)?;
    let names = store.read_names(sheet)?;
    Ok(scan_names(&names, name))
}

/// Locate an employee's row, appending one when absent.
///
/// The store does not report where an appended row landed, so the name
/// column is read again after the append.
pub fn find_or_create_row(store: &dyn GridStore, sheet: &str, name: &str) -> Result<usize> {
    let name = require_name(name)?;
    let names = store.read_names(sheet)?;
    if let Some(found) = scan_names(&names, name) {
        tracing::debug!(sheet, row = found.row, "employee row found");
        return Ok(found.row);
    }

    if names.is_empty() {
        store.append_row(sheet, &[NAME_HEADER.to_string()])?;
    } else if names[0].trim().is_empty() {
        store.write_cell(sheet, 0, 0, &CellData::plain(NAME_HEADER))?;
    }
    store.append_row(sheet, &[name.to_string()])?;

    let names = store.read_names(sheet)?;
    match scan_names(&names, name) {
        Some(found) => {
            tracing::info!(sheet, row = found.row, employee = name, "employee row created");
            Ok(found.row)
        }
        None => Err(Error::OperationFailed(format!(
            "row for '{name}' missing from sheet '{sheet}' after append"
        ))),
    }
}

/// Index of the day column labelled `label`, case-insensitively. Column A
/// holds names and never matches.
pub fn find_column(header: &[String], label: &str) -> Option<usize> {
    header
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, existing)| same_text(existing, label))
        .map(|(col, _)| col)
}

/// Locate the column labelled `label`, creating it at the right edge when
/// absent. The grid grows by one column when the new index reaches the
/// sheet's capacity.
pub fn find_or_create_column(
    store: &dyn GridStore,
    sheet: &str,
    label: &str,
    policy: ColumnPolicy,
) -> Result<usize> {
    let label = label.trim();
    if label.is_empty() {
        return Err(Error::Validation("date label cannot be empty".to_string()));
    }

    let header = store.read_header(sheet)?;
    let name_header = header.first().map_or(NAME_HEADER, String::as_str);
    if same_text(name_header, label) {
        return Err(Error::Validation(format!(
            "'{label}' is the name column header, not a day label"
        )));
    }
    if let Some(col) = find_column(&header, label) {
        if policy == ColumnPolicy::LatestOnly && col + 1 != header.len() {
            return Err(Error::BackdatedEdit {
                label: header[col].clone(),
                latest: header.last().cloned().unwrap_or_default(),
            });
        }
        tracing::debug!(sheet, column = %column_name(col), "date column found");
        return Ok(col);
    }

    let col = if header.is_empty() { 1 } else { header.len() };
    let capacity = store
        .list_sheets()?
        .into_iter()
        .find(|info| info.title == sheet)
        .map(|info| info.column_count)
        .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))?;
    if col >= capacity {
        store.expand_columns(sheet, col + 1 - capacity)?;
    }

    store.write_header(sheet, col, label)?;
    tracing::info!(sheet, column = %column_name(col), label, "date column created");
    Ok(col)
}

/// Match a requested sheet title against the document, case-insensitively.
pub fn resolve_sheet(store: &dyn GridStore, wanted: &str) -> Result<String> {
    let wanted = wanted.trim();
    store
        .list_sheets()?
        .into_iter()
        .find(|info| info.title.eq_ignore_ascii_case(wanted))
        .map(|info| info.title)
        .ok_or_else(|| Error::SheetNotFound(wanted.to_string()))
}
