//! Grid document model and the store contract the core consumes.
//!
//! A grid document is a set of named sheets. Row 0 of a sheet is the
//! header (column 0 is the name column, every further column one day);
//! column 0 of every other row is an employee name.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::cell::CellData;
use crate::error::{Error, Result};

/// Column capacity of a freshly created sheet (A..Z).
pub const DEFAULT_COLUMN_COUNT: usize = 26;

/// Title and capacity of one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub title: String,
    pub column_count: usize,
}

/// Operations a grid backend provides.
///
/// Every call is a synchronous round trip. Appending a row does not report
/// the new index, so callers re-read the name column afterwards.
pub trait GridStore: Send + Sync {
    fn list_sheets(&self) -> Result<Vec<SheetInfo>>;

    /// Text of the header row, trailing blanks dropped.
    fn read_header(&self, sheet: &str) -> Result<Vec<String>>;

    /// Text of column A for every row, header included.
    fn read_names(&self, sheet: &str) -> Result<Vec<String>>;

    /// All cells of one row with formatting.
    fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<CellData>>;

    /// Every row of a sheet with formatting.
    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<CellData>>>;

    fn read_cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellData>;

    /// Replace one cell's text and runs in a single write.
    fn write_cell(&self, sheet: &str, row: usize, col: usize, cell: &CellData) -> Result<()>;

    /// Append a row after the last non-empty row.
    fn append_row(&self, sheet: &str, values: &[String]) -> Result<()>;

    /// Grow the sheet's column capacity.
    fn expand_columns(&self, sheet: &str, count: usize) -> Result<()>;

    fn write_header(&self, sheet: &str, col: usize, label: &str) -> Result<()> {
        self.write_cell(sheet, 0, col, &CellData::plain(label))
    }

    fn add_sheet(&self, title: &str, column_count: usize) -> Result<()>;
}

/// One sheet of a grid document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub title: String,
    pub column_count: usize,
    #[serde(default)]
    pub rows: Vec<Vec<CellData>>,
}

impl Sheet {
    pub fn new(title: impl Into<String>, column_count: usize) -> Self {
        Self {
            title: title.into(),
            column_count,
            rows: Vec::new(),
        }
    }

    fn info(&self) -> SheetInfo {
        SheetInfo {
            title: self.title.clone(),
            column_count: self.column_count,
        }
    }

    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = self
            .rows
            .first()
            .map(|row| row.iter().map(|cell| cell.text().to_string()).collect())
            .unwrap_or_default();
        while header.last().is_some_and(|label| label.is_empty()) {
            header.pop();
        }
        header
    }

    fn names(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.first().map(|cell| cell.text().to_string()).unwrap_or_default())
            .collect()
    }

    fn cell(&self, row: usize, col: usize) -> CellData {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .cloned()
            .unwrap_or_default()
    }

    fn set_cell(&mut self, row: usize, col: usize, cell: &CellData) -> Result<()> {
        if col >= self.column_count {
            return Err(Error::OperationFailed(format!(
                "column {} exceeds grid width {} of sheet '{}'",
                crate::resolve::column_name(col),
                self.column_count,
                self.title
            )));
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, CellData::default);
        }
        cells[col] = cell.clone();
        Ok(())
    }

    fn append(&mut self, values: &[String]) -> Result<()> {
        if values.len() > self.column_count {
            return Err(Error::OperationFailed(format!(
                "row of {} values exceeds grid width {} of sheet '{}'",
                values.len(),
                self.column_count,
                self.title
            )));
        }
        // Row 0 is the header and stays put even when blank.
        while self.rows.len() > 1
            && self
                .rows
                .last()
                .is_some_and(|row| row.iter().all(CellData::is_empty))
        {
            self.rows.pop();
        }
        self.rows
            .push(values.iter().map(|value| CellData::plain(value.clone())).collect());
        Ok(())
    }
}

/// Serializable set of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridDocument {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

impl GridDocument {
    pub fn with_sheets<I, S>(titles: I, column_count: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sheets: titles
                .into_iter()
                .map(|title| Sheet::new(title, column_count))
                .collect(),
        }
    }

    pub fn sheet(&self, title: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.title == title)
            .ok_or_else(|| Error::SheetNotFound(title.to_string()))
    }

    pub fn sheet_mut(&mut self, title: &str) -> Result<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.title == title)
            .ok_or_else(|| Error::SheetNotFound(title.to_string()))
    }

    pub fn list_sheets(&self) -> Vec<SheetInfo> {
        self.sheets.iter().map(Sheet::info).collect()
    }

    pub fn read_header(&self, sheet: &str) -> Result<Vec<String>> {
        Ok(self.sheet(sheet)?.header())
    }

    pub fn read_names(&self, sheet: &str) -> Result<Vec<String>> {
        Ok(self.sheet(sheet)?.names())
    }

    pub fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<CellData>> {
        Ok(self.sheet(sheet)?.rows.get(row).cloned().unwrap_or_default())
    }

    pub fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<CellData>>> {
        Ok(self.sheet(sheet)?.rows.clone())
    }

    pub fn read_cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellData> {
        Ok(self.sheet(sheet)?.cell(row, col))
    }

    pub fn write_cell(&mut self, sheet: &str, row: usize, col: usize, cell: &CellData) -> Result<()> {
        self.sheet_mut(sheet)?.set_cell(row, col, cell)
    }

    pub fn append_row(&mut self, sheet: &str, values: &[String]) -> Result<()> {
        self.sheet_mut(sheet)?.append(values)
    }

    pub fn expand_columns(&mut self, sheet: &str, count: usize) -> Result<()> {
        let sheet = self.sheet_mut(sheet)?;
        sheet.column_count += count;
        Ok(())
    }

    pub fn add_sheet(&mut self, title: &str, column_count: usize) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("sheet title cannot be empty".to_string()));
        }
        if self
            .sheets
            .iter()
            .any(|sheet| sheet.title.eq_ignore_ascii_case(title))
        {
            return Err(Error::Validation(format!("sheet already exists: {title}")));
        }
        self.sheets.push(Sheet::new(title, column_count.max(1)));
        Ok(())
    }
}

/// In-process grid, shared between threads.
#[derive(Debug, Default)]
pub struct MemoryGrid {
    doc: RwLock<GridDocument>,
}

impl MemoryGrid {
    pub fn new(doc: GridDocument) -> Self {
        Self {
            doc: RwLock::new(doc),
        }
    }

    /// Grid with empty sheets of the default width.
    pub fn with_sheets<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(GridDocument::with_sheets(titles, DEFAULT_COLUMN_COUNT))
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> GridDocument {
        self.read(|doc| Ok(doc.clone())).unwrap_or_default()
    }

    fn read<T>(&self, f: impl FnOnce(&GridDocument) -> Result<T>) -> Result<T> {
        let doc = self.doc.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&doc)
    }

    fn write<T>(&self, f: impl FnOnce(&mut GridDocument) -> Result<T>) -> Result<T> {
        let mut doc = self.doc.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut doc)
    }
}

impl GridStore for MemoryGrid {
    fn list_sheets(&self) -> Result<Vec<SheetInfo>> {
        self.read(|doc| Ok(doc.list_sheets()))
    }

    fn read_header(&self, sheet: &str) -> Result<Vec<String>> {
        self.read(|doc| doc.read_header(sheet))
    }

    fn read_names(&self, sheet: &str) -> Result<Vec<String>> {
        self.read(|doc| doc.read_names(sheet))
    }

    fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<CellData>> {
        self.read(|doc| doc.read_row(sheet, row))
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<CellData>>> {
        self.read(|doc| doc.read_rows(sheet))
    }

    fn read_cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellData> {
        self.read(|doc| doc.read_cell(sheet, row, col))
    }

    fn write_cell(&self, sheet: &str, row: usize, col: usize, cell: &CellData) -> Result<()> {
        self.write(|doc| doc.write_cell(sheet, row, col, cell))
    }

    fn append_row(&self, sheet: &str, values: &[String]) -> Result<()> {
        self.write(|doc| doc.append_row(sheet, values))
    }

    fn expand_columns(&self, sheet: &str, count: usize) -> Result<()> {
        self.write(|doc| doc.expand_columns(sheet, count))
    }

    fn add_sheet(&self, title: &str, column_count: usize) -> Result<()> {
        self.write(|doc| doc.add_sheet(title, column_count))
    }
}
