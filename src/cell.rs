//! Cell codec: multi-line cell text plus color runs <-> ordered task entries.
//!
//! A cell holds one task per line. Runs are sparse: each run colors text from
//! its start offset until the next run starts. Offsets count characters,
//! not bytes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::{ColorCodec, Rgb, Status};

/// Separator between task lines inside one cell.
pub const LINE_BREAK: char = '\n';

/// One task line and its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub text: String,
    pub status: Status,
}

impl TaskEntry {
    /// Build a validated entry. The text is trimmed and must be non-empty
    /// and single-line.
    pub fn new(text: impl AsRef<str>, status: Status) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(Error::Validation("task text cannot be empty".to_string()));
        }
        if text.contains(LINE_BREAK) || text.contains('\r') {
            return Err(Error::Validation(format!(
                "task text cannot span lines: {text:?}"
            )));
        }
        Ok(Self {
            text: text.to_string(),
            status,
        })
    }

    /// Case-insensitive identity used by merges.
    pub fn same_task(&self, other: &str) -> bool {
        same_text(&self.text, other)
    }
}

pub(crate) fn same_text(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}

/// A formatting run starting at a character offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub start_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl TextRun {
    pub fn new(start_index: usize, color: Option<Rgb>) -> Self {
        Self { start_index, color }
    }
}

/// Raw cell contents as held by a grid store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<TextRun>,
    /// Cell-wide text color, consulted only when there are no runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl CellData {
    /// Plain text cell with no formatting.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            runs: Vec::new(),
            color: None,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }
}

/// Tasks of one day grouped by status, each list in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: String,
    pub todo: Vec<String>,
    pub pending: Vec<String>,
    pub complete: Vec<String>,
}

impl DayRecord {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, entry: &TaskEntry) {
        let bucket = match entry.status {
            Status::Todo => &mut self.todo,
            Status::Pending => &mut self.pending,
            Status::Complete => &mut self.complete,
        };
        bucket.push(entry.text.clone());
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.pending.len() + self.complete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group decoded entries into a [`DayRecord`].
pub fn day_record(date: impl Into<String>, entries: &[TaskEntry]) -> DayRecord {
    let mut record = DayRecord::new(date);
    for entry in entries {
        record.push(entry);
    }
    record
}

/// Decode a cell into ordered task entries.
///
/// Empty cells decode to an empty list. Runs must be sorted by start offset;
/// unsorted runs are rejected rather than silently misread.
pub fn decode_cell(cell: &CellData, codec: &ColorCodec) -> Result<Vec<TaskEntry>> {
    let text = cell.text();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    ensure_sorted(&cell.runs)?;

    let mut entries = Vec::new();
    let mut offset = 0usize;
    for line in text.split(LINE_BREAK) {
        let color = if cell.runs.is_empty() {
            cell.color.as_ref()
        } else {
            active_color(&cell.runs, offset)
        };

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            entries.push(TaskEntry {
                text: trimmed.to_string(),
                status: codec.classify(color),
            });
        }
        offset += line.chars().count() + 1;
    }
    Ok(entries)
}

/// Decode a cell straight into a [`DayRecord`].
pub fn decode_day(date: impl Into<String>, cell: &CellData, codec: &ColorCodec) -> Result<DayRecord> {
    let entries = decode_cell(cell, codec)?;
    Ok(day_record(date, &entries))
}

/// Encode entries into cell text with one run per entry.
pub fn encode_cell(entries: &[TaskEntry], codec: &ColorCodec) -> CellData {
    let mut text = String::new();
    let mut runs = Vec::with_capacity(entries.len());
    let mut offset = 0usize;

    for (idx, entry) in entries.iter().enumerate() {
        if idx > 0 {
            text.push(LINE_BREAK);
            offset += 1;
        }
        runs.push(TextRun::new(offset, Some(codec.color_for(entry.status))));
        text.push_str(&entry.text);
        offset += entry.text.chars().count();
    }

    CellData {
        text: Some(text),
        runs,
        color: None,
    }
}

fn ensure_sorted(runs: &[TextRun]) -> Result<()> {
    for pair in runs.windows(2) {
        if pair[1].start_index < pair[0].start_index {
            return Err(Error::MalformedCell(format!(
                "format runs out of order: {} after {}",
                pair[1].start_index, pair[0].start_index
            )));
        }
    }
    Ok(())
}

/// Color of the last run starting at or before `offset`.
fn active_color(runs: &[TextRun], offset: usize) -> Option<&Rgb> {
    runs.iter()
        .take_while(|run| run.start_index <= offset)
        .last()
        .and_then(|run| run.color.as_ref())
}
