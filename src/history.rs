//! History reads: decode the most recent non-empty day cells of an
//! employee's row, across one or several sheets.
//!
//! Multi-sheet reads fan out on a bounded pool of scoped threads. Results
//! are collected under a mutex and put back into a deterministic order after
//! every worker has joined, so output never depends on completion order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::cell::{decode_day, CellData, DayRecord};
use crate::error::{Error, Result};
use crate::grid::GridStore;
use crate::resolve::find_row;
use crate::status::ColorCodec;

/// Header label used when a day cell sits past the end of the header row.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Default number of concurrent sheet reads.
pub const DEFAULT_WORKERS: usize = 4;

/// Days of one employee, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeHistory {
    pub employee_name: String,
    pub sheet: String,
    pub history: Vec<DayRecord>,
}

/// Read options shared by the history operations.
#[derive(Debug, Clone, Copy)]
pub struct HistoryOptions {
    /// Stop after this many non-empty days; 0 reads every day.
    pub max_days: usize,
    /// Upper bound on concurrent sheet reads.
    pub workers: usize,
    pub codec: ColorCodec,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            max_days: 7,
            workers: DEFAULT_WORKERS,
            codec: ColorCodec::default(),
        }
    }
}

/// Decode a row's day cells from the rightmost column back to column B.
fn walk_row(
    header: &[String],
    cells: &[CellData],
    max_days: usize,
    codec: &ColorCodec,
) -> Result<Vec<DayRecord>> {
    let mut days = Vec::new();
    for col in (1..cells.len()).rev() {
        if max_days > 0 && days.len() >= max_days {
            break;
        }
        let cell = &cells[col];
        if cell.is_empty() {
            continue;
        }
        let date = header
            .get(col)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_DATE);
        days.push(decode_day(date, cell, codec)?);
    }
    Ok(days)
}

/// History of one employee in one sheet; `None` when the sheet has no row
/// for them.
pub fn fetch_history(
    store: &dyn GridStore,
    sheet: &str,
    name: &str,
    max_days: usize,
    codec: &ColorCodec,
) -> Result<Option<EmployeeHistory>> {
    let header = store.read_header(sheet)?;
    if header.is_empty() {
        return Ok(None);
    }
    let Some(found) = find_row(store, sheet, name)? else {
        return Ok(None);
    };

    let cells = store.read_row(sheet, found.row)?;
    let history = walk_row(&header, &cells, max_days, codec)?;
    tracing::debug!(sheet, row = found.row, days = history.len(), "history read");
    Ok(Some(EmployeeHistory {
        employee_name: found.name,
        sheet: sheet.to_string(),
        history,
    }))
}

/// History of one employee across `sheets`, in configured sheet order.
///
/// The name and sheet reported come from the first sheet holding the
/// employee. Sheets that fail to read are logged and skipped.
pub fn fetch_latest(
    store: &dyn GridStore,
    sheets: &[String],
    name: &str,
    options: &HistoryOptions,
) -> Result<EmployeeHistory> {
    let titles = existing_sheets(store, sheets)?;
    let results = fan_out(&titles, options.workers, |title| {
        fetch_history(store, title, name, options.max_days, &options.codec)
    });

    let found: Vec<EmployeeHistory> = collect_successes(&titles, results)?
        .into_iter()
        .flatten()
        .collect();

    let mut iter = found.into_iter();
    let Some(mut combined) = iter.next() else {
        return Err(Error::EmployeeNotFound(name.trim().to_string()));
    };
    for other in iter {
        combined.history.extend(other.history);
    }
    Ok(combined)
}

/// Every employee of every sheet, sorted by name.
pub fn fetch_all(
    store: &dyn GridStore,
    sheets: &[String],
    options: &HistoryOptions,
) -> Result<Vec<EmployeeHistory>> {
    let titles = existing_sheets(store, sheets)?;
    let results = fan_out(&titles, options.workers, |title| {
        sheet_histories(store, title, options.max_days, &options.codec)
    });

    let mut all: Vec<EmployeeHistory> = collect_successes(&titles, results)?
        .into_iter()
        .flatten()
        .collect();
    all.sort_by(|a, b| a.employee_name.cmp(&b.employee_name));
    Ok(all)
}

fn sheet_histories(
    store: &dyn GridStore,
    sheet: &str,
    max_days: usize,
    codec: &ColorCodec,
) -> Result<Vec<EmployeeHistory>> {
    let header = store.read_header(sheet)?;
    if header.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for cells in store.read_rows(sheet)?.iter().skip(1) {
        let Some(name) = cells.first().map(CellData::text) else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        out.push(EmployeeHistory {
            employee_name: name.to_string(),
            sheet: sheet.to_string(),
            history: walk_row(&header, cells, max_days, codec)?,
        });
    }
    Ok(out)
}

/// Configured titles that exist in the document, with the stored casing.
fn existing_sheets(store: &dyn GridStore, wanted: &[String]) -> Result<Vec<String>> {
    let available = store.list_sheets()?;
    let mut titles: Vec<String> = Vec::new();
    for title in wanted {
        match available
            .iter()
            .find(|info| info.title.eq_ignore_ascii_case(title.trim()))
        {
            Some(info) if !titles.contains(&info.title) => titles.push(info.title.clone()),
            Some(_) => {}
            None => tracing::debug!(sheet = %title, "configured sheet missing, skipped"),
        }
    }
    Ok(titles)
}

/// Drop failed sheets with a warning; fail only when nothing succeeded.
fn collect_successes<T>(titles: &[String], results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut ok = Vec::with_capacity(results.len());
    let mut first_err = None;
    for (title, result) in titles.iter().zip(results) {
        match result {
            Ok(value) => ok.push(value),
            Err(err) => {
                tracing::warn!(sheet = %title, error = %err, "sheet read failed, skipped");
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) if ok.is_empty() => Err(err),
        _ => Ok(ok),
    }
}

/// Run `f` over `jobs` on at most `workers` scoped threads.
///
/// Output order matches `jobs`, whatever order the workers finish in.
fn fan_out<T, R, F>(jobs: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if jobs.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, jobs.len());
    let next = AtomicUsize::new(0);
    let collected = Mutex::new(Vec::with_capacity(jobs.len()));

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                let Some(job) = jobs.get(idx) else {
                    break;
                };
                let result = f(job);
                collected
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push((idx, result));
            });
        }
    });

    let mut collected = collected
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    collected.sort_by_key(|(idx, _)| *idx);
    collected.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{encode_cell, TaskEntry};
    use crate::grid::{GridDocument, MemoryGrid, SheetInfo};
    use crate::status::Status;
    use std::time::Duration;

    fn entry(text: &str, status: Status) -> TaskEntry {
        TaskEntry::new(text, status).unwrap()
    }

    fn write_day(grid: &MemoryGrid, sheet: &str, row: usize, col: usize, entries: &[TaskEntry]) {
        grid.write_cell(sheet, row, col, &encode_cell(entries, &ColorCodec::default()))
            .unwrap();
    }

    fn sheet_with(grid: &MemoryGrid, sheet: &str, days: usize, names: &[&str]) {
        grid.append_row(sheet, &["Name".to_string()]).unwrap();
        for day in 1..=days {
            grid.write_header(sheet, day, &format!("Day {day:02}")).unwrap();
        }
        for name in names {
            grid.append_row(sheet, &[name.to_string()]).unwrap();
        }
    }

    fn sheets(titles: &[&str]) -> Vec<String> {
        titles.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn walks_backward_skipping_empty_days() {
        let grid = MemoryGrid::with_sheets(["DEV"]);
        sheet_with(&grid, "DEV", 4, &["Alice"]);
        write_day(&grid, "DEV", 1, 1, &[entry("first", Status::Complete)]);
        write_day(&grid, "DEV", 1, 3, &[entry("third", Status::Pending)]);

        let history = fetch_history(&grid, "DEV", "alice", 0, &ColorCodec::default())
            .unwrap()
            .unwrap();
        assert_eq!(history.employee_name, "Alice");
        let dates: Vec<_> = history.history.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["Day 03", "Day 01"]);
        assert_eq!(history.history[0].pending, vec!["third"]);
    }

    #[test]
    fn max_days_limits_records() {
        let grid = MemoryGrid::with_sheets(["DEV"]);
        sheet_with(&grid, "DEV", 10, &["Alice"]);
        for col in 1..=10 {
            write_day(&grid, "DEV", 1, col, &[entry(&format!("task {col}"), Status::Todo)]);
        }

        let history = fetch_history(&grid, "DEV", "Alice", 7, &ColorCodec::default())
            .unwrap()
            .unwrap();
        assert_eq!(history.history.len(), 7);
        assert_eq!(history.history[0].date, "Day 10");
        assert_eq!(history.history[6].date, "Day 04");
    }

    #[test]
    fn cells_past_the_header_are_unknown() {
        let grid = MemoryGrid::with_sheets(["DEV"]);
        sheet_with(&grid, "DEV", 1, &["Alice"]);
        write_day(&grid, "DEV", 1, 2, &[entry("late", Status::Todo)]);

        let history = fetch_history(&grid, "DEV", "Alice", 0, &ColorCodec::default())
            .unwrap()
            .unwrap();
        assert_eq!(history.history[0].date, UNKNOWN_DATE);
    }

    #[test]
    fn missing_employee_is_none() {
        let grid = MemoryGrid::with_sheets(["DEV"]);
        sheet_with(&grid, "DEV", 1, &["Alice"]);
        assert!(fetch_history(&grid, "DEV", "Bob", 0, &ColorCodec::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn latest_combines_sheets_in_configured_order() {
        let grid = MemoryGrid::with_sheets(["DEV", "Managers"]);
        sheet_with(&grid, "DEV", 2, &["Alice"]);
        sheet_with(&grid, "Managers", 2, &["alice"]);
        write_day(&grid, "DEV", 1, 2, &[entry("dev work", Status::Complete)]);
        write_day(&grid, "Managers", 1, 1, &[entry("review", Status::Pending)]);

        let history = fetch_latest(
            &grid,
            &sheets(&["Managers", "dev", "Ops"]),
            "ALICE",
            &HistoryOptions::default(),
        )
        .unwrap();
        assert_eq!(history.sheet, "Managers");
        assert_eq!(history.employee_name, "alice");
        assert_eq!(history.history.len(), 2);
        assert_eq!(history.history[0].pending, vec!["review"]);
        assert_eq!(history.history[1].complete, vec!["dev work"]);
    }

    #[test]
    fn latest_without_rows_is_not_found() {
        let grid = MemoryGrid::with_sheets(["DEV"]);
        sheet_with(&grid, "DEV", 1, &["Alice"]);
        let err = fetch_latest(&grid, &sheets(&["DEV"]), "Zed", &HistoryOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmployeeNotFound(ref name) if name == "Zed"));
    }

    #[test]
    fn row_without_days_has_empty_history() {
        let grid = MemoryGrid::with_sheets(["DEV"]);
        sheet_with(&grid, "DEV", 2, &["Alice"]);

        let history =
            fetch_latest(&grid, &sheets(&["DEV"]), "Alice", &HistoryOptions::default()).unwrap();
        assert_eq!(history.sheet, "DEV");
        assert!(history.history.is_empty());
    }

    #[test]
    fn all_employees_sorted_by_name() {
        let grid = MemoryGrid::with_sheets(["DEV", "Managers"]);
        sheet_with(&grid, "DEV", 1, &["Carol", "Alice"]);
        sheet_with(&grid, "Managers", 1, &["Bob"]);
        write_day(&grid, "DEV", 2, 1, &[entry("x", Status::Todo)]);
        // Row without a name is not an employee.
        write_day(&grid, "DEV", 4, 1, &[entry("orphan", Status::Todo)]);

        let all = fetch_all(&grid, &sheets(&["DEV", "Managers"]), &HistoryOptions::default())
            .unwrap();
        let names: Vec<_> = all.iter().map(|h| h.employee_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(all[0].history[0].todo, vec!["x"]);
        assert_eq!(all[1].sheet, "Managers");
    }

    /// Store whose first sheet answers slowly and whose "Broken" sheet fails.
    struct SlowStore {
        inner: MemoryGrid,
    }

    impl GridStore for SlowStore {
        fn list_sheets(&self) -> Result<Vec<SheetInfo>> {
            self.inner.list_sheets()
        }
        fn read_header(&self, sheet: &str) -> Result<Vec<String>> {
            if sheet == "Broken" {
                return Err(Error::OperationFailed("backend unavailable".into()));
            }
            if sheet == "A" {
                thread::sleep(Duration::from_millis(50));
            }
            self.inner.read_header(sheet)
        }
        fn read_names(&self, sheet: &str) -> Result<Vec<String>> {
            self.inner.read_names(sheet)
        }
        fn read_row(&self, sheet: &str, row: usize) -> Result<Vec<CellData>> {
            self.inner.read_row(sheet, row)
        }
        fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<CellData>>> {
            self.inner.read_rows(sheet)
        }
        fn read_cell(&self, sheet: &str, row: usize, col: usize) -> Result<CellData> {
            self.inner.read_cell(sheet, row, col)
        }
        fn write_cell(&self, sheet: &str, row: usize, col: usize, cell: &CellData) -> Result<()> {
            self.inner.write_cell(sheet, row, col, cell)
        }
        fn append_row(&self, sheet: &str, values: &[String]) -> Result<()> {
            self.inner.append_row(sheet, values)
        }
        fn expand_columns(&self, sheet: &str, count: usize) -> Result<()> {
            self.inner.expand_columns(sheet, count)
        }
        fn add_sheet(&self, title: &str, column_count: usize) -> Result<()> {
            self.inner.add_sheet(title, column_count)
        }
    }

    #[test]
    fn fan_out_order_ignores_completion_order() {
        let store = SlowStore {
            inner: MemoryGrid::new(GridDocument::with_sheets(["A", "B", "Broken"], 4)),
        };
        sheet_with(&store.inner, "A", 1, &["Zoe", "Adam"]);
        sheet_with(&store.inner, "B", 1, &["Adam", "Mia"]);
        sheet_with(&store.inner, "Broken", 1, &["Nobody"]);

        let all = fetch_all(&store, &sheets(&["A", "B", "Broken"]), &HistoryOptions::default())
            .unwrap();
        let pairs: Vec<_> = all
            .iter()
            .map(|h| (h.employee_name.as_str(), h.sheet.as_str()))
            .collect();
        // Equal names keep configured sheet order even though A finishes last.
        assert_eq!(pairs, vec![("Adam", "A"), ("Adam", "B"), ("Mia", "B"), ("Zoe", "A")]);
    }

    #[test]
    fn every_sheet_failing_returns_first_error() {
        let store = SlowStore {
            inner: MemoryGrid::new(GridDocument::with_sheets(["Broken"], 4)),
        };
        let err = fetch_all(&store, &sheets(&["Broken"]), &HistoryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::OperationFailed(_)));
    }

    #[test]
    fn fan_out_bounds_concurrency() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let jobs: Vec<usize> = (0..12).collect();
        let out = fan_out(&jobs, 3, |job| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
            job * 2
        });
        assert_eq!(out, jobs.iter().map(|j| j * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
