//! daysheet task command implementations
//!
//! `task add` runs the update pipeline and then records the day in the
//! ledger; `task show` and `task all` are history reads.
//!
//! The cell is committed before the ledger is touched. A ledger failure
//! after that point is reported as a warning with `logged: false`, and
//! rerunning the same `task add` is safe because the merge is idempotent.

use serde::Serialize;

use super::Context;
use crate::book::{TaskUpdate, UpdateOutcome};
use crate::cell::TaskEntry;
use crate::error::{Error, Result};
use crate::history::{fetch_all, fetch_latest, EmployeeHistory};
use crate::ledger::is_day_label;
use crate::output::{emit_success, HumanOutput};
use crate::status::Status;

pub struct AddOptions {
    pub employee: String,
    pub sheet: Option<String>,
    pub date: Option<String>,
    pub tasks: Vec<String>,
}

#[derive(Serialize)]
struct AddReport {
    #[serde(flatten)]
    outcome: UpdateOutcome,
    logged: bool,
}

/// Parse `TEXT=STATUS`; text without a status is todo.
pub(crate) fn parse_task_arg(raw: &str) -> Result<TaskEntry> {
    match raw.rsplit_once('=') {
        Some((text, status)) if !text.trim().is_empty() => {
            TaskEntry::new(text, status.parse::<Status>()?)
        }
        Some(_) => Err(Error::Validation(format!("task text missing in '{raw}'"))),
        None => TaskEntry::new(raw, Status::Todo),
    }
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let tasks = options
        .tasks
        .iter()
        .map(|raw| parse_task_arg(raw))
        .collect::<Result<Vec<_>>>()?;

    let book = ctx.book()?;
    let outcome = book.record_tasks(&TaskUpdate {
        employee_name: options.employee,
        sheet: options.sheet,
        date: options.date,
        tasks,
    })?;

    let mut human = HumanOutput::new(format!(
        "daysheet task add: {} {} ({})",
        outcome.employee_name, outcome.date, outcome.cell
    ));

    let logged = match record_day(ctx, &outcome, &mut human) {
        Ok(logged) => logged,
        Err(err) => {
            tracing::warn!(
                error = %err,
                cell = %outcome.cell,
                "ledger update failed after cell write"
            );
            human.push_warning(format!(
                "cell {} written but the ledger update failed: {err}",
                outcome.cell
            ));
            human.push_next_step("rerun the same task add to retry the ledger update");
            false
        }
    };

    human.push_summary("sheet", outcome.sheet.clone());
    human.push_summary("added", outcome.summary.added.to_string());
    human.push_summary("updated", outcome.summary.updated.to_string());
    for entry in &outcome.tasks {
        human.push_detail(format!("[{}] {}", entry.status, entry.text));
    }

    emit_success(
        ctx.output,
        "task add",
        &AddReport { outcome, logged },
        Some(&human),
    )
}

/// Upsert the day log and touch the employee's metadata. Returns whether a
/// daily log was written.
fn record_day(ctx: &Context, outcome: &UpdateOutcome, human: &mut HumanOutput) -> Result<bool> {
    let ledger = ctx.ledger()?;
    let logged = is_day_label(&outcome.date);
    if logged {
        ledger.upsert_log(&outcome.employee_name, &outcome.date)?;
    } else {
        tracing::warn!(date = %outcome.date, "day label not loggable, ledger skipped");
        human.push_warning(format!(
            "'{}' is not a 'Mon 02-Jan' label; daily log not recorded",
            outcome.date
        ));
    }
    ledger.touch_metadata(&outcome.employee_name)?;
    Ok(logged)
}

pub fn run_show(ctx: &Context, name: &str, days: Option<usize>) -> Result<()> {
    let grid = ctx.grid()?;
    let options = ctx.config.history_options(days);
    let history = fetch_latest(&grid, &ctx.config.grid.sheets, name, &options)?;

    let mut human = HumanOutput::new(format!("Tasks for {}", history.employee_name));
    human.push_summary("sheet", history.sheet.clone());
    human.push_summary("days", history.history.len().to_string());
    for day in &history.history {
        human.push_day(day);
    }

    emit_success(ctx.output, "task show", &history, Some(&human))
}

pub fn run_all(ctx: &Context, days: Option<usize>) -> Result<()> {
    let grid = ctx.grid()?;
    let options = ctx.config.history_options(days);
    let all: Vec<EmployeeHistory> = fetch_all(&grid, &ctx.config.grid.sheets, &options)?;

    let mut human = HumanOutput::new("Tasks for all employees");
    human.push_summary("employees", all.len().to_string());
    for employee in &all {
        let latest = employee
            .history
            .first()
            .map(|day| format!("{} ({} tasks)", day.date, day.len()))
            .unwrap_or_else(|| "no tasks".to_string());
        human.push_detail(format!(
            "{} [{}]: {latest}",
            employee.employee_name, employee.sheet
        ));
    }

    emit_success(ctx.output, "task all", &all, Some(&human))
}
