//! daysheet log command implementations

use super::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

pub fn run_upsert(ctx: &Context, name: &str, date: &str) -> Result<()> {
    let entry = ctx.ledger()?.upsert_log(name, date)?;

    let mut human = HumanOutput::new(format!(
        "daysheet log upsert: {} {}",
        entry.employee_name, entry.task_date
    ));
    human.push_summary("created_at", entry.created_at.to_rfc3339());
    human.push_summary("updated_at", entry.updated_at.to_rfc3339());

    emit_success(ctx.output, "log upsert", &entry, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let logs = ctx.ledger()?.list_logs()?;

    let mut human = HumanOutput::new("Daily logs");
    human.push_summary("count", logs.len().to_string());
    for entry in &logs {
        human.push_detail(format!(
            "{} {} (updated {})",
            entry.employee_name,
            entry.task_date,
            entry.updated_at.to_rfc3339()
        ));
    }

    emit_success(ctx.output, "log list", &logs, Some(&human))
}
