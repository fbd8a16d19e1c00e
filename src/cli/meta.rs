//! daysheet meta command implementations

use super::Context;
use crate::error::Result;
use crate::ledger::MetadataEntry;
use crate::output::{emit_success, HumanOutput};

fn describe(human: &mut HumanOutput, entry: &MetadataEntry) {
    if let Some(id) = &entry.employee_id {
        human.push_summary("employee_id", id.clone());
    }
    if let Some(project) = &entry.project_name {
        human.push_summary("project", project.clone());
    }
    human.push_summary("created_at", entry.created_at.to_rfc3339());
    if let Some(updated_at) = entry.updated_at {
        human.push_summary("updated_at", updated_at.to_rfc3339());
    }
}

pub fn run_upsert(
    ctx: &Context,
    name: &str,
    employee_id: Option<&str>,
    project: Option<&str>,
) -> Result<()> {
    let entry = ctx.ledger()?.upsert_profile(name, employee_id, project)?;

    let mut human = HumanOutput::new(format!("daysheet meta upsert: {}", entry.employee_name));
    describe(&mut human, &entry);

    emit_success(ctx.output, "meta upsert", &entry, Some(&human))
}

pub fn run_touch(ctx: &Context, name: &str) -> Result<()> {
    let entry = ctx.ledger()?.touch_metadata(name)?;

    let human = match &entry {
        Some(entry) => {
            let mut human =
                HumanOutput::new(format!("daysheet meta touch: {}", entry.employee_name));
            describe(&mut human, entry);
            human
        }
        None => {
            let mut human =
                HumanOutput::new(format!("daysheet meta touch: {} not recorded", name.trim()));
            human.push_next_step(format!("daysheet meta upsert \"{}\"", name.trim()));
            human
        }
    };

    emit_success(ctx.output, "meta touch", &entry, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let entries = ctx.ledger()?.list_metadata()?;

    let mut human = HumanOutput::new("Employees");
    human.push_summary("count", entries.len().to_string());
    for entry in &entries {
        let project = entry.project_name.as_deref().unwrap_or("-");
        let id = entry.employee_id.as_deref().unwrap_or("-");
        human.push_detail(format!("{} (id {id}, project {project})", entry.employee_name));
    }

    emit_success(ctx.output, "meta list", &entries, Some(&human))
}
