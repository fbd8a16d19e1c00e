//! Shared output formatting for daysheet CLI commands.
//!
//! Every command prints either a human summary or, with `--json`, one
//! envelope object carrying `schema_version`, `command`, `status` and
//! `data` (or `error`).

use serde::Serialize;

use crate::cell::DayRecord;
use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "daysheet.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }

    /// One detail line per task of `day`, grouped by status.
    pub fn push_day(&mut self, day: &DayRecord) {
        let groups = [
            ("complete", &day.complete),
            ("pending", &day.pending),
            ("todo", &day.todo),
        ];
        for (status, tasks) in groups {
            for task in tasks.iter() {
                self.details.push(format!("{} [{status}] {task}", day.date));
            }
        }
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: err.kind(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// Best-effort `command [subcommand]` name for error envelopes, read before
/// clap parses so parse failures still report something.
pub fn infer_command_name_from_args() -> String {
    let mut positional = std::env::args().skip(1).filter(|arg| !arg.starts_with('-'));

    let Some(command) = positional.next() else {
        return "daysheet".to_string();
    };

    if matches!(command.as_str(), "task" | "log" | "meta") {
        if let Some(sub) = positional.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::InvalidConfig(_) => vec!["fix .daysheet.toml then retry".to_string()],
        Error::NotFound(_) => vec!["daysheet init".to_string()],
        Error::EmployeeNotFound(_) => vec!["daysheet task all".to_string()],
        Error::SheetNotFound(_) => vec!["check grid.sheets in .daysheet.toml".to_string()],
        Error::BackdatedEdit { .. } => {
            vec!["set grid.column_policy = \"allow_backdated\" to edit older days".to_string()]
        }
        Error::LockFailed(_) => vec!["retry; another writer holds the lock".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_sections() {
        let mut out = HumanOutput::new("Tasks for Alice");
        out.push_summary("sheet", "DEV");
        out.push_summary("days", "");
        let mut day = DayRecord::new("Mon 02-Jan");
        day.complete.push("Fix bug".to_string());
        day.todo.push("Write docs".to_string());
        out.push_day(&day);
        out.push_warning("sheet Ops missing");

        let text = format_human(&out);
        assert!(text.starts_with("Tasks for Alice\n\nSummary:\n- sheet: DEV\n- days"));
        assert!(text.contains("- Mon 02-Jan [complete] Fix bug\n- Mon 02-Jan [todo] Write docs"));
        assert!(text.contains("Warnings:\n- sheet Ops missing"));
        assert!(!text.contains("Next steps"));
    }

    #[test]
    fn next_steps_follow_error() {
        assert_eq!(
            error_next_steps(&Error::NotFound("grid".into())),
            vec!["daysheet init".to_string()]
        );
        assert!(error_next_steps(&Error::Validation("x".into())).is_empty());
    }
}
