//! Command-line interface for daysheet
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::book::TaskBook;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::{open_ledger, Ledger};
use crate::output::OutputOptions;
use crate::storage::{FileGrid, Storage};

mod init;
mod log;
mod meta;
mod task;

/// daysheet - daily task tracking on a spreadsheet-style grid
///
/// Each employee is a row, each day a column, and every line of a cell is a
/// task whose status is the color of its text.
#[derive(Parser, Debug)]
#[command(name = "daysheet")]
#[command(author, version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data root holding .daysheet.toml, the grid and the ledger
    #[arg(long, global = true, env = "DAYSHEET_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config, grid document and ledger
    Init,

    /// Record and read task statuses
    #[command(subcommand)]
    Task(TaskCommands),

    /// Daily log records
    #[command(subcommand)]
    Log(LogCommands),

    /// Employee metadata records
    #[command(subcommand)]
    Meta(MetaCommands),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Merge task statuses into an employee's day cell
    Add {
        /// Employee name (matched case-insensitively)
        #[arg(short, long)]
        employee: String,

        /// Target sheet (defaults to grid.default_sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Day label (defaults to today, formatted with grid.date_format)
        #[arg(long)]
        date: Option<String>,

        /// Tasks as TEXT=STATUS (status: todo, pending, complete)
        #[arg(required = true)]
        tasks: Vec<String>,
    },

    /// Show recent days of one employee across the configured sheets
    Show {
        /// Employee name
        name: String,

        /// Days to show (0 for all; defaults to history.max_days)
        #[arg(long)]
        days: Option<usize>,
    },

    /// Show recent days of every employee
    All {
        /// Days to show per employee (0 for all)
        #[arg(long)]
        days: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// Record activity for an employee on a day
    Upsert {
        /// Employee name
        name: String,

        /// Day label, e.g. "Mon 02-Jan"
        date: String,
    },

    /// List daily logs
    List,
}

#[derive(Subcommand, Debug)]
pub enum MetaCommands {
    /// Create or update an employee profile
    Upsert {
        /// Employee name
        name: String,

        /// Employee identifier
        #[arg(long = "id")]
        employee_id: Option<String>,

        /// Project name
        #[arg(long)]
        project: Option<String>,
    },

    /// Bump updated_at of an existing employee
    Touch {
        /// Employee name
        name: String,
    },

    /// List employee profiles
    List,
}

/// Data root, config and output settings shared by every command.
pub(crate) struct Context {
    pub storage: Storage,
    pub config: Config,
    pub output: OutputOptions,
}

impl Context {
    fn load(root: Option<PathBuf>, output: OutputOptions) -> Result<Self> {
        let storage = Storage::new(resolve_root(root)?);
        let config = Config::load_from_root(storage.root())?;
        tracing::debug!(root = %storage.root().display(), "context loaded");
        Ok(Self {
            storage,
            config,
            output,
        })
    }

    pub fn grid(&self) -> Result<FileGrid> {
        FileGrid::open(
            self.storage.grid_file(&self.config),
            self.config.ledger.lock_timeout_ms,
        )
    }

    pub fn book(&self) -> Result<TaskBook> {
        let grid = self.grid()?;
        let lock = grid.cell_lock();
        Ok(TaskBook::new(Arc::new(grid), lock, self.config.book_settings()))
    }

    pub fn ledger(&self) -> Result<Box<dyn Ledger>> {
        open_ledger(
            self.config.ledger.strategy,
            &self.storage.ledger_path(&self.config),
            self.config.ledger.lock_timeout_ms,
        )
    }
}

/// `--root`/`DAYSHEET_ROOT`, else the platform data directory.
fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root {
        return Ok(root);
    }
    directories::ProjectDirs::from("", "", "daysheet")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::OperationFailed(
                "no home directory; pass --root or set DAYSHEET_ROOT".to_string(),
            )
        })
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let ctx = Context::load(self.root, output)?;

        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    employee,
                    sheet,
                    date,
                    tasks,
                } => task::run_add(
                    &ctx,
                    task::AddOptions {
                        employee,
                        sheet,
                        date,
                        tasks,
                    },
                ),
                TaskCommands::Show { name, days } => task::run_show(&ctx, &name, days),
                TaskCommands::All { days } => task::run_all(&ctx, days),
            },
            Commands::Log(cmd) => match cmd {
                LogCommands::Upsert { name, date } => log::run_upsert(&ctx, &name, &date),
                LogCommands::List => log::run_list(&ctx),
            },
            Commands::Meta(cmd) => match cmd {
                MetaCommands::Upsert {
                    name,
                    employee_id,
                    project,
                } => meta::run_upsert(&ctx, &name, employee_id.as_deref(), project.as_deref()),
                MetaCommands::Touch { name } => meta::run_touch(&ctx, &name),
                MetaCommands::List => meta::run_list(&ctx),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn about_comes_from_doc_comment() {
        let about = Cli::command()
            .get_about()
            .map(|about| about.to_string())
            .unwrap_or_default();
        assert!(about.contains("daily task tracking"), "about: {about}");
    }

    #[test]
    fn parses_task_add() {
        let cli = Cli::try_parse_from([
            "daysheet",
            "--root",
            "/tmp/ds",
            "task",
            "add",
            "--employee",
            "Alice",
            "Fix bug=complete",
            "Write docs=pending",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/ds")));
        match cli.command {
            Commands::Task(TaskCommands::Add { employee, tasks, sheet, date }) => {
                assert_eq!(employee, "Alice");
                assert_eq!(tasks.len(), 2);
                assert!(sheet.is_none());
                assert!(date.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn task_add_requires_tasks() {
        assert!(Cli::try_parse_from(["daysheet", "task", "add", "--employee", "Alice"]).is_err());
    }

    #[test]
    fn explicit_root_wins() {
        let root = resolve_root(Some(PathBuf::from("/data/ds"))).unwrap();
        assert_eq!(root, PathBuf::from("/data/ds"));
    }
}
