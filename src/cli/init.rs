//! daysheet init command implementation
//!
//! Creates the config file, the grid document with the configured sheets,
//! and the ledger at the data root. Existing files are left alone.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use super::Context;
use crate::error::Result;
use crate::grid::{GridDocument, GridStore};
use crate::output::{emit_success, HumanOutput};
use crate::storage::FileGrid;

#[derive(Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
    sheets: Vec<String>,
}

#[derive(Serialize)]
struct InitCreated {
    config: bool,
    grid: bool,
    ledger: bool,
    sheets: Vec<String>,
}

pub fn run(ctx: &Context) -> Result<()> {
    let root = ctx.storage.root().to_path_buf();
    fs::create_dir_all(&root)?;

    let config_path = ctx.storage.config_file();
    let created_config = !config_path.exists();
    if created_config {
        ctx.config.save(&config_path)?;
    }

    let grid_path = ctx.storage.grid_file(&ctx.config);
    let created_grid = !grid_path.exists();
    let initial_columns = ctx.config.grid.initial_columns;
    let doc = GridDocument::with_sheets(ctx.config.grid.sheets.iter().cloned(), initial_columns);
    let grid = FileGrid::create(&grid_path, &doc, ctx.config.ledger.lock_timeout_ms)?;

    // Sheets added to the config after the first init.
    let mut added_sheets = Vec::new();
    let mut wanted = ctx.config.grid.sheets.clone();
    if !wanted
        .iter()
        .any(|title| title.eq_ignore_ascii_case(&ctx.config.grid.default_sheet))
    {
        wanted.push(ctx.config.grid.default_sheet.clone());
    }
    let existing = grid.list_sheets()?;
    for title in &wanted {
        if !existing.iter().any(|info| info.title.eq_ignore_ascii_case(title)) {
            grid.add_sheet(title, initial_columns)?;
            added_sheets.push(title.clone());
        }
    }

    let ledger_path = ctx.storage.ledger_path(&ctx.config);
    let created_ledger = !ledger_path.exists();
    ctx.ledger()?;

    let sheets: Vec<String> = grid.list_sheets()?.into_iter().map(|info| info.title).collect();
    tracing::info!(root = %root.display(), sheets = sheets.len(), "data root initialized");

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(crate::storage::CONFIG_FILE.to_string());
    }
    if created_grid {
        created_items.push(grid_path.display().to_string());
    }
    if created_ledger {
        created_items.push(ledger_path.display().to_string());
    }
    for title in &added_sheets {
        created_items.push(format!("sheet {title}"));
    }

    let header = if created_items.is_empty() {
        "daysheet init: nothing to do".to_string()
    } else {
        "daysheet init: initialized data root".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_summary("sheets", sheets.join(", "));
    human.push_next_step("daysheet task add --employee <name> \"<task>=todo\"");

    let report = InitReport {
        root,
        created: InitCreated {
            config: created_config,
            grid: created_grid,
            ledger: created_ledger,
            sheets: added_sheets,
        },
        sheets,
    };
    emit_success(ctx.output, "init", &report, Some(&human))
}
