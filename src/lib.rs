//! daysheet - Daily Task Sheet Library
//!
//! A grid document stores one row per employee and one column per day.
//! Each cell holds several task lines, and the text color of a line encodes
//! that task's status.
//!
//! # Core Concepts
//!
//! - **Status codec**: tolerance matching between text colors and statuses
//! - **Cell codec**: cell text plus color runs to ordered task entries and back
//! - **Merge**: case-insensitive in-place status updates, appending new tasks
//! - **Resolution**: find-or-create of employee rows and day columns
//! - **History**: recent days per employee, fanned out across sheets
//! - **Ledger**: idempotent daily log and employee metadata upserts
//!
//! # Module Organization
//!
//! - `status`: `Status`, `Rgb` and the `ColorCodec`
//! - `cell`: cell data model, `decode_cell` and `encode_cell`
//! - `merge`: `merge_tasks`
//! - `grid`: `GridStore` contract and the in-memory grid
//! - `resolve`: row and column find-or-create
//! - `history`: single- and multi-sheet history reads
//! - `book`: the task update pipeline
//! - `ledger`: log and metadata upserts (locked JSONL or SQLite)
//! - `storage`: data root layout, JSON helpers and the file-backed grid
//! - `lock`: file locking, keyspace locks and atomic writes
//! - `config`: configuration loading from `.daysheet.toml`
//! - `output`: human and JSON command output
//! - `cli`: command-line interface using clap
//! - `error`: error types and result aliases

pub mod book;
pub mod cell;
pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod history;
pub mod ledger;
pub mod lock;
pub mod merge;
pub mod output;
pub mod resolve;
pub mod status;
pub mod storage;

pub use error::{Error, Result};
