mod support;

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;
use daysheet::error::Error;
use daysheet::lock::FileLock;
use tempfile::TempDir;

use support::TestRoot;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(25);
const READY_TIMEOUT: Duration = Duration::from_secs(2);

fn daysheet_bin() -> PathBuf {
    cargo_bin("daysheet")
}

/// Run `count` copies of `args` in parallel against `root`.
fn run_parallel(root: &TestRoot, count: usize, args: impl Fn(usize) -> Vec<String>) -> Vec<bool> {
    let bin = Arc::new(daysheet_bin());
    let mut handles = Vec::new();
    for idx in 0..count {
        let bin = Arc::clone(&bin);
        let root_path = root.path().to_path_buf();
        let args = args(idx);
        handles.push(thread::spawn(move || {
            Command::new(bin.as_ref())
                .env("DAYSHEET_ROOT", &root_path)
                .env_remove("RUST_LOG")
                .arg("--quiet")
                .args(args)
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        }));
    }
    handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or(false))
        .collect()
}

#[test]
fn lock_helper_process() {
    if std::env::var("DAYSHEET_LOCK_HELPER").ok().as_deref() != Some("1") {
        return;
    }

    let path = std::env::var("DAYSHEET_LOCK_PATH").expect("DAYSHEET_LOCK_PATH");
    let ready = std::env::var("DAYSHEET_LOCK_READY").expect("DAYSHEET_LOCK_READY");

    let _lock = FileLock::acquire(&path, 10_000).expect("lock helper acquire");
    std::fs::write(&ready, "ready").expect("ready write");
    thread::sleep(Duration::from_secs(2));
}

#[test]
fn file_lock_timeout_when_held_by_other_process() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let lock_path = dir.path().join("grid.json.lock");
    let ready_path = dir.path().join("ready");

    let mut child = Command::new(std::env::current_exe()?)
        .args(["--exact", "lock_helper_process", "--nocapture"])
        .env("DAYSHEET_LOCK_HELPER", "1")
        .env("DAYSHEET_LOCK_PATH", lock_path.display().to_string())
        .env("DAYSHEET_LOCK_READY", ready_path.display().to_string())
        .spawn()?;

    let start = Instant::now();
    while !ready_path.exists() {
        if start.elapsed() > READY_TIMEOUT {
            let _ = child.kill();
            return Err("lock helper not ready".into());
        }
        thread::sleep(READY_POLL_INTERVAL);
    }

    match FileLock::acquire(&lock_path, 100) {
        Ok(_) => return Err("expected lock timeout".into()),
        Err(err) => assert!(matches!(err, Error::LockFailed(_))),
    }

    child.wait()?;
    Ok(())
}

#[test]
fn parallel_log_upserts_keep_one_record() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::initialized();

    let results = run_parallel(&root, 4, |idx| {
        // Same identity, different spellings.
        let name = if idx % 2 == 0 { "Alice" } else { " ALICE " };
        vec![
            "log".to_string(),
            "upsert".to_string(),
            name.to_string(),
            "Mon 02-Jan".to_string(),
        ]
    });
    assert!(results.iter().all(|ok| *ok), "log upsert failed: {results:?}");

    let logs = root.read_logs();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].updated_at >= logs[0].created_at);
    Ok(())
}

#[test]
fn parallel_task_adds_on_one_cell_keep_every_task() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::initialized();
    root.cmd()
        .args(["task", "add", "-e", "Alice", "--date", "Mon 02-Jan", "Seed=todo"])
        .assert()
        .success();

    let count = 4;
    let results = run_parallel(&root, count, |idx| {
        vec![
            "task".to_string(),
            "add".to_string(),
            "-e".to_string(),
            "alice".to_string(),
            "--date".to_string(),
            "Mon 02-Jan".to_string(),
            format!("Job {idx}=pending"),
        ]
    });
    assert!(results.iter().all(|ok| *ok), "task add failed: {results:?}");

    let value = root.json(&["task", "show", "Alice"]);
    let days = value["data"]["history"].as_array().ok_or("history missing")?;
    assert_eq!(days.len(), 1);
    let pending: Vec<&str> = days[0]["pending"]
        .as_array()
        .ok_or("pending missing")?
        .iter()
        .filter_map(|task| task.as_str())
        .collect();
    for idx in 0..count {
        let text = format!("Job {idx}");
        assert!(pending.contains(&text.as_str()), "{text} lost: {pending:?}");
    }
    assert_eq!(days[0]["todo"][0], "Seed");

    // One row for Alice despite the differing case.
    let grid = root.read_grid();
    let sheet = grid.sheet("DEV")?;
    let alice_rows = sheet
        .rows
        .iter()
        .filter(|row| {
            row.first()
                .and_then(|cell| cell.text.as_deref())
                .is_some_and(|name| name.eq_ignore_ascii_case("alice"))
        })
        .count();
    assert_eq!(alice_rows, 1);
    Ok(())
}
