//! File locking and atomic writes for daysheet stores
//!
//! - `FileLock`: exclusive fs2/flock lock on a sidecar `.lock` file with timeout
//! - `KeyspaceLock`: advisory lock for one keyspace (log records, metadata
//!   records, or the cells of one grid document). It pairs an in-process
//!   mutex with an optional `FileLock` so threads queue without polling and
//!   separate processes still exclude each other.
//! - `write_atomic`: temp file in the target directory, fsync, rename

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 20;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows reports sharing/lock violations as raw OS errors.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Sidecar lock path for a data file: `<path>.lock`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// A file lock guard that releases the lock when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock, waiting up to `timeout_ms`.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(FileLock { file }),
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Advisory lock guarding one keyspace's read-decide-write cycle.
#[derive(Debug)]
pub struct KeyspaceLock {
    name: String,
    path: Option<PathBuf>,
    timeout_ms: u64,
    local: Mutex<()>,
}

/// Held for the duration of one read-decide-write sequence.
pub struct KeyspaceGuard<'a> {
    // Field order matters: the file lock is released before the mutex.
    _file: Option<FileLock>,
    _local: MutexGuard<'a, ()>,
}

impl KeyspaceLock {
    /// Lock named `name` backed by the lock file at `path`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, timeout_ms: u64) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            timeout_ms,
            local: Mutex::new(()),
        }
    }

    /// Lock that only excludes threads of this process.
    pub fn in_process(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            timeout_ms: 0,
            local: Mutex::new(()),
        }
    }

    /// Lock guarding the data file at `data_path` via its sidecar lock file.
    pub fn for_file(name: impl Into<String>, data_path: &Path, timeout_ms: u64) -> Self {
        Self::new(name, lock_path_for(data_path), timeout_ms)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Block until this process and every other holder have released.
    pub fn lock(&self) -> Result<KeyspaceGuard<'_>> {
        let local = self
            .local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let file = match &self.path {
            Some(path) => Some(FileLock::acquire(path, self.timeout_ms)?),
            None => None,
        };
        tracing::trace!(keyspace = %self.name, "keyspace locked");
        Ok(KeyspaceGuard {
            _file: file,
            _local: local,
        })
    }
}

/// Atomically replace `path` with `data`.
///
/// Readers see either the old or the new file, never a partial write. This
/// does not lock; callers coordinating writers hold a `KeyspaceLock`.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| Error::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn file_lock_excludes_second_holder() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("grid.json.lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert!(lock_path.exists());
        assert!(FileLock::acquire(&lock_path, 0).is_err());

        drop(lock);
        assert!(FileLock::acquire(&lock_path, 0).is_ok());
    }

    #[test]
    fn timeout_returns_lock_failed() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("logs.jsonl.lock");

        let _lock = FileLock::acquire(&lock_path, 1000).unwrap();
        let result = FileLock::acquire(&lock_path, 50);
        assert!(matches!(result, Err(Error::LockFailed(_))));
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("grid.json");

        write_atomic(&file_path, b"{\"sheets\":[]}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"sheets\":[]}");

        write_atomic(&file_path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{}");
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/logs.jsonl")),
            PathBuf::from("/data/logs.jsonl.lock")
        );
    }

    #[test]
    fn keyspace_lock_admits_one_holder_at_a_time() {
        let temp_dir = TempDir::new().unwrap();
        let lock = Arc::new(KeyspaceLock::for_file(
            "logs",
            &temp_dir.path().join("logs.jsonl"),
            5000,
        ));

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let in_lock = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let lock = Arc::clone(&lock);
            let barrier = Arc::clone(&barrier);
            let in_lock = Arc::clone(&in_lock);
            let max_concurrent = Arc::clone(&max_concurrent);

            handles.push(thread::spawn(move || {
                barrier.wait();
                let _guard = lock.lock().unwrap();
                let current = in_lock.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = max_concurrent.fetch_max(current, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                in_lock.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
        assert_eq!(lock.name(), "logs");
    }

    #[test]
    fn in_process_lock_has_no_file() {
        let lock = KeyspaceLock::in_process("grid");
        assert!(lock.path().is_none());
        let guard = lock.lock().unwrap();
        drop(guard);
        assert!(lock.lock().is_ok());
    }
}
