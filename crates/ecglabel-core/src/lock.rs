//! Cross-process writer lock for the annotation log.
//!
//! Appends from concurrent `ecgl` processes are serialized through an
//! advisory `flock` on a sibling `.lock` file. Readers never take it: a read
//! racing an append may miss the newest line and nothing else.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{fs, io, thread};

use fs2::FileExt;
use tracing::debug;

use crate::error::ErrorCode;

/// First poll interval while the lock is held elsewhere; doubles up to
/// [`MAX_BACKOFF`].
const INITIAL_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("gave up waiting for {} after {waited:?}", path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("cannot open lock file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Open { .. } => ErrorCode::LogWriteFailed,
        }
    }
}

/// Held while one event is appended; unlocks on drop.
#[derive(Debug)]
pub struct AppendLock {
    file: File,
    path: PathBuf,
}

impl AppendLock {
    /// Take the lock without waiting. `Ok(None)` means someone else holds it.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Open`] if the lock file cannot be created.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let open_err = |source| LockError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(open_err)?;

        Ok(file.try_lock_exclusive().ok().map(|()| Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Take the lock, backing off between attempts until `timeout` passes.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when the holder keeps the lock longer
    /// than `timeout` and [`LockError::Open`] if the file cannot be created.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let start = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            if let Some(lock) = Self::try_acquire(path)? {
                if attempts > 1 {
                    debug!(attempts, waited = ?start.elapsed(), "append lock acquired after contention");
                }
                return Ok(lock);
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(backoff.min(timeout - waited));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AppendLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
