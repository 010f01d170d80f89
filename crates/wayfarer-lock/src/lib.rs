//! Advisory generation lock for a wayfarer data directory
//!
//! Only one process at a time may rebuild the itinerary store of a data
//! directory. The lock is a small JSON file created with `O_EXCL` semantics and
//! held under an `fd-lock` write guard. It coordinates wayfarer processes but
//! is not a security boundary.
//!
//! A lock whose owner is no longer running, or which is older than the
//! configured TTL, is stale and gets reclaimed by the next acquirer.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::Duration;
use tracing::{debug, warn};

/// Default age threshold for considering a lock stale (in seconds)
pub const DEFAULT_TTL_SECS: u64 = 900;

const MAX_ACQUIRE_ATTEMPTS: u32 = 3;
const MAX_READ_RETRIES: u32 = 3;
const READ_RETRY_DELAY_MS: u64 = 10;

/// Contents of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that created the lock
    pub pid: u32,
    /// When the lock was taken
    pub created_at: DateTime<Utc>,
    /// What the holder is doing (`generation`, `regenerate:3`, ...)
    pub purpose: String,
    /// wayfarer version that created the lock
    pub wayfarer_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Generation already running (PID {pid}, started {created_ago} ago)")]
    Held { pid: u32, created_ago: String },

    #[error("Lock file is corrupted or invalid: {reason}")]
    Corrupted { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Failed to release lock: {reason}")]
    ReleaseFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// An acquired generation lock. Released on [`release`](Self::release) or drop.
pub struct GenerationLock {
    lock_path: Utf8PathBuf,
    fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl GenerationLock {
    /// Acquire the lock at `lock_path`.
    ///
    /// # Errors
    ///
    /// - [`LockError::Held`] when a live process holds a lock younger than `ttl_seconds`
    /// - [`LockError::Corrupted`] when an unreadable lock file is younger than the TTL
    /// - [`LockError::AcquisitionFailed`] for filesystem failures or lost races
    pub fn acquire(
        lock_path: &Utf8Path,
        purpose: &str,
        ttl_seconds: u64,
    ) -> Result<Self, LockError> {
        if let Some(parent) = lock_path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to create lock directory {parent}: {e}"),
            })?;
        }

        for attempt in 0..MAX_ACQUIRE_ATTEMPTS {
            let info = LockInfo {
                pid: process::id(),
                created_at: Utc::now(),
                purpose: purpose.to_string(),
                wayfarer_version: env!("CARGO_PKG_VERSION").to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(lock_path)
            {
                Ok(file) => return Self::finalize(lock_path.to_path_buf(), file, info),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing(lock_path, ttl_seconds)?;
                    Self::remove_stale(lock_path)?;
                    if attempt + 1 < MAX_ACQUIRE_ATTEMPTS {
                        // Deterministic jitter keyed on PID to avoid lockstep retries
                        let delay_ms = 10u64.saturating_mul(2u64.pow(attempt))
                            + u64::from(process::id() % 7);
                        std::thread::sleep(Duration::from_millis(delay_ms.min(100)));
                    }
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!("Failed to create lock file {lock_path}: {e}"),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!(
                "Another process acquired {lock_path} after stale removal ({MAX_ACQUIRE_ATTEMPTS} attempts)"
            ),
        })
    }

    fn finalize(lock_path: Utf8PathBuf, file: fs::File, info: LockInfo) -> Result<Self, LockError> {
        let json = serde_json::to_string_pretty(&info).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to serialize lock info: {e}"),
        })?;

        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let guard = rw_lock.try_write().map_err(|_| LockError::Held {
                pid: 0,
                created_ago: "unknown".to_string(),
            })?;
            let mut file_ref = &*guard;
            file_ref
                .write_all(json.as_bytes())
                .and_then(|()| file_ref.flush())
                .and_then(|()| file_ref.sync_all())
                .map_err(|e| LockError::AcquisitionFailed {
                    reason: format!("Failed to write lock info to {lock_path}: {e}"),
                })?;
        }

        debug!(path = %lock_path, pid = info.pid, purpose = %info.purpose, "Acquired generation lock");
        Ok(Self {
            lock_path,
            fd_lock: Some(rw_lock),
            info,
        })
    }

    /// Decide whether an existing lock file may be reclaimed.
    ///
    /// `Ok(())` means stale; every other outcome is an error for the caller.
    fn check_existing(lock_path: &Utf8Path, ttl_seconds: u64) -> Result<(), LockError> {
        for attempt in 0..MAX_READ_RETRIES {
            let content = match fs::read_to_string(lock_path) {
                Ok(content) => content,
                // Released between our create attempt and this read
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    return Err(LockError::Corrupted {
                        reason: format!("Failed to read lock file {lock_path}: {e}"),
                    });
                }
            };

            match serde_json::from_str::<LockInfo>(&content) {
                Ok(existing) => return Self::validate_existing(&existing, ttl_seconds),
                Err(e) => {
                    // The holder may still be writing it
                    if (e.is_eof() || content.trim().is_empty()) && attempt + 1 < MAX_READ_RETRIES {
                        std::thread::sleep(Duration::from_millis(READ_RETRY_DELAY_MS));
                        continue;
                    }
                    if file_age_secs(lock_path).is_some_and(|age| age > ttl_seconds) {
                        warn!(path = %lock_path, "Reclaiming unreadable lock older than TTL");
                        return Ok(());
                    }
                    return Err(LockError::Corrupted {
                        reason: format!("Failed to parse lock file {lock_path}: {e}"),
                    });
                }
            }
        }
        Err(LockError::Corrupted {
            reason: format!("Lock file {lock_path} stayed unreadable"),
        })
    }

    fn validate_existing(existing: &LockInfo, ttl_seconds: u64) -> Result<(), LockError> {
        // Future timestamps (clock skew) count as age zero
        let age = u64::try_from((Utc::now() - existing.created_at).num_seconds()).unwrap_or(0);

        if age > ttl_seconds {
            warn!(pid = existing.pid, age_secs = age, "Reclaiming stale generation lock");
            return Ok(());
        }
        if !is_process_running(existing.pid) {
            warn!(pid = existing.pid, "Reclaiming generation lock of exited process");
            return Ok(());
        }
        Err(LockError::Held {
            pid: existing.pid,
            created_ago: format_duration_since(existing.created_at),
        })
    }

    /// Rename-to-stale then delete, so a concurrent reclaimer cannot remove a fresh lock.
    fn remove_stale(lock_path: &Utf8Path) -> Result<(), LockError> {
        let stale_path = lock_path.with_extension(format!(
            "stale.{}.{}",
            Utc::now().timestamp_millis(),
            process::id()
        ));
        match fs::rename(lock_path, &stale_path) {
            Ok(()) => {
                let _ = fs::remove_file(&stale_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::AcquisitionFailed {
                reason: format!("Failed to rename stale lock {lock_path}: {e}"),
            }),
        }
    }

    /// Read the lock file at `lock_path`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Corrupted`] if the file exists but cannot be parsed.
    pub fn inspect(lock_path: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        match fs::read_to_string(lock_path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| LockError::Corrupted {
                    reason: format!("Failed to parse lock file {lock_path}: {e}"),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockError::Io(e)),
        }
    }

    #[must_use]
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.lock_path
    }

    /// Release explicitly, surfacing removal errors that `Drop` would swallow.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::ReleaseFailed`] if the lock file cannot be removed.
    pub fn release(mut self) -> Result<(), LockError> {
        self.fd_lock.take();
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::ReleaseFailed {
                reason: format!("Failed to remove {}: {e}", self.lock_path),
            }),
        }
    }
}

impl std::fmt::Debug for GenerationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationLock")
            .field("lock_path", &self.lock_path)
            .field("info", &self.info)
            .field("fd_lock", &"<RwLock>")
            .finish()
    }
}

impl Drop for GenerationLock {
    fn drop(&mut self) {
        if self.fd_lock.take().is_some() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn file_age_secs(path: &Utf8Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified.elapsed().ok().map(|d| d.as_secs())
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // kill(pid, 0) probes without signalling; EPERM still means it exists
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        // No cheap probe here; rely on the TTL
        let _ = pid;
        true
    }
}

fn format_duration_since(created_at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - created_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
