//! Path resolution for the data directory and client-local state.

use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;

/// Name of the cross-process generation lock file inside the data directory.
pub const GENERATION_LOCK_FILE: &str = ".generation.lock";

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Root for client-local state (`session.json`, the default config dir).
///
/// Resolution order: thread-local test override, `WAYFARER_HOME`, `.wayfarer`.
#[must_use]
pub fn wayfarer_home() -> Utf8PathBuf {
    if let Some(home) = THREAD_HOME.with(|h| h.borrow().clone()) {
        return home;
    }
    match std::env::var("WAYFARER_HOME") {
        Ok(value) if !value.trim().is_empty() => Utf8PathBuf::from(value),
        _ => Utf8PathBuf::from(".wayfarer"),
    }
}

/// Resolve `path` against [`wayfarer_home`] unless it is already absolute.
#[must_use]
pub fn resolve_in_home(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        wayfarer_home().join(path)
    }
}

/// Create `path` and its parents; an existing directory is not an error.
///
/// # Errors
///
/// Returns the underlying I/O error for anything other than `AlreadyExists`.
pub fn ensure_dir_all(path: &Utf8Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Resolved locations of the persisted stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub data_dir: Utf8PathBuf,
    pub requests: Utf8PathBuf,
    pub itineraries: Utf8PathBuf,
    pub lock: Utf8PathBuf,
}

impl DataPaths {
    #[must_use]
    pub fn new(data_dir: impl Into<Utf8PathBuf>, requests_file: &str, itineraries_file: &str) -> Self {
        let data_dir = data_dir.into();
        Self {
            requests: data_dir.join(requests_file),
            itineraries: data_dir.join(itineraries_file),
            lock: data_dir.join(GENERATION_LOCK_FILE),
            data_dir,
        }
    }

    /// Default file names under `data_dir`.
    #[must_use]
    pub fn in_dir(data_dir: impl Into<Utf8PathBuf>) -> Self {
        Self::new(data_dir, "requests.jsonl", "itineraries.jsonl")
    }

    /// Create the data directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from [`ensure_dir_all`].
    pub fn ensure(&self) -> std::io::Result<()> {
        ensure_dir_all(&self.data_dir)
    }
}

#[cfg(any(test, feature = "test-utils"))]
/// Guard returned by [`with_isolated_home`]; restores the previous override on drop.
pub struct HomeGuard {
    previous: Option<Utf8PathBuf>,
    _temp_dir: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl HomeGuard {
    #[must_use]
    pub fn path(&self) -> Utf8PathBuf {
        wayfarer_home()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_HOME.with(|h| *h.borrow_mut() = previous);
    }
}

#[cfg(any(test, feature = "test-utils"))]
/// Point [`wayfarer_home`] at a fresh temp dir for the current thread.
///
/// # Panics
///
/// Panics if a temp dir cannot be created or is not valid UTF-8. Test helper.
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let temp_dir = tempfile::TempDir::new().expect("create temp home");
    let home = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf())
        .expect("temp home is valid UTF-8");
    let previous = THREAD_HOME.with(|h| h.borrow_mut().replace(home));
    HomeGuard {
        previous,
        _temp_dir: temp_dir,
    }
}
