use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use tracing::{debug, warn};
use wayfarer_store::Key;
use wayfarer_utils::write_file_atomic;

use crate::WorkflowError;

/// Client-local state that survives between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub active_key: Option<i64>,
    pub preview_keys: Vec<i64>,
    pub submitted_key: Option<Key>,
    pub refinements: Vec<String>,
}

/// JSON session file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: Utf8PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// A missing or unreadable session starts fresh.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Session`] when the file exists but cannot be read.
    pub fn load(&self) -> Result<Session, WorkflowError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Session::default()),
            Err(e) => return Err(WorkflowError::Session(format!("{}: {e}", self.path))),
        };
        match serde_json::from_str(&content) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(path = %self.path, error = %e, "Ignoring unreadable session file");
                Ok(Session::default())
            }
        }
    }

    /// # Errors
    ///
    /// [`WorkflowError::Session`] if the file cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), WorkflowError> {
        let body = serde_json::to_string_pretty(session)
            .map_err(|e| WorkflowError::Session(e.to_string()))?;
        write_file_atomic(&self.path, &body)
            .map_err(|e| WorkflowError::Session(format!("{}: {e:#}", self.path)))?;
        debug!(path = %self.path, "Session saved");
        Ok(())
    }

    /// # Errors
    ///
    /// [`WorkflowError::Session`] if an existing file cannot be removed.
    pub fn clear(&self) -> Result<(), WorkflowError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorkflowError::Session(format!("{}: {e}", self.path))),
        }
    }
}
