//! Append-only request log.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::debug;

use crate::StoreError;
use crate::model::{Entry, Key, TripRequest};
use crate::ndjson;

/// Durable, append-only log of trip requests.
///
/// Each append holds an exclusive `fd-lock` on the log file while it counts
/// the existing records and writes its line, so handles in different threads
/// or processes never hand out the same key. The line goes out in a single
/// `write_all` on an `O_APPEND` handle followed by `sync_data`.
#[derive(Debug)]
pub struct RequestLog {
    path: Utf8PathBuf,
}

impl RequestLog {
    #[must_use]
    pub fn open(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Persist `request` and return its key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] or [`StoreError::Io`]; nothing is
    /// written in either case.
    pub fn append(&self, request: &TripRequest) -> Result<Key, StoreError> {
        let mut line = ndjson::encode_line(request)?;
        line.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_str().is_empty()
        {
            wayfarer_utils::paths::ensure_dir_all(parent)
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        let mut lock = RwLock::new(file);
        let mut guard = lock.write().map_err(|e| StoreError::io(&self.path, e))?;

        let existing = read_bytes(&mut guard).map_err(|e| StoreError::io(&self.path, e))?;
        // A hand-edited file may lack its final newline
        if existing.last().is_some_and(|&b| b != b'\n') {
            line.insert(0, '\n');
        }
        let key = ndjson::record_lines(&ndjson::decode(existing)).len();

        guard
            .write_all(line.as_bytes())
            .and_then(|()| guard.sync_data())
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!(path = %self.path, key, "Appended trip request");
        Ok(key)
    }

    /// All entries in append order. A missing file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<Entry<TripRequest>>, StoreError> {
        Ok(ndjson::parse_records(&self.read_content()?))
    }

    /// Number of records, valid or malformed.
    ///
    /// # Errors
    ///
    /// See [`read_all`](Self::read_all).
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(ndjson::record_lines(&self.read_content()?).len())
    }

    /// # Errors
    ///
    /// See [`read_all`](Self::read_all).
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// The entry at `key`, if the log is that long.
    ///
    /// # Errors
    ///
    /// See [`read_all`](Self::read_all).
    pub fn read(&self, key: Key) -> Result<Option<Entry<TripRequest>>, StoreError> {
        let content = self.read_content()?;
        Ok(ndjson::record_lines(&content)
            .get(key)
            .map(|line| ndjson::parse_line(key, line)))
    }

    /// Raw log body, exactly as the generator subprocess receives it.
    /// Invalid UTF-8 is replaced, never an error.
    ///
    /// # Errors
    ///
    /// See [`read_all`](Self::read_all).
    pub fn read_content(&self) -> Result<String, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(ndjson::decode(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

fn read_bytes(file: &mut fs::File) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}
