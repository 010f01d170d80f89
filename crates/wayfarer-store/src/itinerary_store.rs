//! Keyed itinerary store, rebuilt wholesale or patched one slot at a time.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use wayfarer_utils::write_file_atomic;

use crate::StoreError;
use crate::model::{Entry, ItineraryRecord, Key, Lookup};
use crate::ndjson;

/// Itinerary records indexed like the request log.
///
/// Every write goes through temp file + fsync + rename, so a reader sees the
/// previous set or the new one, never a mix.
#[derive(Debug)]
pub struct ItineraryStore {
    path: Utf8PathBuf,
    write_lock: Mutex<()>,
}

impl ItineraryStore {
    #[must_use]
    pub fn open(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn read_content(&self) -> Result<String, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(ndjson::decode(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<Entry<ItineraryRecord>>, StoreError> {
        Ok(ndjson::parse_records(&self.read_content()?))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(ndjson::record_lines(&self.read_content()?).len())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Record at `key`. Negative or out-of-range keys are [`Lookup::NotFound`].
    ///
    /// # Errors
    ///
    /// Only I/O failures; absence is never an error.
    pub fn read_by_key(&self, key: i64) -> Result<Lookup<ItineraryRecord>, StoreError> {
        let Ok(key) = Key::try_from(key) else {
            return Ok(Lookup::NotFound);
        };
        let content = self.read_content()?;
        Ok(ndjson::record_lines(&content)
            .get(key)
            .map(|line| ndjson::parse_line(key, line))
            .into())
    }

    /// The last record, with its key.
    ///
    /// # Errors
    ///
    /// Only I/O failures.
    pub fn read_last(&self) -> Result<(Option<Key>, Lookup<ItineraryRecord>), StoreError> {
        let content = self.read_content()?;
        let lines = ndjson::record_lines(&content);
        match lines.len().checked_sub(1) {
            Some(key) => Ok((Some(key), Some(ndjson::parse_line(key, lines[key])).into())),
            None => Ok((None, Lookup::NotFound)),
        }
    }

    /// Replace the whole store with `records`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Serialize`] before anything is written, or
    /// [`StoreError::AtomicWrite`] if the replacement fails (old content kept).
    pub fn replace_all(&self, records: &[ItineraryRecord]) -> Result<(), StoreError> {
        let body = ndjson::encode_records(records)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_body(&body)?;
        debug!(path = %self.path, records = records.len(), "Replaced itinerary store");
        Ok(())
    }

    /// Replace the record at `key`; every other record line is kept as read,
    /// with invalid UTF-8 already replaced.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyOutOfRange`] when `key >= len()`, otherwise as
    /// [`replace_all`](Self::replace_all).
    pub fn replace_at(&self, key: Key, record: &ItineraryRecord) -> Result<(), StoreError> {
        let line = ndjson::encode_line(record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let content = self.read_content()?;
        let mut lines = ndjson::record_lines(&content);
        let len = lines.len();
        let slot = lines
            .get_mut(key)
            .ok_or(StoreError::KeyOutOfRange { key, len })?;
        *slot = &line;

        let mut body = lines.join("\n");
        body.push('\n');
        self.write_body(&body)?;
        debug!(path = %self.path, key, "Replaced itinerary record");
        Ok(())
    }

    fn write_body(&self, body: &str) -> Result<(), StoreError> {
        write_file_atomic(&self.path, body).map_err(|e| StoreError::AtomicWrite {
            path: self.path.clone(),
            reason: format!("{e:#}"),
        })?;
        Ok(())
    }
}
