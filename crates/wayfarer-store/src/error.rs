use camino::Utf8PathBuf;
use thiserror::Error;

/// Storage failures. A malformed stored line is never one of these.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {reason}")]
    AtomicWrite { path: Utf8PathBuf, reason: String },

    #[error("Key {key} is out of range for a store of {len} records")]
    KeyOutOfRange { key: usize, len: usize },
}

impl StoreError {
    /// I/O failure on `path`.
    #[must_use]
    pub fn io(path: &camino::Utf8Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
