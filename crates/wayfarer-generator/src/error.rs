use thiserror::Error;
use wayfarer_lock::LockError;
use wayfarer_store::StoreError;

/// Why a generation attempt produced nothing.
///
/// Whatever the variant, the itinerary store still holds its previous content.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generator exited with {}: {stderr}", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Generator timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Generator output line {line} is not a JSON object: {reason}")]
    MalformedOutput { line: usize, reason: String },

    #[error("Generator returned {actual} records for {expected} requests")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Another generation is running (PID {pid}, started {created_ago} ago)")]
    Busy { pid: u32, created_ago: String },

    #[error("Unsupported by this generator: {0}")]
    Unsupported(String),

    #[error("Generator service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Generator transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Generation lock error: {0}")]
    Lock(LockError),

    #[error("Internal generation error: {0}")]
    Internal(String),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

impl From<LockError> for GenerationError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Held { pid, created_ago } => Self::Busy { pid, created_ago },
            other => Self::Lock(other),
        }
    }
}

impl GenerationError {
    /// Stable machine-readable label, used as `kind` in API error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "generator_failed",
            Self::Timeout { .. } => "generator_timeout",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::CountMismatch { .. } => "count_mismatch",
            Self::Busy { .. } => "busy",
            Self::Unsupported(_) => "unsupported",
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport",
            Self::Store(_) => "storage",
            Self::Lock(_) => "lock",
            Self::Internal(_) => "internal",
        }
    }
}
