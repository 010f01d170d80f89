use thiserror::Error;

/// A failed call to the retrieval API. Never retried automatically.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not reach the wayfarer API: {0}")]
    Transport(String),

    #[error("The wayfarer API answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response from the wayfarer API: {0}")]
    Decode(String),

    #[error("The wayfarer API did not answer within {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl ClientError {
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                seconds: timeout_secs,
            }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {event} while in {state}")]
    InvalidTransition { state: String, event: String },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Session file error: {0}")]
    Session(String),
}
