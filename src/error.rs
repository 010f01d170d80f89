//! Top-level error type for the `wayfarer` binary and library.

use thiserror::Error;
use wayfarer_client::{ClientError, WorkflowError};
use wayfarer_config::ConfigError;
use wayfarer_engine::EngineError;
use wayfarer_generator::GenerationError;
use wayfarer_store::StoreError;
use wayfarer_utils::ExitCode;

#[derive(Error, Debug)]
pub enum WayfarerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WayfarerError {
    /// Process exit code for this failure.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::Input(_) => ExitCode::CLI_ARGS,
            Self::Engine(EngineError::Generation(e)) | Self::Generation(e) => generation_exit(e),
            Self::Client(e) | Self::Workflow(WorkflowError::Client(e)) => client_exit(e),
            Self::Workflow(WorkflowError::InvalidTransition { .. }) => ExitCode::CLI_ARGS,
            Self::Engine(_)
            | Self::Store(_)
            | Self::Workflow(WorkflowError::Session(_))
            | Self::Bind { .. }
            | Self::Io(_) => ExitCode::INTERNAL,
        }
    }

    /// Follow-up actions printed under the error.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(_) => vec![
                "Check .wayfarer/config.toml and WAYFARER_* environment variables".to_string(),
                "Run `wayfarer config` to see every effective value and its source".to_string(),
            ],
            Self::Engine(EngineError::Generation(GenerationError::Busy { .. }))
            | Self::Generation(GenerationError::Busy { .. }) => vec![
                "Wait for the running generation to finish, then read again".to_string(),
            ],
            Self::Engine(EngineError::Generation(GenerationError::Timeout { .. }))
            | Self::Generation(GenerationError::Timeout { .. }) => vec![
                "Raise generator.timeout_secs or --generator-timeout".to_string(),
            ],
            Self::Client(ClientError::Transport(_) | ClientError::Timeout { .. })
            | Self::Workflow(WorkflowError::Client(
                ClientError::Transport(_) | ClientError::Timeout { .. },
            )) => vec![
                "Start the API with `wayfarer serve`".to_string(),
                "Point the client at it with --api-url or WAYFARER_API_URL".to_string(),
            ],
            Self::Workflow(WorkflowError::InvalidTransition { .. }) => vec![
                "Run `wayfarer plan` to submit a trip first".to_string(),
            ],
            Self::Bind { .. } => vec!["Choose another port with --port".to_string()],
            _ => Vec::new(),
        }
    }
}

fn generation_exit(err: &GenerationError) -> ExitCode {
    match err {
        GenerationError::Busy { .. } => ExitCode::LOCK_HELD,
        GenerationError::Timeout { .. } => ExitCode::GENERATION_TIMEOUT,
        GenerationError::Transport(_) => ExitCode::TRANSPORT_FAILURE,
        GenerationError::Store(_) | GenerationError::Lock(_) | GenerationError::Internal(_) => {
            ExitCode::INTERNAL
        }
        GenerationError::Failed { .. }
        | GenerationError::MalformedOutput { .. }
        | GenerationError::CountMismatch { .. }
        | GenerationError::Unsupported(_)
        | GenerationError::Rejected { .. } => ExitCode::GENERATOR_FAILURE,
    }
}

fn client_exit(err: &ClientError) -> ExitCode {
    match err {
        ClientError::Status { status, .. } if (400..500).contains(status) => ExitCode::CLI_ARGS,
        ClientError::Status { .. }
        | ClientError::Transport(_)
        | ClientError::Decode(_)
        | ClientError::Timeout { .. } => ExitCode::TRANSPORT_FAILURE,
    }
}
