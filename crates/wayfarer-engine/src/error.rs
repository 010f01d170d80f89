use thiserror::Error;
use wayfarer_generator::GenerationError;
use wayfarer_store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Internal pipeline error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable label for API error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(_) => "storage",
            Self::Generation(e) => e.kind(),
            Self::Internal(_) => "internal",
        }
    }

    /// True when the generator, not storage, is at fault.
    #[must_use]
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation(e) if !matches!(e, GenerationError::Store(_)))
    }
}
