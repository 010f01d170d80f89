use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wayfarer_config::{Config, GeneratorMode};
use wayfarer_runner::NativeRunner;
use wayfarer_store::{Entry, ItineraryRecord, Key, TripRequest, ndjson};

use crate::{CommandGenerator, GenerationError, HttpGenerator, ReferenceGenerator};

/// Capability that turns trip requests into itinerary records.
///
/// Implementations are opaque to the pipeline: it only checks that one
/// record comes back per request and stores them unchanged.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short name for logs (`reference`, `command`, `http`).
    fn name(&self) -> &str;

    /// One record per entry, in the same order.
    async fn produce(
        &self,
        requests: &[Entry<TripRequest>],
    ) -> Result<Vec<ItineraryRecord>, GenerationError>;

    /// Regenerate the record for a single request.
    async fn produce_one(
        &self,
        key: Key,
        request: &Entry<TripRequest>,
    ) -> Result<ItineraryRecord, GenerationError> {
        debug!(generator = self.name(), key, "Producing single itinerary");
        let mut records = self.produce(std::slice::from_ref(request)).await?;
        if records.len() != 1 {
            return Err(GenerationError::CountMismatch {
                expected: 1,
                actual: records.len(),
            });
        }
        Ok(records.remove(0))
    }

    /// Apply a free-text edit to one stored itinerary.
    async fn refine(
        &self,
        key: Key,
        record: &ItineraryRecord,
        message: &str,
    ) -> Result<ItineraryRecord, GenerationError> {
        let _ = (key, record, message);
        Err(GenerationError::Unsupported(format!(
            "{} generator cannot refine itineraries",
            self.name()
        )))
    }
}

/// Placeholder stored for a request the generator could not use.
///
/// Keeps key alignment: slot `key` still exists, it just explains itself.
#[must_use]
pub fn error_record(key: Key, message: impl Into<String>) -> ItineraryRecord {
    let mut record = ItineraryRecord::new();
    record.insert("error".to_string(), Value::String(message.into()));
    record.insert("key".to_string(), json!(key));
    record
}

/// Parse generator stdout: one JSON object per non-blank line.
///
/// # Errors
///
/// [`GenerationError::MalformedOutput`] naming the first bad line (1-based).
pub fn parse_output(stdout: &str) -> Result<Vec<ItineraryRecord>, GenerationError> {
    ndjson::record_lines(stdout)
        .into_iter()
        .enumerate()
        .map(|(index, line)| match ndjson::parse_line(index, line) {
            Entry::Valid { value, .. } => Ok(value),
            Entry::Malformed { line, reason, .. } => {
                Err(GenerationError::MalformedOutput { line, reason })
            }
        })
        .collect()
}

/// Build the generator selected by `[generator] mode`.
///
/// # Errors
///
/// [`GenerationError::Transport`] if the HTTP client cannot be constructed.
pub fn from_config(config: &Config) -> Result<Arc<dyn Generator>, GenerationError> {
    let timeout = Duration::from_secs(config.generator.timeout_secs);
    let generator: Arc<dyn Generator> = match config.generator.mode {
        GeneratorMode::Reference => Arc::new(ReferenceGenerator::new()),
        GeneratorMode::Command => Arc::new(CommandGenerator::new(
            Arc::new(NativeRunner::new()),
            config.generator.command.clone(),
            config.generator.args.clone(),
            timeout,
        )),
        GeneratorMode::Http => Arc::new(HttpGenerator::new(&config.generator.base_url, timeout)?),
    };
    debug!(generator = generator.name(), "Configured generator");
    Ok(generator)
}
