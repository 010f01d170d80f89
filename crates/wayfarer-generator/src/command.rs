use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wayfarer_runner::{CommandSpec, ProcessOutput, ProcessRunner, RunnerError};
use wayfarer_store::{Entry, ItineraryRecord, Key, TripRequest, ndjson};

use crate::{GenerationError, Generator, parse_output};

/// Longest stderr excerpt carried in a [`GenerationError::Failed`]
const STDERR_EXCERPT_BYTES: usize = 2048;

/// External generator program speaking NDJSON.
///
/// The whole log goes to stdin, one entry per line (malformed entries as
/// their `{error, raw}` placeholder); stdout must hold one object per line.
/// Argv only, never a shell.
pub struct CommandGenerator {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl std::fmt::Debug for CommandGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGenerator")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CommandGenerator {
    #[must_use]
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run(&self, spec: CommandSpec) -> Result<String, GenerationError> {
        let runner = Arc::clone(&self.runner);
        let timeout = self.timeout;
        let output = tokio::task::spawn_blocking(move || runner.run(&spec, timeout))
            .await
            .map_err(|e| GenerationError::Internal(format!("generator task failed: {e}")))?
            .map_err(runner_error)?;
        check_exit(&output)?;
        Ok(output.stdout_string())
    }

    fn spec(&self) -> CommandSpec {
        CommandSpec::new(&self.program).args(&self.args)
    }
}

fn runner_error(err: RunnerError) -> GenerationError {
    match err {
        RunnerError::Timeout { timeout_seconds } => GenerationError::Timeout {
            seconds: timeout_seconds,
        },
        RunnerError::SpawnFailed { program, reason } => GenerationError::Failed {
            exit_code: None,
            stderr: format!("could not start {program}: {reason}"),
        },
        RunnerError::NativeExecutionFailed { reason } => GenerationError::Failed {
            exit_code: None,
            stderr: reason,
        },
    }
}

fn check_exit(output: &ProcessOutput) -> Result<(), GenerationError> {
    if output.success() {
        return Ok(());
    }
    let stderr = output.stderr_string();
    warn!(exit_code = ?output.exit_code, "Generator program failed");
    Err(GenerationError::Failed {
        exit_code: output.exit_code,
        stderr: excerpt(stderr.trim()).to_string(),
    })
}

fn excerpt(text: &str) -> &str {
    if text.len() <= STDERR_EXCERPT_BYTES {
        return text;
    }
    let mut end = STDERR_EXCERPT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        "command"
    }

    async fn produce(
        &self,
        requests: &[Entry<TripRequest>],
    ) -> Result<Vec<ItineraryRecord>, GenerationError> {
        let payload = ndjson::encode_records(requests).map_err(wayfarer_store::StoreError::from)?;
        debug!(program = %self.program, requests = requests.len(), "Running generator program");
        let stdout = self.run(self.spec().stdin(payload)).await?;
        parse_output(&stdout)
    }

    async fn refine(
        &self,
        key: Key,
        record: &ItineraryRecord,
        message: &str,
    ) -> Result<ItineraryRecord, GenerationError> {
        let document = json!({
            "itinerary": record,
            "message": message,
            "key": key,
        });
        let payload = ndjson::encode_line(&document).map_err(wayfarer_store::StoreError::from)?;
        let stdout = self
            .run(self.spec().arg("--refine").stdin(payload))
            .await?;
        let mut records = parse_output(&stdout)?;
        if records.len() != 1 {
            return Err(GenerationError::CountMismatch {
                expected: 1,
                actual: records.len(),
            });
        }
        Ok(records.remove(0))
    }
}
