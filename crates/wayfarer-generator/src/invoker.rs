//! Single-flight generation over the request log.

use camino::Utf8PathBuf;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, warn};
use wayfarer_lock::GenerationLock;
use wayfarer_store::{ItineraryRecord, ItineraryStore, Key, Lookup, RequestLog};
use wayfarer_utils::logging::generation_span;

use crate::{GenerationError, Generator};

const LOCK_PURPOSE: &str = "generation";

/// Outcome of one [`Invoker::invoke`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// Log length the run covered
    pub requests: usize,
    pub records: usize,
    pub duration_ms: u64,
    /// True when this caller waited on another caller's run instead of starting one
    pub reused: bool,
}

#[derive(Debug, Default)]
struct Flight {
    last: Option<Completed>,
}

#[derive(Debug, Clone, Copy)]
struct Completed {
    seq: u64,
    report: GenerationReport,
}

/// Runs the generator against the log and rebuilds the store.
///
/// At most one run is in flight per invoker; across processes the
/// `.generation.lock` file in the data directory serialises runs. A caller
/// that queued behind a run that finished after it arrived, and that covered
/// at least the log length it saw, gets that run's report back instead of
/// generating again.
pub struct Invoker {
    generator: Arc<dyn Generator>,
    log: Arc<RequestLog>,
    store: Arc<ItineraryStore>,
    lock_path: Utf8PathBuf,
    lock_ttl_seconds: u64,
    flight: Mutex<Flight>,
    finished: AtomicU64,
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("generator", &self.generator.name())
            .field("log", &self.log.path())
            .field("store", &self.store.path())
            .field("lock_path", &self.lock_path)
            .finish_non_exhaustive()
    }
}

impl Invoker {
    #[must_use]
    pub fn new(
        generator: Arc<dyn Generator>,
        log: Arc<RequestLog>,
        store: Arc<ItineraryStore>,
        lock_path: impl Into<Utf8PathBuf>,
        lock_ttl_seconds: u64,
    ) -> Self {
        Self {
            generator,
            log,
            store,
            lock_path: lock_path.into(),
            lock_ttl_seconds,
            flight: Mutex::new(Flight::default()),
            finished: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Regenerate the whole store from the whole log.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`]; the store keeps its previous content.
    pub async fn invoke(&self) -> Result<GenerationReport, GenerationError> {
        let arrived_after = self.finished.load(Ordering::SeqCst);
        let log = Arc::clone(&self.log);
        let seen_len = blocking(move || Ok(log.len()?)).await?;

        let mut flight = self.flight.lock().await;
        if let Some(done) = flight.last
            && done.seq > arrived_after
            && done.report.requests >= seen_len
        {
            debug!(requests = done.report.requests, "Reusing concurrent generation result");
            return Ok(GenerationReport {
                reused: true,
                ..done.report
            });
        }

        self.run_full(&mut flight).await
    }

    /// Regenerate only the record at `key`.
    ///
    /// Falls back to a full run when the store does not reach `key` yet.
    /// [`Lookup::NotFound`] when the log has no request at `key`.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`]; other slots are never touched.
    pub async fn regenerate(&self, key: Key) -> Result<Lookup<ItineraryRecord>, GenerationError> {
        let mut flight = self.flight.lock().await;

        let log = Arc::clone(&self.log);
        let Some(entry) = blocking(move || Ok(log.read(key)?)).await? else {
            return Ok(Lookup::NotFound);
        };

        let store = Arc::clone(&self.store);
        if blocking(move || Ok(store.len()?)).await? <= key {
            debug!(key, "Store does not reach key, running full generation");
            self.run_full(&mut flight).await?;
            return self.read(key).await;
        }

        let _lock = self.acquire_lock().await?;
        let record = self.generator.produce_one(key, &entry).await?;
        let store = Arc::clone(&self.store);
        let stored = record.clone();
        blocking(move || Ok(store.replace_at(key, &stored)?)).await?;
        info!(key, generator = self.generator.name(), "Regenerated itinerary");
        Ok(Lookup::Found(record))
    }

    /// Apply `message` to the stored record at `key` and store the result.
    ///
    /// An absent or malformed record is returned as-is, untouched.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`], including [`GenerationError::Unsupported`]
    /// from generators that cannot refine.
    pub async fn refine(
        &self,
        key: Key,
        message: &str,
    ) -> Result<Lookup<ItineraryRecord>, GenerationError> {
        let _flight = self.flight.lock().await;

        let current = match self.read(key).await? {
            Lookup::Found(record) => record,
            other => return Ok(other),
        };

        let _lock = self.acquire_lock().await?;
        let refined = self.generator.refine(key, &current, message).await?;
        let store = Arc::clone(&self.store);
        let stored = refined.clone();
        blocking(move || Ok(store.replace_at(key, &stored)?)).await?;
        info!(key, generator = self.generator.name(), "Refined itinerary");
        Ok(Lookup::Found(refined))
    }

    async fn read(&self, key: Key) -> Result<Lookup<ItineraryRecord>, GenerationError> {
        let store = Arc::clone(&self.store);
        let key = i64::try_from(key).unwrap_or(i64::MAX);
        blocking(move || Ok(store.read_by_key(key)?)).await
    }

    async fn acquire_lock(&self) -> Result<GenerationLock, GenerationError> {
        let path = self.lock_path.clone();
        let ttl = self.lock_ttl_seconds;
        blocking(move || Ok(GenerationLock::acquire(&path, LOCK_PURPOSE, ttl)?)).await
    }

    async fn run_full(&self, flight: &mut Flight) -> Result<GenerationReport, GenerationError> {
        let started = Instant::now();
        let _lock = self.acquire_lock().await?;

        let log = Arc::clone(&self.log);
        let entries = blocking(move || Ok(log.read_all()?)).await?;
        let requests = entries.len();

        let span = generation_span(self.generator.name(), requests);
        let records = match self.generator.produce(&entries).instrument(span.clone()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(parent: &span, error = %e, kind = e.kind(), "Generation failed");
                return Err(e);
            }
        };
        if records.len() != requests {
            warn!(parent: &span, expected = requests, actual = records.len(), "Generator record count mismatch");
            return Err(GenerationError::CountMismatch {
                expected: requests,
                actual: records.len(),
            });
        }

        let store = Arc::clone(&self.store);
        blocking(move || Ok(store.replace_all(&records)?)).await?;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        span.record("records", requests);
        span.record("duration_ms", duration_ms);
        span.in_scope(|| info!(records = requests, duration_ms, "Itinerary store rebuilt"));

        let report = GenerationReport {
            requests,
            records: requests,
            duration_ms,
            reused: false,
        };
        let seq = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        flight.last = Some(Completed { seq, report });
        Ok(report)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, GenerationError>
where
    F: FnOnce() -> Result<T, GenerationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GenerationError::Internal(format!("blocking task failed: {e}")))?
}
