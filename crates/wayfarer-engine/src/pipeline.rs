//! Pipeline façade.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wayfarer_engine::Pipeline;
//! use wayfarer_generator::ReferenceGenerator;
//! use wayfarer_utils::DataPaths;
//!
//! # async fn demo() -> Result<(), wayfarer_engine::EngineError> {
//! let pipeline = Pipeline::new(
//!     DataPaths::in_dir(".wayfarer/data"),
//!     Arc::new(ReferenceGenerator::new()),
//!     900,
//! );
//! let mut trip = serde_json::Map::new();
//! trip.insert("to".into(), "Paris".into());
//! let key = pipeline.submit(trip).await?;
//! let itineraries = pipeline.itinerary_data().await?;
//! assert!(itineraries.len() > key);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{debug, info};
use wayfarer_config::Config;
use wayfarer_generator::{GenerationReport, Generator, Invoker};
use wayfarer_store::{
    Entry, ItineraryRecord, ItineraryStore, Key, Lookup, RequestLog, StoreError, StoreStatus,
    TripRequest,
};
use wayfarer_utils::DataPaths;

use crate::EngineError;

/// Submission → generation → retrieval, over one data directory.
///
/// # Keys
///
/// A request's key is its position in the request log; the itinerary at the
/// same key in the store was generated from it. Keys arrive from the wire as
/// signed integers, so lookups take `i64`: negative or out-of-range keys are
/// [`Lookup::NotFound`], never errors.
///
/// # Generation
///
/// Submission never generates. [`itinerary_data`](Self::itinerary_data)
/// runs the generator over the whole log first, so a client reads its new
/// itinerary one round-trip after submitting. Runs are single-flight; see
/// [`Invoker`].
///
/// # Lag
///
/// Between a submission and the next generation the store is shorter than
/// the log. [`status`](Self::status) reports the difference instead of
/// hiding it.
///
/// # Threading
///
/// `Pipeline` is `Send + Sync`; share it behind an `Arc`. File I/O runs on
/// the blocking pool.
#[derive(Debug)]
pub struct Pipeline {
    paths: DataPaths,
    log: Arc<RequestLog>,
    store: Arc<ItineraryStore>,
    invoker: Invoker,
}

impl Pipeline {
    /// Pipeline over `paths` using `generator`.
    #[must_use]
    pub fn new(paths: DataPaths, generator: Arc<dyn Generator>, lock_ttl_seconds: u64) -> Self {
        let log = Arc::new(RequestLog::open(paths.requests.clone()));
        let store = Arc::new(ItineraryStore::open(paths.itineraries.clone()));
        let invoker = Invoker::new(
            generator,
            Arc::clone(&log),
            Arc::clone(&store),
            paths.lock.clone(),
            lock_ttl_seconds,
        );
        Self {
            paths,
            log,
            store,
            invoker,
        }
    }

    /// Pipeline configured from `[storage]` and `[generator]`.
    ///
    /// Creates the data directory if needed.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Generation`] if the generator cannot be built
    /// - [`EngineError::Store`] if the data directory cannot be created
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let paths = config.data_paths();
        paths
            .ensure()
            .map_err(|e| StoreError::io(&paths.data_dir, e))?;
        let generator = wayfarer_generator::from_config(config)?;
        info!(
            data_dir = %paths.data_dir,
            generator = generator.name(),
            "Pipeline ready"
        );
        Ok(Self::new(paths, generator, config.storage.lock_ttl_seconds))
    }

    #[must_use]
    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    #[must_use]
    pub fn generator_name(&self) -> &str {
        self.invoker.generator().name()
    }

    /// Append `request` to the log and return its key.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] if the append fails; nothing is persisted then.
    pub async fn submit(&self, request: TripRequest) -> Result<Key, EngineError> {
        let log = Arc::clone(&self.log);
        let key = blocking(move || log.append(&request)).await?;
        info!(key, "Trip request submitted");
        Ok(key)
    }

    /// Every logged request in key order, malformed lines included.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] on read failure.
    pub async fn data(&self) -> Result<Vec<Entry<TripRequest>>, EngineError> {
        let log = Arc::clone(&self.log);
        blocking(move || log.read_all()).await
    }

    /// Run generation over the full log and return the rebuilt store.
    ///
    /// # Errors
    ///
    /// [`EngineError::Generation`] when generation fails (the previous store
    /// is kept), [`EngineError::Store`] on read failure.
    pub async fn itinerary_data(&self) -> Result<Vec<Entry<ItineraryRecord>>, EngineError> {
        self.generate().await?;
        let store = Arc::clone(&self.store);
        blocking(move || store.read_all()).await
    }

    /// Run generation without reading the result back.
    ///
    /// # Errors
    ///
    /// [`EngineError::Generation`].
    pub async fn generate(&self) -> Result<GenerationReport, EngineError> {
        Ok(self.invoker.invoke().await?)
    }

    /// The stored itinerary at `key`. Never generates.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] on read failure only.
    pub async fn itinerary(&self, key: i64) -> Result<Lookup<ItineraryRecord>, EngineError> {
        let store = Arc::clone(&self.store);
        let lookup = blocking(move || store.read_by_key(key)).await?;
        debug!(key, found = lookup.is_found(), "Itinerary lookup");
        Ok(lookup)
    }

    /// The last stored itinerary and its key (`None` for an empty store).
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] on read failure only.
    pub async fn last(&self) -> Result<(Option<Key>, Lookup<ItineraryRecord>), EngineError> {
        let store = Arc::clone(&self.store);
        blocking(move || store.read_last()).await
    }

    /// Regenerate the itinerary at `key` only.
    ///
    /// # Errors
    ///
    /// [`EngineError::Generation`]; other keys are untouched either way.
    pub async fn regenerate(&self, key: i64) -> Result<Lookup<ItineraryRecord>, EngineError> {
        let Ok(key) = Key::try_from(key) else {
            return Ok(Lookup::NotFound);
        };
        Ok(self.invoker.regenerate(key).await?)
    }

    /// Apply a free-text refinement to the itinerary at `key`.
    ///
    /// The request log is never touched.
    ///
    /// # Errors
    ///
    /// [`EngineError::Generation`], including `Unsupported` when the
    /// configured generator cannot refine.
    pub async fn refine(
        &self,
        key: i64,
        message: &str,
    ) -> Result<Lookup<ItineraryRecord>, EngineError> {
        let Ok(key) = Key::try_from(key) else {
            return Ok(Lookup::NotFound);
        };
        Ok(self.invoker.refine(key, message).await?)
    }

    /// Request count, itinerary count and the gap between them.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] on read failure.
    pub async fn status(&self) -> Result<StoreStatus, EngineError> {
        let log = Arc::clone(&self.log);
        let store = Arc::clone(&self.store);
        blocking(move || Ok(StoreStatus::new(log.len()?, store.len()?))).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Internal(format!("storage task failed: {e}")))?;
    Ok(result?)
}
