//! wayfarer - trip request log, itinerary generation pipeline and retrieval API
//!
//! Clients submit free-form trip requests; each is appended to a
//! line-delimited log and keyed by its position. Reading itineraries runs a
//! generator over the whole log and replaces the itinerary store, so key `k`
//! of the store always belongs to request `k`.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Retrieval API on :3000 with the built-in generator
//! wayfarer serve
//!
//! # Submit a trip and list three candidate previews
//! wayfarer plan --from NYC --to Paris --start-date 2025-06-01 --end-date 2025-06-10 --people 2
//!
//! # Open one, then refine it
//! wayfarer show 0
//! wayfarer refine "stay near the Louvre"
//! ```
//!
//! # Crates
//!
//! - `wayfarer-store` - request log and itinerary store (NDJSON)
//! - `wayfarer-generator` - the [`Generator`] capability and its reference,
//!   command and HTTP implementations
//! - `wayfarer-engine` - [`Pipeline`], the submit/generate/retrieve contract
//! - `wayfarer-server` - the retrieval API and generator service routers
//! - `wayfarer-client` - API client and the client [`Workflow`]
//!
//! Everything a library user needs is re-exported here.

pub mod cli;
mod error;

pub use error::WayfarerError;

pub use wayfarer_client::{ApiClient, ClientError, ItineraryView, Workflow, WorkflowError};
pub use wayfarer_config::{CliArgs, Config, ConfigError, GeneratorMode};
pub use wayfarer_engine::{EngineError, GenerationReport, Pipeline};
pub use wayfarer_generator::{GenerationError, Generator, ReferenceGenerator};
pub use wayfarer_store::{Entry, ItineraryRecord, Key, Lookup, StoreError, StoreStatus, TripRequest};
pub use wayfarer_utils::{DataPaths, ExitCode};
