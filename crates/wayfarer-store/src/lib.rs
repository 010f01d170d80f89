//! Persisted state of a wayfarer deployment
//!
//! Two line-delimited JSON files live in the data directory: the append-only
//! request log and the itinerary store. In both, the zero-based position of a
//! record is its key. Every line parses independently, so one damaged line
//! never hides its neighbours; it is surfaced as [`Entry::Malformed`] at its
//! own key instead.

pub mod error;
pub mod itinerary_store;
pub mod model;
pub mod ndjson;
pub mod request_log;

pub use error::StoreError;
pub use itinerary_store::ItineraryStore;
pub use model::{Entry, ItineraryRecord, Key, Lookup, StoreStatus, TripFields, TripRequest};
pub use request_log::RequestLog;
