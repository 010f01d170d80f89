//! Itinerary generation
//!
//! A [`Generator`] turns the request log into itinerary records. Three
//! implementations ship here:
//!
//! - [`ReferenceGenerator`]: deterministic, in process
//! - [`CommandGenerator`]: an external program speaking NDJSON on stdin/stdout
//! - [`HttpGenerator`]: a remote generator service
//!
//! [`Invoker`] wraps any of them with single-flight semantics, the
//! cross-process lock and atomic store replacement.

mod command;
mod error;
mod generator;
mod http;
mod invoker;
mod reference;

pub use command::CommandGenerator;
pub use error::GenerationError;
pub use generator::{Generator, error_record, from_config, parse_output};
pub use http::{HttpClient, HttpGenerator};
pub use invoker::{GenerationReport, Invoker};
pub use reference::ReferenceGenerator;
