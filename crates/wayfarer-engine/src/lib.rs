//! The wayfarer pipeline: submission, generation, retrieval.
//!
//! [`Pipeline`] is the one entry point the HTTP surface and the CLI use. It
//! owns the request log, the itinerary store and the generation invoker.

mod error;
mod pipeline;

pub use error::EngineError;
pub use pipeline::Pipeline;
pub use wayfarer_generator::GenerationReport;
