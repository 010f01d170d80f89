//! Client side of wayfarer
//!
//! [`ApiClient`] speaks the retrieval API with a timeout on every call and
//! no automatic retries. [`Workflow`] drives the form → previews → detail
//! flow on top of it and remembers where the user was in a
//! [`SessionStore`].

mod api;
mod error;
pub mod preview;
mod session;
mod workflow;

pub use api::{ApiClient, ItineraryView, SubmitResponse};
pub use error::{ClientError, WorkflowError};
pub use preview::Preview;
pub use session::{Session, SessionStore};
pub use workflow::{Event, PREVIEW_COUNT, State, Workflow, preview_keys};
