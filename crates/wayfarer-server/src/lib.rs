//! HTTP surfaces
//!
//! - [`api::router`]: the retrieval API over a [`Pipeline`](wayfarer_engine::Pipeline)
//! - [`generator_service::router`]: a standalone generator service backed by
//!   the reference generator
//!
//! Both are plain [`axum::Router`]s; [`serve`] binds one and runs it until
//! Ctrl-C.

pub mod api;
mod error;
pub mod generator_service;
mod serve;

pub use error::ApiError;
pub use serve::{serve, shutdown_signal, with_middleware};
