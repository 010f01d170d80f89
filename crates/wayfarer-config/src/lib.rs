//! Layered configuration for wayfarer
//!
//! Values resolve with precedence CLI > environment > `config.toml` >
//! built-in defaults. Every resolved value remembers where it came from so
//! `wayfarer config` can show it.

mod discovery;
mod error;
mod model;
mod sources;
mod validation;

pub use error::ConfigError;
pub use model::{
    CliArgs, ClientConfig, Config, ConfigSource, GeneratorConfig, GeneratorMode,
    GeneratorServiceConfig, ServerConfig, StorageConfig,
};
