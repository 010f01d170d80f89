use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use wayfarer_utils::DataPaths;
use wayfarer_utils::paths::resolve_in_home;

use crate::ConfigError;

/// Where a resolved configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    Env(String),
    ConfigFile(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Env(var) => write!(f, "env ({var})"),
            Self::ConfigFile(path) => write!(f, "config file ({})", path.display()),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// How itinerary records are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    /// Built-in deterministic generator, in process
    Reference,
    /// External program fed the request log on stdin
    Command,
    /// Remote generator service over HTTP
    Http,
}

impl GeneratorMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Command => "command",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for GeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "command" => Ok(Self::Command),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::invalid(
                "generator.mode",
                format!("unknown mode '{other}' (expected reference, command or http)"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: Utf8PathBuf,
    pub requests_file: String,
    pub itineraries_file: String,
    pub lock_ttl_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Utf8PathBuf::from(".wayfarer/data"),
            requests_file: "requests.jsonl".to_string(),
            itineraries_file: "itineraries.jsonl".to_string(),
            lock_ttl_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    pub command: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub base_url: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Reference,
            command: "wayfarer".to_string(),
            args: vec!["generate".to_string()],
            timeout_secs: 120,
            base_url: "http://127.0.0.1:5001".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorServiceConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneratorServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub session_file: Utf8PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 30,
            session_file: Utf8PathBuf::from("session.json"),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub generator: GeneratorConfig,
    pub generator_service: GeneratorServiceConfig,
    pub client: ClientConfig,
    /// Dotted key (`server.port`) to the layer that supplied it
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Config {
    #[must_use]
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(
            self.storage.data_dir.clone(),
            &self.storage.requests_file,
            &self.storage.itineraries_file,
        )
    }

    /// Session file location; relative paths live under the wayfarer home.
    #[must_use]
    pub fn session_path(&self) -> Utf8PathBuf {
        resolve_in_home(&self.client.session_file)
    }

    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .cloned()
            .unwrap_or(ConfigSource::Defaults)
    }
}

/// Command-line overrides (highest precedence)
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<Utf8PathBuf>,
    pub generator_mode: Option<String>,
    pub generator_command: Option<String>,
    pub generator_timeout: Option<u64>,
    pub generator_url: Option<String>,
    pub generator_host: Option<String>,
    pub generator_port: Option<u16>,
    pub api_url: Option<String>,
    pub client_timeout: Option<u64>,
}
