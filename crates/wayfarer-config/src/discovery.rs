use camino::Utf8PathBuf;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::{CliArgs, Config, ConfigError, ConfigSource, GeneratorMode};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    server: Option<TomlEndpoint>,
    storage: Option<TomlStorage>,
    generator: Option<TomlGenerator>,
    generator_service: Option<TomlEndpoint>,
    client: Option<TomlClient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlEndpoint {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlStorage {
    data_dir: Option<Utf8PathBuf>,
    requests_file: Option<String>,
    itineraries_file: Option<String>,
    lock_ttl_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlGenerator {
    mode: Option<String>,
    command: Option<String>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlClient {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    session_file: Option<Utf8PathBuf>,
}

/// Environment variables consulted between the config file and the CLI
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("WAYFARER_PORT", "server.port"),
    ("WAYFARER_GENERATOR_PORT", "generator_service.port"),
    ("WAYFARER_DATA_DIR", "storage.data_dir"),
    ("WAYFARER_GENERATOR_MODE", "generator.mode"),
    ("WAYFARER_GENERATOR_URL", "generator.base_url"),
    ("WAYFARER_API_URL", "client.base_url"),
];

struct Layering<'a> {
    attribution: &'a mut HashMap<String, ConfigSource>,
    source: ConfigSource,
}

impl Layering<'_> {
    fn set<T>(&mut self, slot: &mut T, value: Option<T>, key: &str) {
        if let Some(value) = value {
            *slot = value;
            self.attribution.insert(key.to_string(), self.source.clone());
        }
    }
}

fn parse_env<T: FromStr>(var: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::invalid(var, format!("cannot parse '{value}'")))
    })
    .transpose()
}

fn parse_mode(value: Option<String>) -> Result<Option<GeneratorMode>, ConfigError> {
    value.map(|s| s.parse()).transpose()
}

impl Config {
    /// Discover and load configuration from the current directory and process env.
    ///
    /// # Errors
    ///
    /// Fails if the working directory is unavailable, a config file cannot be
    /// read or parsed, an override cannot be parsed, or validation fails.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("Failed to get current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Path-driven variant of [`discover`](Self::discover).
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        Self::discover_with_env(start_dir, cli_args, |var| std::env::var(var).ok())
    }

    /// Fully injected variant; tests supply `env` instead of mutating the process.
    ///
    /// # Errors
    ///
    /// See [`discover`](Self::discover).
    pub fn discover_with_env(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut attribution = HashMap::new();

        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading config file");
            let file = Self::load_config_file(path)?;
            let mut layer = Layering {
                attribution: &mut attribution,
                source: ConfigSource::ConfigFile(path.clone()),
            };

            if let Some(server) = file.server {
                layer.set(&mut config.server.host, server.host, "server.host");
                layer.set(&mut config.server.port, server.port, "server.port");
            }
            if let Some(storage) = file.storage {
                layer.set(&mut config.storage.data_dir, storage.data_dir, "storage.data_dir");
                layer.set(
                    &mut config.storage.requests_file,
                    storage.requests_file,
                    "storage.requests_file",
                );
                layer.set(
                    &mut config.storage.itineraries_file,
                    storage.itineraries_file,
                    "storage.itineraries_file",
                );
                layer.set(
                    &mut config.storage.lock_ttl_seconds,
                    storage.lock_ttl_seconds,
                    "storage.lock_ttl_seconds",
                );
            }
            if let Some(generator) = file.generator {
                layer.set(&mut config.generator.mode, parse_mode(generator.mode)?, "generator.mode");
                layer.set(&mut config.generator.command, generator.command, "generator.command");
                layer.set(&mut config.generator.args, generator.args, "generator.args");
                layer.set(
                    &mut config.generator.timeout_secs,
                    generator.timeout_secs,
                    "generator.timeout_secs",
                );
                layer.set(&mut config.generator.base_url, generator.base_url, "generator.base_url");
            }
            if let Some(service) = file.generator_service {
                layer.set(&mut config.generator_service.host, service.host, "generator_service.host");
                layer.set(&mut config.generator_service.port, service.port, "generator_service.port");
            }
            if let Some(client) = file.client {
                layer.set(&mut config.client.base_url, client.base_url, "client.base_url");
                layer.set(&mut config.client.timeout_secs, client.timeout_secs, "client.timeout_secs");
                layer.set(&mut config.client.session_file, client.session_file, "client.session_file");
            }
        }

        for (var, key) in ENV_OVERRIDES {
            let Some(raw) = env(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let mut layer = Layering {
                attribution: &mut attribution,
                source: ConfigSource::Env((*var).to_string()),
            };
            match *key {
                "server.port" => layer.set(&mut config.server.port, parse_env(var, Some(raw))?, key),
                "generator_service.port" => {
                    layer.set(&mut config.generator_service.port, parse_env(var, Some(raw))?, key);
                }
                "storage.data_dir" => {
                    layer.set(&mut config.storage.data_dir, Some(Utf8PathBuf::from(raw)), key);
                }
                "generator.mode" => layer.set(&mut config.generator.mode, parse_mode(Some(raw))?, key),
                "generator.base_url" => layer.set(&mut config.generator.base_url, Some(raw), key),
                "client.base_url" => layer.set(&mut config.client.base_url, Some(raw), key),
                _ => {}
            }
        }

        let mut layer = Layering {
            attribution: &mut attribution,
            source: ConfigSource::Cli,
        };
        layer.set(&mut config.server.host, cli_args.host.clone(), "server.host");
        layer.set(&mut config.server.port, cli_args.port, "server.port");
        layer.set(&mut config.storage.data_dir, cli_args.data_dir.clone(), "storage.data_dir");
        layer.set(
            &mut config.generator.mode,
            parse_mode(cli_args.generator_mode.clone())?,
            "generator.mode",
        );
        layer.set(
            &mut config.generator.command,
            cli_args.generator_command.clone(),
            "generator.command",
        );
        layer.set(
            &mut config.generator.timeout_secs,
            cli_args.generator_timeout,
            "generator.timeout_secs",
        );
        layer.set(&mut config.generator.base_url, cli_args.generator_url.clone(), "generator.base_url");
        layer.set(
            &mut config.generator_service.host,
            cli_args.generator_host.clone(),
            "generator_service.host",
        );
        layer.set(
            &mut config.generator_service.port,
            cli_args.generator_port,
            "generator_service.port",
        );
        layer.set(&mut config.client.base_url, cli_args.api_url.clone(), "client.base_url");
        layer.set(&mut config.client.timeout_secs, cli_args.client_timeout, "client.timeout_secs");

        config.source_attribution = attribution;
        config.validate()?;
        Ok(config)
    }

    /// Search upward from `start_dir` for `.wayfarer/config.toml`.
    ///
    /// Stops at repository root markers (.git, .hg, .svn) or the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(".wayfarer").join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
            if [".git", ".hg", ".svn"].iter().any(|m| dir.join(m).exists()) {
                break;
            }
            current = dir.parent();
        }
        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            // An explicit path that does not exist yet means "defaults"
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(".wayfarer");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_when_no_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        let config = Config::discover_with_env(temp.path(), &CliArgs::default(), no_env).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.source_of("server.port"), ConfigSource::Defaults);
    }

    #[test]
    fn file_values_are_attributed() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
[server]
port = 8080

[generator]
mode = "command"
command = "/usr/local/bin/planner"
args = []
"#,
        );

        let config = Config::discover_with_env(temp.path(), &CliArgs::default(), no_env).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.generator.mode, GeneratorMode::Command);
        assert!(config.generator.args.is_empty());
        assert_eq!(config.source_of("server.port"), ConfigSource::ConfigFile(path));
        assert_eq!(config.source_of("server.host"), ConfigSource::Defaults);
    }

    #[test]
    fn discovery_walks_upward_until_repo_root() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[server]\nport = 4000\n");
        fs::create_dir(temp.path().join(".git")).unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_with_env(&nested, &CliArgs::default(), no_env).unwrap();
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn discovery_stops_at_repo_marker_below_config() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[server]\nport = 4000\n");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        let config = Config::discover_with_env(&repo, &CliArgs::default(), no_env).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn precedence_cli_over_env_over_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            "[server]\nport = 4000\n[client]\nbase_url = \"http://file:1\"\n",
        );
        let env = |var: &str| match var {
            "WAYFARER_PORT" => Some("5000".to_string()),
            "WAYFARER_API_URL" => Some("http://env:2".to_string()),
            _ => None,
        };
        let cli = CliArgs {
            port: Some(6000),
            ..CliArgs::default()
        };

        let config = Config::discover_with_env(temp.path(), &cli, env).unwrap();

        assert_eq!(config.server.port, 6000);
        assert_eq!(config.source_of("server.port"), ConfigSource::Cli);
        assert_eq!(config.client.base_url, "http://env:2");
        assert_eq!(
            config.source_of("client.base_url"),
            ConfigSource::Env("WAYFARER_API_URL".to_string())
        );
    }

    #[test]
    fn unparsable_env_value_names_the_variable() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let env = |var: &str| (var == "WAYFARER_GENERATOR_PORT").then(|| "fifty".to_string());

        let err = Config::discover_with_env(temp.path(), &CliArgs::default(), env).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "WAYFARER_GENERATOR_PORT"));
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[server]\nprot = 1\n");

        let err = Config::discover_with_env(temp.path(), &CliArgs::default(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
    }

    #[test]
    fn explicit_missing_path_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(temp.path().join("nope.toml")),
            ..CliArgs::default()
        };

        let config = Config::discover_with_env(temp.path(), &cli, no_env).unwrap();
        assert_eq!(config.generator.timeout_secs, 120);
    }
}
