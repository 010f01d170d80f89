use crate::{Config, ConfigError, GeneratorMode};

const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

fn check_port(key: &str, port: u16) -> Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::invalid(key, "port must be between 1 and 65535"));
    }
    Ok(())
}

fn check_timeout(key: &str, secs: u64) -> Result<(), ConfigError> {
    if !TIMEOUT_RANGE.contains(&secs) {
        return Err(ConfigError::invalid(
            key,
            format!("{secs} is outside the allowed range of 1..=3600 seconds"),
        ));
    }
    Ok(())
}

fn check_file_name(key: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::invalid(key, "file name must not be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ConfigError::invalid(
            key,
            format!("'{name}' must be a bare file name inside storage.data_dir"),
        ));
    }
    Ok(())
}

fn check_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::invalid(key, "URL must not be empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::invalid(
            key,
            format!("'{url}' must start with http:// or https://"),
        ));
    }
    Ok(())
}

impl Config {
    /// Validate resolved values.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::InvalidValue`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_port("server.port", self.server.port)?;
        check_port("generator_service.port", self.generator_service.port)?;

        check_timeout("generator.timeout_secs", self.generator.timeout_secs)?;
        check_timeout("client.timeout_secs", self.client.timeout_secs)?;

        if self.storage.data_dir.as_str().trim().is_empty() {
            return Err(ConfigError::invalid("storage.data_dir", "must not be empty"));
        }
        check_file_name("storage.requests_file", &self.storage.requests_file)?;
        check_file_name("storage.itineraries_file", &self.storage.itineraries_file)?;
        if self.storage.requests_file == self.storage.itineraries_file {
            return Err(ConfigError::invalid(
                "storage.itineraries_file",
                "must differ from storage.requests_file",
            ));
        }
        if self.storage.lock_ttl_seconds == 0 {
            return Err(ConfigError::invalid(
                "storage.lock_ttl_seconds",
                "must be greater than 0",
            ));
        }
        if self.client.session_file.as_str().trim().is_empty() {
            return Err(ConfigError::invalid("client.session_file", "must not be empty"));
        }

        match self.generator.mode {
            GeneratorMode::Command if self.generator.command.trim().is_empty() => {
                return Err(ConfigError::invalid(
                    "generator.command",
                    "command mode requires a program to run",
                ));
            }
            GeneratorMode::Http => check_url("generator.base_url", &self.generator.base_url)?,
            _ => {}
        }

        check_url("client.base_url", &self.client.base_url)?;
        Ok(())
    }
}
