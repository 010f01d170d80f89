use std::collections::BTreeMap;

use crate::Config;

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let entries = [
            ("server.host", self.server.host.clone()),
            ("server.port", self.server.port.to_string()),
            ("storage.data_dir", self.storage.data_dir.to_string()),
            ("storage.requests_file", self.storage.requests_file.clone()),
            ("storage.itineraries_file", self.storage.itineraries_file.clone()),
            ("storage.lock_ttl_seconds", self.storage.lock_ttl_seconds.to_string()),
            ("generator.mode", self.generator.mode.to_string()),
            ("generator.command", self.generator.command.clone()),
            ("generator.args", self.generator.args.join(" ")),
            ("generator.timeout_secs", self.generator.timeout_secs.to_string()),
            ("generator.base_url", self.generator.base_url.clone()),
            ("generator_service.host", self.generator_service.host.clone()),
            ("generator_service.port", self.generator_service.port.to_string()),
            ("client.base_url", self.client.base_url.clone()),
            ("client.timeout_secs", self.client.timeout_secs.to_string()),
            ("client.session_file", self.client.session_file.to_string()),
        ];

        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), (value, self.source_of(key).to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigSource;

    #[test]
    fn lists_every_key_with_source() {
        let mut config = Config::default();
        config.server.port = 9000;
        config
            .source_attribution
            .insert("server.port".to_string(), ConfigSource::Cli);

        let effective = config.effective_config();

        assert_eq!(effective.len(), 16);
        assert_eq!(
            effective["server.port"],
            ("9000".to_string(), "cli".to_string())
        );
        assert_eq!(effective["generator.mode"].1, "defaults");
        assert_eq!(effective.keys().next().map(String::as_str), Some("client.base_url"));
    }
}
