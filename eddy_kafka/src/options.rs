use std::time::Duration;

use rdkafka::ClientConfig;

use crate::error::{InvalidSettingSnafu, Result};

#[derive(Debug, Clone)]
pub struct KafkaOptions {
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    /// Extra librdkafka settings, applied last.
    pub settings: Vec<(String, String)>,
    /// Bound on the metadata request used to probe the broker.
    pub metadata_timeout: Duration,
}

impl Default for KafkaOptions {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka:29092".to_string(),
            topic: "analytics-events".to_string(),
            group_id: "delta-writer-consumer".to_string(),
            settings: Vec::new(),
            metadata_timeout: Duration::from_secs(5),
        }
    }
}

impl KafkaOptions {
    /// Consumer configuration with manual commits.
    ///
    /// Offsets are committed by the ingest loop once a batch is durable, and a
    /// group without committed offsets starts from the earliest message.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");

        for (key, value) in &self.settings {
            config.set(key, value);
        }

        config
    }
}

/// Parses a `key=value` librdkafka setting.
pub fn parse_setting(setting: &str) -> Result<(String, String)> {
    let parsed = setting
        .split_once('=')
        .map(|(key, value)| (key.trim(), value.trim()));

    match parsed {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => InvalidSettingSnafu { setting }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let options = KafkaOptions {
            settings: vec![("session.timeout.ms".to_string(), "6000".to_string())],
            ..Default::default()
        };
        let config = options.client_config();

        assert_eq!(config.get("bootstrap.servers"), Some("kafka:29092"));
        assert_eq!(config.get("group.id"), Some("delta-writer-consumer"));
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(config.get("session.timeout.ms"), Some("6000"));
    }

    #[test]
    fn test_settings_override_defaults() {
        let options = KafkaOptions {
            settings: vec![("auto.offset.reset".to_string(), "latest".to_string())],
            ..Default::default()
        };

        assert_eq!(
            options.client_config().get("auto.offset.reset"),
            Some("latest")
        );
    }

    #[test]
    fn test_parse_setting() {
        assert_eq!(
            parse_setting("security.protocol=SASL_SSL").unwrap(),
            ("security.protocol".to_string(), "SASL_SSL".to_string())
        );
        assert_eq!(
            parse_setting("sasl.password=a=b").unwrap(),
            ("sasl.password".to_string(), "a=b".to_string())
        );
        assert!(parse_setting("no-equals").is_err());
        assert!(parse_setting("=value").is_err());
    }
}
