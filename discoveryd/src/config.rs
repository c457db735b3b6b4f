use std::collections::HashMap;
use std::path::Path;
use serde::Deserialize;
use anyhow::{ensure, Context, Result};
use ad_listeners::{ContainerPort, DEFAULT_CHANNEL_CAPACITY};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default, rename = "static")]
    pub static_services: StaticConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Registered listener names to activate
    #[serde(default = "default_listeners")]
    pub listeners: Vec<String>,
    /// Capacity of each event channel; a full channel stalls the listener
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MdnsConfig {
    /// Restrict browsing to one interface
    pub interface: Option<String>,
    /// Service types to browse; empty means discover them via the meta-query
    #[serde(default)]
    pub service_types: Vec<String>,
    #[serde(default)]
    pub ipv6_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub services: Vec<StaticServiceConfig>,
}

/// A service declared in the config file. Fields left out are reported as
/// unsupported.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticServiceConfig {
    pub id: String,
    pub ad_identifiers: Option<Vec<String>>,
    pub hosts: Option<HashMap<String, String>>,
    pub ports: Option<Vec<ContainerPort>>,
    pub tags: Option<Vec<String>>,
    pub pid: Option<u32>,
    pub hostname: Option<String>,
}

fn default_listeners() -> Vec<String> {
    vec!["mdns".to_string()]
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_summary_interval() -> u64 {
    60
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            listeners: default_listeners(),
            channel_capacity: default_channel_capacity(),
            summary_interval_secs: default_summary_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.discovery.channel_capacity > 0, "discovery.channel_capacity must be greater than 0");
        ensure!(self.discovery.summary_interval_secs > 0, "discovery.summary_interval_secs must be greater than 0");
        ensure!(!self.discovery.listeners.is_empty(), "discovery.listeners must name at least one listener");

        let mut seen = std::collections::HashSet::new();
        for service in &self.static_services.services {
            ensure!(!service.id.is_empty(), "static service without an id");
            ensure!(seen.insert(service.id.as_str()), "duplicate static service id {}", service.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.discovery.listeners, vec!["mdns".to_string()]);
        assert_eq!(config.discovery.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.discovery.summary_interval_secs, 60);
        assert!(config.mdns.interface.is_none());
        assert!(config.mdns.service_types.is_empty());
        assert!(config.static_services.services.is_empty());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(include_str!("../discoveryd.example.toml")).unwrap();
        assert_eq!(config.discovery.listeners, vec!["mdns".to_string(), "static".to_string()]);
        assert_eq!(config.mdns.interface.as_deref(), Some("eth0"));

        let redis = &config.static_services.services[0];
        assert_eq!(redis.id, "redis-primary");
        assert_eq!(redis.ports.as_ref().unwrap()[0], ContainerPort::new(6379, "redis"));
        assert_eq!(redis.hosts.as_ref().unwrap()["bridge"], "172.17.0.2");

        let batch = &config.static_services.services[1];
        assert!(batch.pid.is_none());
        assert!(batch.hosts.is_none());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = Config::parse("[discovery]\nchannel_capacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn test_duplicate_static_ids_are_rejected() {
        let contents = r#"
            [[static.services]]
            id = "a"

            [[static.services]]
            id = "a"
        "#;
        assert!(Config::parse(contents).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let err = Config::load("/nonexistent/discoveryd.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/discoveryd.toml"));
    }
}
