//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Poll loop configuration
    #[serde(default)]
    pub monitor: MonitorSection,

    /// Metrics endpoint configuration
    #[serde(default)]
    pub server: ServerSection,

    /// Interface filter configuration
    #[serde(default)]
    pub filter: FilterSection,

    /// IPv6 prefix watches
    #[serde(default)]
    pub prefix: PrefixSection,
}

/// Poll loop configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSection {
    /// Polling interval in seconds
    pub poll_interval: Option<u64>,

    /// Read timeout in milliseconds
    pub read_timeout_ms: Option<u64>,

    /// State file path
    pub state_file: Option<String>,
}

/// Metrics endpoint configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Socket address to listen on
    pub listen: Option<String>,

    /// Path of the scrape route
    pub metrics_path: Option<String>,
}

/// Interface filter configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    /// Regex patterns for interfaces to include
    #[serde(default)]
    pub include: Vec<String>,

    /// Regex patterns for interfaces to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Exclude loopback interfaces
    #[serde(default)]
    pub exclude_loopback: bool,
}

/// IPv6 prefix watch section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixSection {
    /// Watches written as `INTERFACE/LENGTH`
    #[serde(default)]
    pub watch: Vec<String>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# netif-exporter configuration file
# Every option can also be given as a CLI flag or NETIF_* environment variable,
# which take precedence over this file.

[monitor]
# Polling interval in seconds (default: 15)
poll_interval = 15

# How long one interface read may take, in milliseconds.
# Must be shorter than the poll interval (default: half the interval, at most 5000)
# read_timeout_ms = 5000

# Keep the last snapshot here so restarts only report real changes
# state_file = "/var/lib/netif-exporter/state.json"

[server]
# Address of the metrics endpoint (default: 0.0.0.0:9101)
listen = "0.0.0.0:9101"

# Prometheus scrape path (default: /metrics)
metrics_path = "/metrics"

[filter]
# Regex patterns for interfaces to include (empty = all)
# Note: CLI patterns REPLACE these entirely (not merged)
# include = ["^eth", "^en"]

# Regex patterns for interfaces to exclude
# Note: CLI patterns REPLACE these entirely (not merged)
# exclude = ["^veth", "^docker", "^br-"]

# Exclude loopback interfaces
exclude_loopback = true

[prefix]
# IPv6 prefixes to watch, as INTERFACE/LENGTH
# watch = ["eth0/64"]
"#
    .to_string()
}
