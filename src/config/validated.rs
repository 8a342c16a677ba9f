//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::{PrefixWatch, default_read_timeout};
use crate::network::filter::{FilterChain, LoopbackFilter, NameRegexFilter};
use crate::server::{HEALTH_PATH, INTERFACES_PATH};

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Time between poll cycles
    pub poll_interval: Duration,

    /// Upper bound for one interface read, always shorter than `poll_interval`
    pub read_timeout: Duration,

    /// Address the metrics endpoint binds to
    pub listen: SocketAddr,

    /// Path of the scrape route
    pub metrics_path: String,

    /// Interface filter applied to every snapshot
    pub filter: FilterChain,

    /// IPv6 prefixes to track, in configuration order without duplicates
    pub prefix_watches: Vec<PrefixWatch>,

    /// Path to state file for detecting changes across restarts.
    /// If `None`, state persistence is disabled.
    pub state_file: Option<PathBuf>,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_file_str = self
            .state_file
            .as_ref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string());
        let watches: Vec<String> = self.prefix_watches.iter().map(ToString::to_string).collect();

        write!(
            f,
            "Config {{ listen: {}, metrics_path: {}, poll_interval: {}s, read_timeout: {}ms, \
             filters: {}, prefix_watches: [{}], state_file: {} }}",
            self.listen,
            self.metrics_path,
            self.poll_interval.as_secs(),
            self.read_timeout.as_millis(),
            self.filter.len(),
            watches.join(", "),
            state_file_str,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Durations are zero, or the read timeout is not shorter than the interval
    /// - The listen address does not parse
    /// - The metrics path is malformed or shadows another route
    /// - Regex patterns are invalid
    /// - Prefix watches are malformed
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let poll_interval = Self::resolve_poll_interval(cli, toml)?;
        let read_timeout = Self::resolve_read_timeout(cli, toml, poll_interval)?;
        let listen = Self::resolve_listen(cli, toml)?;
        let metrics_path = Self::resolve_metrics_path(cli, toml)?;
        let filter = Self::build_filter(cli, toml)?;
        let prefix_watches = Self::resolve_prefix_watches(cli, toml)?;
        let state_file = Self::resolve_state_file(cli, toml);

        Ok(Self {
            poll_interval,
            read_timeout,
            listen,
            metrics_path,
            filter,
            prefix_watches,
            state_file,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_poll_interval(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Duration, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let seconds = cli
            .poll_interval
            .or_else(|| toml.and_then(|t| t.monitor.poll_interval))
            .unwrap_or(defaults::POLL_INTERVAL_SECS);

        if seconds == 0 {
            return Err(ConfigError::duration(
                field::POLL_INTERVAL,
                "must be greater than 0",
            ));
        }

        Ok(Duration::from_secs(seconds))
    }

    fn resolve_read_timeout(
        cli: &Cli,
        toml: Option<&TomlConfig>,
        poll_interval: Duration,
    ) -> Result<Duration, ConfigError> {
        let Some(millis) = cli
            .read_timeout_ms
            .or_else(|| toml.and_then(|t| t.monitor.read_timeout_ms))
        else {
            return Ok(default_read_timeout(poll_interval));
        };

        if millis == 0 {
            return Err(ConfigError::duration(
                field::READ_TIMEOUT,
                "must be greater than 0",
            ));
        }

        let timeout = Duration::from_millis(millis);
        if timeout >= poll_interval {
            return Err(ConfigError::duration(
                field::READ_TIMEOUT,
                format!(
                    "{millis}ms must be shorter than the poll interval ({}s)",
                    poll_interval.as_secs()
                ),
            ));
        }

        Ok(timeout)
    }

    fn resolve_listen(cli: &Cli, toml: Option<&TomlConfig>) -> Result<SocketAddr, ConfigError> {
        let value = cli
            .listen
            .as_deref()
            .or_else(|| toml.and_then(|t| t.server.listen.as_deref()))
            .unwrap_or(defaults::LISTEN);

        value
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidAddress {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    fn resolve_metrics_path(cli: &Cli, toml: Option<&TomlConfig>) -> Result<String, ConfigError> {
        let value = cli
            .metrics_path
            .as_deref()
            .or_else(|| toml.and_then(|t| t.server.metrics_path.as_deref()))
            .unwrap_or(defaults::METRICS_PATH);

        let invalid = |reason| ConfigError::InvalidPath {
            value: value.to_string(),
            reason,
        };

        if !value.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if value.contains([':', '*', '{', '}']) {
            return Err(invalid("must be a literal path without captures"));
        }
        if value == INTERFACES_PATH || value == HEALTH_PATH {
            return Err(invalid("collides with a built-in route"));
        }

        Ok(value.to_string())
    }

    fn build_filter(cli: &Cli, toml: Option<&TomlConfig>) -> Result<FilterChain, ConfigError> {
        let mut filter = FilterChain::new();

        // Exclude loopback if CLI flag or TOML setting
        let exclude_loopback =
            cli.exclude_loopback || toml.is_some_and(|t| t.filter.exclude_loopback);
        if exclude_loopback {
            filter = filter.exclude(LoopbackFilter);
        }

        // CLI patterns replace TOML patterns, includes and excludes independently
        let includes = pick_list(&cli.include_interfaces, toml.map(|t| &t.filter.include));
        for pattern in includes {
            filter = filter.include(compile(pattern)?);
        }

        let excludes = pick_list(&cli.exclude_interfaces, toml.map(|t| &t.filter.exclude));
        for pattern in excludes {
            filter = filter.exclude(compile(pattern)?);
        }

        Ok(filter)
    }

    fn resolve_prefix_watches(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Vec<PrefixWatch>, ConfigError> {
        let raw = pick_list(&cli.watch_prefixes, toml.map(|t| &t.prefix.watch));

        let mut watches: Vec<PrefixWatch> = Vec::with_capacity(raw.len());
        for value in raw {
            let watch: PrefixWatch = value.trim().parse()?;
            if !watches.contains(&watch) {
                watches.push(watch);
            }
        }

        Ok(watches)
    }

    fn resolve_state_file(cli: &Cli, toml: Option<&TomlConfig>) -> Option<PathBuf> {
        // CLI takes precedence
        if let Some(ref path) = cli.state_file {
            return Some(path.clone());
        }

        // Fall back to TOML
        toml.and_then(|t| t.monitor.state_file.as_ref().map(PathBuf::from))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

// Helper functions

/// Returns the CLI list if it has entries, otherwise the TOML list.
fn pick_list<'a>(cli: &'a [String], toml: Option<&'a Vec<String>>) -> &'a [String] {
    if cli.is_empty() {
        toml.map(Vec::as_slice).unwrap_or_default()
    } else {
        cli
    }
}

fn compile(pattern: &str) -> Result<NameRegexFilter, ConfigError> {
    NameRegexFilter::new(pattern).map_err(|e| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        source: e,
    })
}
