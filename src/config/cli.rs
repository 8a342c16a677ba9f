//! CLI argument parsing using clap.
//!
//! Every run option can also come from a `NETIF_*` environment variable;
//! list-valued variables are comma-separated.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::defaults;

/// netif-exporter: network interface change exporter
///
/// Polls the host's network interfaces, detects address, state and MTU
/// changes, and serves them as Prometheus metrics.
#[derive(Debug, Parser)]
#[command(name = "netif-exporter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    #[arg(long, short, env = "NETIF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Polling interval in seconds
    #[arg(long = "poll-interval", value_name = "SECS", env = "NETIF_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// How long one interface read may take, in milliseconds
    #[arg(long = "read-timeout-ms", value_name = "MS", env = "NETIF_READ_TIMEOUT_MS")]
    pub read_timeout_ms: Option<u64>,

    /// Address the metrics endpoint listens on
    #[arg(long, value_name = "ADDR", env = "NETIF_LISTEN")]
    pub listen: Option<String>,

    /// Path of the Prometheus scrape route
    #[arg(long = "metrics-path", value_name = "PATH", env = "NETIF_METRICS_PATH")]
    pub metrics_path: Option<String>,

    /// Regex pattern for interfaces to include (can be specified multiple times)
    #[arg(
        long = "include-interface",
        value_name = "PATTERN",
        env = "NETIF_INCLUDE_INTERFACE",
        value_delimiter = ','
    )]
    pub include_interfaces: Vec<String>,

    /// Regex pattern for interfaces to exclude (can be specified multiple times)
    #[arg(
        long = "exclude-interface",
        value_name = "PATTERN",
        env = "NETIF_EXCLUDE_INTERFACE",
        value_delimiter = ','
    )]
    pub exclude_interfaces: Vec<String>,

    /// Exclude loopback interfaces
    #[arg(long = "exclude-loopback", env = "NETIF_EXCLUDE_LOOPBACK")]
    pub exclude_loopback: bool,

    /// IPv6 prefix to watch, as INTERFACE/LENGTH (can be specified multiple times)
    #[arg(
        long = "watch-prefix",
        value_name = "IFACE/LEN",
        env = "NETIF_WATCH_PREFIX",
        value_delimiter = ','
    )]
    pub watch_prefixes: Vec<String>,

    /// Path to state file for detecting changes across restarts
    #[arg(long = "state-file", env = "NETIF_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Subcommands for netif-exporter
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = defaults::CONFIG_FILE)]
        output: PathBuf,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
