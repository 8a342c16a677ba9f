//! Configuration layer for netif-exporter.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments or `NETIF_*` environment variables**
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! For list options (`include_interfaces`, `exclude_interfaces`, `watch_prefixes`),
//! CLI values **replace** TOML values entirely (not merged). Include and exclude
//! patterns are handled independently: `--include-interface` replaces only the
//! TOML includes.
//!
//! # Boolean Flag Semantics
//!
//! `--exclude-loopback` uses OR semantics: if set in either CLI or TOML, the
//! result is `true`. Flags only enable, never disable.
//!
//! # Derived Values
//!
//! The read timeout defaults to half the poll interval, capped at 5 seconds.
//! An explicit timeout must be shorter than the interval, whichever source
//! each value came from.

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command};
pub use error::ConfigError;
pub use toml::{TomlConfig, default_config_template};
pub use validated::{ValidatedConfig, write_default_config};
