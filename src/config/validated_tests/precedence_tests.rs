//! Tests for CLI > TOML > default precedence.

use std::path::PathBuf;
use std::time::Duration;

use super::*;

const FULL_TOML: &str = r#"
    [monitor]
    poll_interval = 60
    read_timeout_ms = 1500
    state_file = "/toml/state.json"

    [server]
    listen = "127.0.0.1:9500"
    metrics_path = "/toml-metrics"

    [prefix]
    watch = ["ppp0/56"]
"#;

#[test]
fn toml_overrides_defaults() {
    let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml(FULL_TOML))).unwrap();

    assert_eq!(config.poll_interval, Duration::from_secs(60));
    assert_eq!(config.read_timeout, Duration::from_millis(1500));
    assert_eq!(config.listen, "127.0.0.1:9500".parse().unwrap());
    assert_eq!(config.metrics_path, "/toml-metrics");
    assert_eq!(config.state_file, Some(PathBuf::from("/toml/state.json")));
    assert_eq!(config.prefix_watches[0].to_string(), "ppp0/56");
}

#[test]
fn cli_overrides_toml() {
    let cli = cli(&[
        "--poll-interval",
        "10",
        "--read-timeout-ms",
        "200",
        "--listen",
        "[::1]:9600",
        "--metrics-path",
        "/cli-metrics",
        "--state-file",
        "/cli/state.json",
        "--watch-prefix",
        "eth1/48",
    ]);

    let config = ValidatedConfig::from_raw(&cli, Some(&toml(FULL_TOML))).unwrap();

    assert_eq!(config.poll_interval, Duration::from_secs(10));
    assert_eq!(config.read_timeout, Duration::from_millis(200));
    assert_eq!(config.listen, "[::1]:9600".parse().unwrap());
    assert_eq!(config.metrics_path, "/cli-metrics");
    assert_eq!(config.state_file, Some(PathBuf::from("/cli/state.json")));
    assert_eq!(config.prefix_watches.len(), 1);
    assert_eq!(config.prefix_watches[0].to_string(), "eth1/48");
}

#[test]
fn cli_interval_revalidates_toml_timeout() {
    // 1500ms from TOML is too long for a 1s CLI interval.
    let result = ValidatedConfig::from_raw(&cli(&["--poll-interval", "1"]), Some(&toml(FULL_TOML)));

    assert!(matches!(
        result,
        Err(ConfigError::InvalidDuration {
            field: "read_timeout",
            ..
        })
    ));
}

#[test]
fn partial_toml_falls_back_to_defaults() {
    let toml = toml(
        r"
        [monitor]
        poll_interval = 30
    ",
    );

    let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap();

    assert_eq!(config.poll_interval, Duration::from_secs(30));
    assert_eq!(config.metrics_path, "/metrics");
    assert_eq!(config.listen, "0.0.0.0:9101".parse().unwrap());
}

#[test]
fn verbose_comes_from_cli_only() {
    let config = ValidatedConfig::from_raw(&cli(&["-v"]), None).unwrap();

    assert!(config.verbose);
}
