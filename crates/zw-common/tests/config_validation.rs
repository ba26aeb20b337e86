//! Config loading plus validation, exercised through the public API.

use std::fs;
use tempfile::TempDir;
use zw_common::{
    load_config, ConfigError, ConfigOptions, ConfigSource, KillStrategy, ProcessFilter, WatchMode,
};

fn options_for(dir: &TempDir, file: Option<&str>) -> ConfigOptions {
    ConfigOptions {
        config_path: file.map(|f| dir.path().join(f)),
        config_dir: Some(dir.path().to_path_buf()),
        ignore_env: true,
    }
}

#[test]
fn full_port_config_loads_and_validates() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("watch.json"),
        r#"{
            "mode": "ports",
            "base_ports": [3000, 5173],
            "range": 10,
            "interval_ms": 500,
            "strategy": "kill-base",
            "filter": ["node", "vite"],
            "dry_run": true,
            "lock_port": 47999
        }"#,
    )
    .unwrap();

    let resolved = load_config(&options_for(&dir, Some("watch.json"))).unwrap();
    assert_eq!(resolved.source, ConfigSource::CliArgument);

    let config = resolved.config;
    config.validate().unwrap();
    assert_eq!(config.strategy, KillStrategy::KillBase);
    assert!(config.dry_run);
    assert_eq!(config.lock_port, Some(47999));
    assert_eq!(config.windows().len(), 2);
}

#[test]
fn cli_overrides_then_validate() {
    let dir = TempDir::new().unwrap();
    let mut config = load_config(&options_for(&dir, None)).unwrap().config;

    // Defaults alone fail: no filter, no base port.
    assert!(matches!(config.validate(), Err(ConfigError::EmptyFilter)));

    config.filter = ProcessFilter::parse("node");
    assert!(matches!(config.validate(), Err(ConfigError::NoBasePort)));

    config.base_ports = vec![8080];
    config.validate().unwrap();
}

#[test]
fn process_mode_config_from_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("procs.json"),
        r#"{"mode":"processes","filter":["esbuild"],"max_age_minutes":45}"#,
    )
    .unwrap();

    let config = load_config(&options_for(&dir, Some("procs.json")))
        .unwrap()
        .config;
    config.validate().unwrap();
    assert_eq!(config.mode, WatchMode::Processes);
    assert_eq!(config.max_age(), Some(chrono::Duration::minutes(45)));
}

#[test]
fn unknown_strategy_in_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.json"), r#"{"strategy":"newest"}"#).unwrap();
    let err = load_config(&options_for(&dir, Some("bad.json"))).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}
