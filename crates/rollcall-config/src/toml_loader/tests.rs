//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_parse_error() {
    let result = load_from_path(Path::new("/tmp/nonexistent_rollcall_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, rollcall_common::ConfigError::ParseError(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[presence]
network_debounce_ms = 1500
status_root = "presence"

[realtime]
url = "wss://rt.example.org/socket"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.presence.network_debounce_ms, 1500);
    assert_eq!(config.presence.status_root, "presence");
    assert_eq!(config.realtime.url, "wss://rt.example.org/socket");
    // Defaults preserved
    assert_eq!(config.presence.channel_debounce_ms, 3000);
    assert_eq!(config.presence.heartbeat_interval_secs, 15);
    assert_eq!(config.reachability.poll_interval_secs, 5);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, rollcall_common::ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[presence]
heartbeat_interval_secs = 1
network_debounce_ms = 900
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.presence.heartbeat_interval_secs, 15);
    assert_eq!(config.presence.network_debounce_ms, 2000);
}

#[test]
fn log_level_parses_lowercase() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.logging.level, crate::schema::LogLevel::Debug);
    assert_eq!(config.logging.level.as_directive(), "debug");
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollcall").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.presence.status_root, "status");
    assert!(config.realtime.url.is_empty());
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::RollcallConfig;

    let config: RollcallConfig = toml::from_str(&default_config_toml()).unwrap();
    assert_eq!(config.presence.status_root, "status");
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("rollcall"));
        assert!(path_str.ends_with("config.toml"));
    }
}

#[test]
fn explicit_config_path_wins() {
    use super::paths::resolve_config_path;
    use std::path::PathBuf;

    let path = resolve_config_path(
        Some("/etc/rollcall.toml".into()),
        Some(PathBuf::from("/home/u/.config")),
    )
    .unwrap();
    assert_eq!(path, PathBuf::from("/etc/rollcall.toml"));

    let path = resolve_config_path(Some("".into()), Some(PathBuf::from("/home/u/.config"))).unwrap();
    assert_eq!(path, PathBuf::from("/home/u/.config/rollcall/config.toml"));
}

#[test]
fn missing_platform_dir_names_the_override() {
    let err = super::paths::resolve_config_path(None, None).unwrap_err();
    assert!(err.to_string().contains(super::CONFIG_PATH_ENV));
}
