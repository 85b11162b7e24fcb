//! Unit tests for parser settings files

use std::fs;

use serial_shell_parser::config::loader::ConfigLoader;
use serial_shell_parser::{Error, ParserSettings};
use tempfile::TempDir;

#[test]
fn test_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shell-parser.toml");
    let settings = ParserSettings {
        timeout_ms: 2500,
        column_width: 120,
        shell_echos: false,
        ..ParserSettings::with_prompt("nrf52:~$ ")
    };

    ConfigLoader::save_to_path(&settings, &path).unwrap();
    let loaded = ConfigLoader::load_from_path(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_json_preserves_prompt_discovery() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("shell-parser.json");
    let settings = ParserSettings::with_prompt_discovery();

    ConfigLoader::save_to_path(&settings, &path).unwrap();
    let loaded = ConfigLoader::load_from_path(&path).unwrap();
    assert_eq!(loaded.shell_prompt, None);
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shell-parser.toml");
    fs::write(&path, "timeout_ms = 300\n").unwrap();

    let loaded = ConfigLoader::load_from_path(&path).unwrap();
    assert_eq!(loaded.timeout_ms, 300);
    assert_eq!(loaded.column_width, 80);
    assert_eq!(loaded.shell_prompt.as_deref(), Some("uart:~$ "));
}

#[test]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();

    let path = dir.path().join("width.toml");
    fs::write(&path, "column_width = 0\n").unwrap();
    match ConfigLoader::load_from_path(&path) {
        Err(Error::ConfigValidationFailed { field, .. }) => assert_eq!(field, "column_width"),
        other => panic!("unexpected result: {:?}", other),
    }

    let path = dir.path().join("pattern.json");
    fs::write(&path, r#"{ "log_pattern": "(unclosed" }"#).unwrap();
    match ConfigLoader::load_from_path(&path) {
        Err(Error::ConfigValidationFailed { field, .. }) => assert_eq!(field, "log_pattern"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shell-parser.toml");
    fs::write(&path, "timeout_ms = \"soon\"\n").unwrap();

    assert!(matches!(
        ConfigLoader::load_from_path(&path),
        Err(Error::ConfigParseFailed { .. })
    ));
}

#[test]
fn test_search_paths_in_order() {
    if std::env::var(serial_shell_parser::config::loader::CONFIG_ENV_VAR).is_ok() {
        return;
    }

    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    ConfigLoader::save_to_path(
        &ParserSettings::with_prompt("second:~$ "),
        &second.path().join("shell-parser.toml"),
    )
    .unwrap();

    let mut loader =
        ConfigLoader::with_search_paths(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
    let settings = loader.load_or_default().unwrap();
    assert_eq!(settings.shell_prompt.as_deref(), Some("second:~$ "));
    assert_eq!(
        loader.current_path(),
        Some(second.path().join("shell-parser.toml").as_path())
    );
}

#[test]
fn test_broken_file_in_search_path_is_skipped() {
    if std::env::var(serial_shell_parser::config::loader::CONFIG_ENV_VAR).is_ok() {
        return;
    }

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shell-parser.toml"), "column_width = 0\n").unwrap();
    ConfigLoader::save_to_path(
        &ParserSettings::with_prompt("json:~$ "),
        &dir.path().join("shell-parser.json"),
    )
    .unwrap();

    let mut loader = ConfigLoader::with_search_paths(vec![dir.path().to_path_buf()]);
    let settings = loader.load_or_default().unwrap();
    assert_eq!(settings.shell_prompt.as_deref(), Some("json:~$ "));
}
