//! 配置文件加载测试

use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiring::logging::LogFormat;
use wiring::{ConfigError, Injector, WiringConfig};

const SAMPLE: &str = r#"
[injector]
self_name = "container"

[logging]
level = "debug"
format = "pretty"

[values]
greeting = "hello"
retries = 3

[values.server]
host = "localhost"
ports = [80, 443]
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_file() {
    let file = write_config(SAMPLE);
    let config = WiringConfig::load_with_env(file.path(), |_| None).unwrap();

    assert_eq!(config.injector.self_name, "container");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.logging_config().unwrap().level, tracing::Level::DEBUG);
    assert_eq!(config.values.len(), 3);
}

#[test]
fn test_values_resolve_including_paths() {
    let config = WiringConfig::from_toml_str(SAMPLE, "inline").unwrap();
    let injector = config.injector_builder().unwrap().build().unwrap();

    assert_eq!(injector.get("greeting").unwrap().as_json(), Some(&json!("hello")));
    assert_eq!(injector.get("retries").unwrap().as_json(), Some(&json!(3)));
    assert_eq!(
        injector.get("server.host").unwrap().as_json(),
        Some(&json!("localhost"))
    );
    assert_eq!(injector.get("server.ports.1").unwrap().as_json(), Some(&json!(443)));

    assert!(injector.get_as::<Injector>("container").unwrap().ptr_eq(&injector));
}

#[test]
fn test_config_values_combine_with_code_modules() {
    let config = WiringConfig::from_toml_str(SAMPLE, "inline").unwrap();

    let mut overrides = wiring::Module::named("overrides");
    overrides.value("greeting", json!("bonjour"));

    let injector = config
        .injector_builder()
        .unwrap()
        .module(overrides)
        .build()
        .unwrap();

    assert_eq!(injector.get("greeting").unwrap().as_json(), Some(&json!("bonjour")));
}

#[test]
fn test_environment_lookup_overrides_file_level() {
    let file = write_config(SAMPLE);
    let config = WiringConfig::load_with_env(file.path(), |key| {
        (key == wiring::config::LOG_LEVEL_ENV).then(|| "warn".to_string())
    })
    .unwrap();

    assert_eq!(config.logging_config().unwrap().level, tracing::Level::WARN);
}

#[test]
fn test_missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let error = WiringConfig::load_with_env(&path, |_| None).unwrap_err();
    assert!(matches!(error, ConfigError::FileRead(ref origin, _) if origin.ends_with("absent.toml")));
}

#[test]
fn test_malformed_toml_is_reported() {
    let file = write_config("[values\ngreeting = ");

    let error = WiringConfig::load_with_env(file.path(), |_| None).unwrap_err();
    assert!(matches!(error, ConfigError::TomlParse(..)));
}
