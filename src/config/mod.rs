//! 配置文件加载
//!
//! `[injector]` 容器设置，`[logging]` 日志设置，`[values]` 中的每一项都注册为值提供者。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use tracing::{debug, Level};

use crate::errors::ConfigError;
use crate::infrastructure::{InjectorBuilder, Module, DEFAULT_SELF_NAME};
use crate::logging::{LogFormat, LoggingConfig};

/// 覆盖日志级别的环境变量
pub const LOG_LEVEL_ENV: &str = "WIRING_LOG_LEVEL";

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WiringConfig {
    pub injector: InjectorSection,
    pub logging: LoggingSection,
    pub values: toml::Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorSection {
    /// 指向容器自身的保留名称
    pub self_name: String,
}

impl Default for InjectorSection {
    fn default() -> Self {
        Self {
            self_name: DEFAULT_SELF_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl WiringConfig {
    /// 从文件加载配置，并应用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// 从文件加载配置，环境变量由 `lookup` 提供
    pub fn load_with_env<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let origin = path.display().to_string();
        debug!(path = %origin, "loading configuration");

        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(origin.clone(), e))?;
        let mut config = Self::from_toml_str(&content, &origin)?;
        config.apply_env_overrides(lookup)?;

        Ok(config)
    }

    /// 解析 TOML 文本；`origin` 仅用于错误信息
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: WiringConfig =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(origin.to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 使用 `lookup` 读取环境变量覆盖配置
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            debug!(%level, "log level overridden from environment");
            self.logging.level = level;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let self_name = &self.injector.self_name;
        if self_name.is_empty() || self_name.contains('.') {
            return Err(ConfigError::InvalidValue(
                "injector.self_name".to_string(),
                format!("'{self_name}' must be non-empty and contain no '.'"),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    fn log_level(&self) -> Result<Level, ConfigError> {
        self.logging
            .level
            .parse::<Level>()
            .map_err(|e| ConfigError::InvalidValue("logging.level".to_string(), e.to_string()))
    }

    pub fn logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        Ok(LoggingConfig {
            level: self.log_level()?,
            format: self.logging.format,
            ..LoggingConfig::default()
        })
    }

    /// 把 `[values]` 转换为值提供者模块，每个值以 JSON 形式保存以支持属性路径
    pub fn values_module(&self) -> Result<Module, ConfigError> {
        let mut module = Module::named("config");
        for (name, value) in &self.values {
            module.value(name.as_str(), toml_to_json(name, value.clone())?);
        }
        Ok(module)
    }

    /// 按配置创建容器构建器，已包含 `[values]` 模块
    pub fn injector_builder(&self) -> Result<InjectorBuilder, ConfigError> {
        Ok(InjectorBuilder::new()
            .self_name(self.injector.self_name.as_str())
            .module(self.values_module()?))
    }
}

fn toml_to_json(path: &str, value: toml::Value) -> Result<JsonValue, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => JsonValue::String(s),
        toml::Value::Integer(i) => JsonValue::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                ConfigError::InvalidValue(path.to_string(), format!("{f} has no JSON representation"))
            })?,
        toml::Value::Boolean(b) => JsonValue::Bool(b),
        toml::Value::Datetime(datetime) => JsonValue::String(datetime.to_string()),
        toml::Value::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| toml_to_json(&format!("{path}.{index}"), item))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .into_iter()
                .map(|(key, item)| {
                    let nested = toml_to_json(&format!("{path}.{key}"), item)?;
                    Ok((key, nested))
                })
                .collect::<Result<_, ConfigError>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_for_empty_document() {
        let config = WiringConfig::from_toml_str("", "inline").unwrap();
        assert_eq!(config.injector.self_name, "injector");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.values.is_empty());
    }

    #[test]
    fn test_nested_values_convert_to_json() {
        let value: toml::Value = toml::from_str(
            "port = 8080\nratio = 0.5\nhosts = [\"a\", \"b\"]\n[tls]\nenabled = true\n",
        )
        .unwrap();
        let json = toml_to_json("config", value).unwrap();

        assert_eq!(
            json,
            json!({ "port": 8080, "ratio": 0.5, "hosts": ["a", "b"], "tls": { "enabled": true } })
        );
    }

    #[test]
    fn test_nan_is_rejected_with_path() {
        let value: toml::Value = toml::from_str("limit = nan").unwrap();
        let error = toml_to_json("quota", value).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref path, _) if path == "quota.limit"));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let error = WiringConfig::from_toml_str("[logging]\nlevel = \"loud\"", "inline").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key, _) if key == "logging.level"));

        let error =
            WiringConfig::from_toml_str("[injector]\nself_name = \"a.b\"", "inline").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(ref key, _) if key == "injector.self_name"));
    }

    #[test]
    fn test_env_override_replaces_level() {
        let mut config = WiringConfig::default();
        config
            .apply_env_overrides(|key| (key == LOG_LEVEL_ENV).then(|| "trace".to_string()))
            .unwrap();
        assert_eq!(config.logging_config().unwrap().level, Level::TRACE);

        assert!(config
            .apply_env_overrides(|_| Some("nope".to_string()))
            .is_err());
    }
}
