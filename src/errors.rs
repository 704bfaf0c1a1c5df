use thiserror::Error;

/// 容器操作的结果类型
pub type InjectorResult<T> = Result<T, InjectorError>;

/// 提供者函数体返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("No provider for '{name}'{}", render_trail(.trail))]
    NoProvider { name: String, trail: Vec<String> },

    #[error("Circular dependency detected: {}", .trail.join(" -> "))]
    CircularDependency { trail: Vec<String> },

    #[error("Cannot invoke '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Provider '{name}' failed: {source}")]
    ProviderFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("'{name}' resolved to {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Argument #{index} is out of range, only {declared} dependencies were declared")]
    MissingArgument { index: usize, declared: usize },

    #[error("Cannot read property '{property}' of '{path}'")]
    MissingProperty { path: String, property: String },

    #[error("Invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),
}

impl InjectorError {
    /// 解析链（若有）
    pub fn trail(&self) -> &[String] {
        match self {
            InjectorError::NoProvider { trail, .. } | InjectorError::CircularDependency { trail } => {
                trail
            }
            _ => &[],
        }
    }

    /// 把提供者函数体返回的错误还原为容器错误。
    ///
    /// 函数体内部通过 `?` 传出的 `InjectorError` 原样返回，其余错误包装为
    /// `ProviderFailed`。
    pub(crate) fn from_provider(name: &str, error: BoxError) -> Self {
        match error.downcast::<InjectorError>() {
            Ok(inner) => *inner,
            Err(source) => InjectorError::ProviderFailed {
                name: name.to_string(),
                source,
            },
        }
    }
}

/// 只有一个名称的解析链不附加到错误信息中
fn render_trail(trail: &[String]) -> String {
    if trail.len() < 2 {
        String::new()
    } else {
        format!(" (resolving {})", trail.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message() {
        let error = InjectorError::CircularDependency {
            trail: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "Circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_no_provider_message_with_and_without_trail() {
        let bare = InjectorError::NoProvider {
            name: "ghost".into(),
            trail: Vec::new(),
        };
        assert_eq!(bare.to_string(), "No provider for 'ghost'");

        let nested = InjectorError::NoProvider {
            name: "ghost".into(),
            trail: vec!["service".into(), "ghost".into()],
        };
        assert_eq!(
            nested.to_string(),
            "No provider for 'ghost' (resolving service -> ghost)"
        );
        assert_eq!(nested.trail().len(), 2);
    }

    #[test]
    fn test_from_provider_unwraps_injector_errors() {
        let boxed: BoxError = Box::new(InjectorError::NoProvider {
            name: "db".into(),
            trail: vec!["db".into()],
        });
        let error = InjectorError::from_provider("repo", boxed);
        assert!(matches!(error, InjectorError::NoProvider { ref name, .. } if name == "db"));

        let io: BoxError = Box::new(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        let error = InjectorError::from_provider("repo", io);
        assert!(matches!(error, InjectorError::ProviderFailed { ref name, .. } if name == "repo"));
        assert_eq!(error.to_string(), "Provider 'repo' failed: disk");
    }
}
