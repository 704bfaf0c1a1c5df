//! wiring: 基于名称的轻量依赖注入容器
//!
//! ```
//! use std::sync::Arc;
//! use wiring::{injectable, Injector, Module};
//!
//! let mut module = Module::new();
//! module
//!     .value("greeting", "hello".to_string())
//!     .factory(
//!         "message",
//!         injectable!(|greeting: Arc<String>| format!("{greeting}, world")),
//!     );
//!
//! let injector = Injector::new([module]).unwrap();
//! let message = injector.get_as::<String>("message").unwrap();
//! assert_eq!(message.as_str(), "hello, world");
//! ```

pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::WiringConfig;
pub use errors::{BoxError, ConfigError, InjectorError, InjectorResult};
pub use infrastructure::{
    infer_dependency_names, Arguments, Constructible, Construction, Constructor, Dependencies,
    Function, Injector, InjectorBuilder, InjectorStats, Instance, Module, ModuleSource,
    Properties, Provider, ProviderKind, ProviderMap, ProviderResult, DEFAULT_SELF_NAME,
};

/// 把带类型参数的闭包转换为 [`Function`]
///
/// 依赖名称从参数列表推断，参数按名称取出并转型为声明的类型；
/// 闭包体的结果包装为 [`Instance`]。参数必须写成 `name: Arc<Type>` 形式。
///
/// ```
/// use std::sync::Arc;
/// use wiring::injectable;
///
/// let function = injectable!(|host: Arc<String>, port: Arc<u16>| format!("{host}:{port}"));
/// assert_eq!(function.dependencies().names(), vec!["host", "port"]);
/// ```
#[macro_export]
macro_rules! injectable {
    (|| $body:expr) => {
        $crate::Function::from_signature("||", move |_: &$crate::Arguments| {
            Ok($crate::Instance::new($body))
        })
    };
    (|$($arg:ident : Arc<$inner:ty>),+ $(,)?| $body:expr) => {
        $crate::Function::from_signature(
            stringify!($($arg : Arc<$inner>),+),
            move |arguments: &$crate::Arguments| {
                $(let $arg = arguments.named::<$inner>(stringify!($arg))?;)+
                Ok($crate::Instance::new($body))
            },
        )
    };
}
