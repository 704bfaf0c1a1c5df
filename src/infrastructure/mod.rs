//! 基础设施层
//!
//! 提供依赖注入的全部构件：
//! - 实例与属性访问
//! - 提供者与模块
//! - 依赖名称推断
//! - 依赖注入容器

pub mod annotation;
pub mod container;
pub mod instance;
pub mod module;
pub mod provider;

// 重新导出API
pub use annotation::infer_dependency_names;
pub use container::{Injector, InjectorBuilder, InjectorStats, DEFAULT_SELF_NAME};
pub use instance::{Instance, Properties};
pub use module::{Module, ModuleSource, ProviderMap};
pub use provider::{
    Arguments, Constructible, Construction, Constructor, Dependencies, Function, Provider,
    ProviderKind, ProviderResult,
};
