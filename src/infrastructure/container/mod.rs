//! 容器模块

pub mod injector;

pub use injector::{Injector, InjectorBuilder, InjectorStats};

/// 默认的容器自引用名称
pub const DEFAULT_SELF_NAME: &str = "injector";
