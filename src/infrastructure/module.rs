//! 模块抽象层
//!
//! 模块是提供者声明的有序集合，在容器创建之前完成填充。
//! 声明时不做任何校验：重名、缺失依赖等问题都在解析时由容器报告。

use super::instance::Instance;
use super::provider::{Constructible, Constructor, Function, Provider, ProviderKind};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// 原始提供者映射：`名称 -> (种类, 定义)`
///
/// 种类以文本给出（`factory` / `type` / `value`），在创建容器时校验。
pub type ProviderMap = HashMap<String, (String, Instance)>;

/// 提供者模块
#[derive(Clone, Default)]
pub struct Module {
    label: Option<String>,
    providers: Vec<(String, Provider)>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带名称的模块，名称仅用于日志
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            providers: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// 注册工厂函数
    pub fn factory(&mut self, name: impl Into<String>, function: Function) -> &mut Self {
        self.provide(name, Provider::Factory(function))
    }

    /// 注册普通值，解析时原样返回
    pub fn value<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) -> &mut Self {
        self.provide(name, Provider::Value(Instance::new(value)))
    }

    /// 注册构造器
    pub fn constructor(&mut self, name: impl Into<String>, constructor: Constructor) -> &mut Self {
        self.provide(name, Provider::Type(constructor))
    }

    /// 注册可构造类型，等价于 `constructor(name, Constructor::of::<T>())`
    pub fn constructible<T: Constructible>(&mut self, name: impl Into<String>) -> &mut Self {
        self.constructor(name, Constructor::of::<T>())
    }

    pub fn provide(&mut self, name: impl Into<String>, provider: impl Into<Provider>) -> &mut Self {
        self.providers.push((name.into(), provider.into()));
        self
    }

    /// 按注册顺序遍历 `(名称, 种类, 提供者)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, ProviderKind, &Provider)> {
        self.providers
            .iter()
            .map(|(name, provider)| (name.as_str(), provider.kind(), provider))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub(crate) fn into_providers(self) -> impl Iterator<Item = (String, Provider)> {
        self.providers.into_iter()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("label", &self.label)
            .field("providers", &self.names())
            .finish()
    }
}

/// 容器的输入来源：模块或原始映射
#[derive(Debug, Clone)]
pub enum ModuleSource {
    Module(Module),
    Map(ProviderMap),
}

impl From<Module> for ModuleSource {
    fn from(module: Module) -> Self {
        ModuleSource::Module(module)
    }
}

impl From<&mut Module> for ModuleSource {
    fn from(module: &mut Module) -> Self {
        ModuleSource::Module(std::mem::take(module))
    }
}

impl From<ProviderMap> for ModuleSource {
    fn from(map: ProviderMap) -> Self {
        ModuleSource::Map(map)
    }
}
