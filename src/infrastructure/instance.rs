//! 已解析实例
//!
//! 容器中的所有值都以类型擦除的 [`Instance`] 保存：
//! - 通过 `Arc` 共享，复制实例不会复制底层值
//! - 可按类型向下转型
//! - 可选的属性访问，用于 `config.port` 形式的路径解析

use serde_json::Value as JsonValue;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 属性访问
///
/// 实现该 trait 的值可以作为属性路径的中间节点。
/// `serde_json::Value` 与 `HashMap<String, Instance>` 已内置实现。
pub trait Properties: Send + Sync {
    /// 读取名为 `key` 的属性，不存在时返回 `None`
    fn property(&self, key: &str) -> Option<Instance>;
}

/// 类型擦除的已解析值
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    properties: Option<Arc<dyn Properties>>,
    type_name: &'static str,
}

impl Instance {
    /// 包装任意值。
    ///
    /// 传入的值本身是 `Instance` 时原样返回；`serde_json::Value` 会自动获得属性访问能力。
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        let boxed = match boxed.downcast::<Instance>() {
            Ok(instance) => return *instance,
            Err(other) => other,
        };
        match boxed.downcast::<JsonValue>() {
            Ok(json) => Self::with_properties(*json),
            Err(other) => Self {
                value: Arc::from(other),
                properties: None,
                type_name: type_name::<T>(),
            },
        }
    }

    /// 包装一个已共享的值，不做任何转换
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            properties: None,
            type_name: type_name::<T>(),
        }
    }

    /// 包装一个支持属性访问的值
    pub fn with_properties<T: Properties + Any>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            value: value.clone(),
            properties: Some(value),
            type_name: type_name::<T>(),
        }
    }

    /// 底层值的类型名称（用于错误信息）
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// 以共享指针形式取出底层值
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        self.downcast_ref::<JsonValue>()
    }

    /// 读取属性；底层值不支持属性访问时返回 `None`
    pub fn property(&self, key: &str) -> Option<Instance> {
        self.properties.as_ref()?.property(key)
    }

    /// 两个实例是否指向同一个底层值
    pub fn ptr_eq(a: &Instance, b: &Instance) -> bool {
        Arc::as_ptr(&a.value) as *const () == Arc::as_ptr(&b.value) as *const ()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Instance");
        debug.field("type", &self.type_name);
        if let Some(json) = self.as_json() {
            debug.field("value", json);
        }
        debug.finish()
    }
}

impl From<JsonValue> for Instance {
    fn from(value: JsonValue) -> Self {
        Self::with_properties(value)
    }
}

impl Properties for JsonValue {
    fn property(&self, key: &str) -> Option<Instance> {
        let found = match self {
            JsonValue::Object(map) => map.get(key),
            JsonValue::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        }?;
        Some(Instance::with_properties(found.clone()))
    }
}

impl Properties for HashMap<String, Instance> {
    fn property(&self, key: &str) -> Option<Instance> {
        self.get(key).cloned()
    }
}
