//! 依赖解析引擎
//!
//! 按名称懒加载、记忆化地解析依赖：
//! - 每个名称在同一容器内最多构造一次
//! - `a.b.c` 形式的名称先解析 `a`，再逐级读取属性（只缓存 `a`）
//! - 通过解析栈检测循环依赖；每一层解析在返回时（无论成败）只移除自己压入的条目，
//!   因此错误传到最外层时解析栈为空
//!
//! 容器可以廉价克隆并在线程间共享。解析过程由可重入锁串行化：
//! 同一线程内的递归解析直接进入，其他线程等待当前解析完成后再读取缓存。
//! 提供者内部不应等待另一个线程通过同一容器解析依赖。

use super::DEFAULT_SELF_NAME;
use crate::errors::{InjectorError, InjectorResult};
use crate::infrastructure::instance::Instance;
use crate::infrastructure::module::{ModuleSource, ProviderMap};
use crate::infrastructure::provider::{
    Arguments, Constructor, Dependencies, Function, Provider, ProviderKind,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 依赖注入容器
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

struct InjectorInner {
    /// 指向容器自身的保留名称
    self_name: String,
    /// 合并后的提供者表
    providers: HashMap<String, Provider>,
    /// 提供者名称，按首次注册顺序排列
    order: Vec<String>,
    /// 实例缓存
    instances: Mutex<HashMap<String, Instance>>,
    /// 循环依赖检测栈；持锁线程独占
    resolution: ReentrantMutex<RefCell<Vec<String>>>,
    stats: InnerStats,
}

/// 内部统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    instances_created: AtomicUsize,
}

/// 容器统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectorStats {
    /// 总解析次数（不含属性路径的逐级读取）
    pub resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// 成功构造并缓存的实例数量
    pub instances_created: usize,
}

impl InjectorStats {
    /// 缓存命中率（小数形式）
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// 容器构建器
#[derive(Debug, Default)]
pub struct InjectorBuilder {
    sources: Vec<ModuleSource>,
    self_name: Option<String>,
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个来源；后追加的来源覆盖先前的同名提供者
    pub fn module(mut self, source: impl Into<ModuleSource>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// 设置指向容器自身的保留名称（默认 `injector`）
    pub fn self_name(mut self, name: impl Into<String>) -> Self {
        self.self_name = Some(name.into());
        self
    }

    pub fn build(self) -> InjectorResult<Injector> {
        let self_name = self
            .self_name
            .unwrap_or_else(|| DEFAULT_SELF_NAME.to_string());
        let mut providers = HashMap::new();
        let mut order = Vec::new();

        for source in self.sources {
            match source {
                ModuleSource::Module(module) => {
                    debug!(module = module.label().unwrap_or("unnamed"), providers = module.len(), "merging module");
                    for (name, provider) in module.into_providers() {
                        merge(&mut providers, &mut order, name, provider);
                    }
                }
                ModuleSource::Map(map) => {
                    debug!(providers = map.len(), "merging provider map");
                    for (name, provider) in raw_providers(map)? {
                        merge(&mut providers, &mut order, name, provider);
                    }
                }
            }
        }

        if providers.contains_key(&self_name) {
            warn!(name = %self_name, "provider is shadowed by the injector's reserved name");
        }

        Ok(Injector {
            inner: Arc::new(InjectorInner {
                self_name,
                providers,
                order,
                instances: Mutex::new(HashMap::new()),
                resolution: ReentrantMutex::new(RefCell::new(Vec::new())),
                stats: InnerStats::default(),
            }),
        })
    }
}

fn merge(
    providers: &mut HashMap<String, Provider>,
    order: &mut Vec<String>,
    name: String,
    provider: Provider,
) {
    match providers.insert(name.clone(), provider) {
        Some(previous) => debug!(%name, previous = %previous.kind(), "provider overridden"),
        None => order.push(name),
    }
}

/// 校验原始映射；按名称排序以保证合并顺序确定
fn raw_providers(map: ProviderMap) -> InjectorResult<Vec<(String, Provider)>> {
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
        .into_iter()
        .map(|(name, (kind, definition))| {
            let provider = Provider::from_raw(&name, &kind, definition)?;
            Ok((name, provider))
        })
        .collect()
}

impl Injector {
    /// 按顺序合并多个来源创建容器
    pub fn new<I, S>(sources: I) -> InjectorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ModuleSource>,
    {
        sources
            .into_iter()
            .fold(InjectorBuilder::new(), |builder, source| builder.module(source))
            .build()
    }

    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    /// 解析名称对应的实例
    ///
    /// 包含 `.` 的名称按属性路径解析：只有第一段会被缓存。
    pub fn get(&self, name: &str) -> InjectorResult<Instance> {
        let Some((head, path)) = name.split_once('.') else {
            return self.resolve(name);
        };

        let mut pivot = self.resolve(head)?;
        let mut walked = head.len();
        for property in path.split('.') {
            trace!(path = name, property, "reading property");
            pivot = match pivot.property(property) {
                Some(next) => next,
                None => {
                    return Err(InjectorError::MissingProperty {
                        path: name[..walked].to_string(),
                        property: property.to_string(),
                    })
                }
            };
            walked += property.len() + 1;
        }

        Ok(pivot)
    }

    /// 解析并转型
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> InjectorResult<Arc<T>> {
        let instance = self.get(name)?;
        instance.downcast::<T>().ok_or_else(|| InjectorError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            found: instance.type_name(),
        })
    }

    /// 解析函数的依赖并以 `context` 为接收者调用
    pub fn invoke(&self, function: &Function, context: Option<&Instance>) -> InjectorResult<Instance> {
        self.invoke_as(function.label(), function, context)
    }

    /// 解析构造器的依赖并构造实例
    ///
    /// 构造器给出替代值时返回替代值，否则返回新构造的值。
    pub fn instantiate(&self, constructor: &Constructor) -> InjectorResult<Instance> {
        self.instantiate_as(constructor.type_name(), constructor)
    }

    /// 调用一个动态持有的目标：[`Function`] 被调用，[`Constructor`] 被实例化，
    /// 其余值返回 `InvalidTarget`。
    pub fn call(&self, target: &Instance, context: Option<&Instance>) -> InjectorResult<Instance> {
        if let Some(function) = target.downcast_ref::<Function>() {
            return self.invoke(function, context);
        }
        if let Some(constructor) = target.downcast_ref::<Constructor>() {
            return self.instantiate(constructor);
        }
        Err(InjectorError::InvalidTarget {
            target: target.type_name().to_string(),
            reason: "value is neither a Function nor a Constructor".to_string(),
        })
    }

    /// 是否存在名为 `name` 的提供者（保留名称总是存在）
    pub fn has(&self, name: &str) -> bool {
        name == self.inner.self_name || self.inner.providers.contains_key(name)
    }

    /// 名称是否已被解析并缓存
    pub fn is_resolved(&self, name: &str) -> bool {
        self.inner.instances.lock().contains_key(name)
    }

    pub fn provider_kind(&self, name: &str) -> Option<ProviderKind> {
        self.inner.providers.get(name).map(Provider::kind)
    }

    /// 提供者名称，按首次注册顺序排列
    pub fn provider_names(&self) -> Vec<&str> {
        self.inner.order.iter().map(String::as_str).collect()
    }

    pub fn self_name(&self) -> &str {
        &self.inner.self_name
    }

    pub fn stats(&self) -> InjectorStats {
        let stats = &self.inner.stats;
        InjectorStats {
            resolutions: stats.resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
            instances_created: stats.instances_created.load(Ordering::Relaxed),
        }
    }

    /// 两个句柄是否指向同一个容器
    pub fn ptr_eq(&self, other: &Injector) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn resolve(&self, name: &str) -> InjectorResult<Instance> {
        let stats = &self.inner.stats;
        stats.resolutions.fetch_add(1, Ordering::Relaxed);

        if name == self.inner.self_name {
            return Ok(Instance::new(self.clone()));
        }

        if let Some(instance) = self.cached(name) {
            return Ok(instance);
        }

        let resolution = self.inner.resolution.lock();
        // 等锁期间其他线程可能已完成构造
        if let Some(instance) = self.cached(name) {
            return Ok(instance);
        }
        stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let provider = {
            let stack = resolution.borrow();
            if stack.iter().any(|pending| pending == name) {
                let trail = trail_with(&stack, name);
                warn!(trail = %trail.join(" -> "), "circular dependency detected");
                return Err(InjectorError::CircularDependency { trail });
            }
            match self.inner.providers.get(name) {
                Some(provider) => provider,
                None => {
                    let trail = trail_with(&stack, name);
                    warn!(name, trail = %trail.join(" -> "), "no provider registered");
                    return Err(InjectorError::NoProvider {
                        name: name.to_string(),
                        trail,
                    });
                }
            }
        };
        let _frame = StackFrame::push(&resolution, name);

        debug!(name, kind = %provider.kind(), "resolving");
        let instance = match provider {
            Provider::Factory(function) => self.invoke_as(name, function, None)?,
            Provider::Type(constructor) => self.instantiate_as(name, constructor)?,
            Provider::Value(value) => value.clone(),
        };

        self.inner
            .instances
            .lock()
            .insert(name.to_string(), instance.clone());
        stats.instances_created.fetch_add(1, Ordering::Relaxed);

        Ok(instance)
    }

    fn cached(&self, name: &str) -> Option<Instance> {
        let instance = self.inner.instances.lock().get(name).cloned()?;
        self.inner.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        trace!(name, "cache hit");
        Some(instance)
    }

    fn invoke_as(
        &self,
        target: &str,
        function: &Function,
        context: Option<&Instance>,
    ) -> InjectorResult<Instance> {
        let arguments = self.resolve_arguments(function.dependencies())?;
        function
            .call(context, &arguments)
            .map_err(|error| InjectorError::from_provider(target, error))
    }

    fn instantiate_as(&self, target: &str, constructor: &Constructor) -> InjectorResult<Instance> {
        let arguments = self.resolve_arguments(constructor.dependencies())?;
        let construction = constructor
            .construct(&arguments)
            .map_err(|error| InjectorError::from_provider(target, error))?;

        if construction.is_replaced() {
            debug!(target, "constructor returned a replacement instance");
        }
        Ok(construction.into_instance())
    }

    fn resolve_arguments(&self, dependencies: &Dependencies) -> InjectorResult<Arguments> {
        let names = dependencies.names();
        let values = names
            .iter()
            .map(|name| self.get(name))
            .collect::<InjectorResult<Vec<_>>>()?;
        Ok(Arguments::new(names.to_vec(), values))
    }
}

fn trail_with(stack: &[String], name: &str) -> Vec<String> {
    let mut trail = stack.to_vec();
    trail.push(name.to_string());
    trail
}

/// 解析栈中的一层；离开作用域时把栈截断回压入前的深度
struct StackFrame<'a> {
    stack: &'a RefCell<Vec<String>>,
    depth: usize,
}

impl<'a> StackFrame<'a> {
    fn push(stack: &'a RefCell<Vec<String>>, name: &str) -> Self {
        let mut entries = stack.borrow_mut();
        let depth = entries.len();
        entries.push(name.to_string());
        Self { stack, depth }
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().truncate(self.depth);
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("self_name", &self.inner.self_name)
            .field("providers", &self.inner.order)
            .field("resolved", &self.inner.instances.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::module::Module;
    use std::sync::atomic::AtomicUsize;

    fn counting_factory(counter: Arc<AtomicUsize>, value: u32) -> Function {
        Function::without_dependencies(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(value))
        })
    }

    #[test]
    fn test_factory_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut module = Module::new();
        module.factory("answer", counting_factory(counter.clone(), 42));
        let injector = Injector::new([module]).unwrap();

        let first = injector.get("answer").unwrap();
        let second = injector.get("answer").unwrap();

        assert!(Instance::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(injector.is_resolved("answer"));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let mut module = Module::new();
        module.value("a", 1u8);
        let injector = Injector::new([module]).unwrap();

        for _ in 0..4 {
            injector.get("a").unwrap();
        }

        let stats = injector.stats();
        assert_eq!(stats.resolutions, 4);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 3);
        assert_eq!(stats.instances_created, 1);
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_factory_is_not_cached_and_stack_is_cleared() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let mut module = Module::new();
        module.factory(
            "flaky",
            Function::without_dependencies(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("first call fails".into())
                } else {
                    Ok(Instance::new("ok"))
                }
            }),
        );
        let injector = Injector::new([module]).unwrap();

        let error = injector.get("flaky").unwrap_err();
        assert!(matches!(error, InjectorError::ProviderFailed { ref name, .. } if name == "flaky"));
        assert!(!injector.is_resolved("flaky"));
        assert!(injector.inner.resolution.lock().borrow().is_empty());

        assert_eq!(*injector.get_as::<&str>("flaky").unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_recovered_nested_failure_keeps_outer_frames() {
        let mut module = Module::new();
        module.factory(
            "outer",
            Function::new(["injector"], |arguments| {
                let injector = arguments.get::<Injector>(0)?;
                assert!(injector.get("missing").is_err());
                let stack = injector.inner.resolution.lock().borrow().clone();
                Ok(Instance::new(stack))
            }),
        );
        let injector = Injector::new([module]).unwrap();

        let stack = injector.get_as::<Vec<String>>("outer").unwrap();
        assert_eq!(*stack, vec!["outer".to_string()]);
        assert!(injector.inner.resolution.lock().borrow().is_empty());
    }

    #[test]
    fn test_reserved_name_shadows_provider() {
        let mut module = Module::new();
        module.value("injector", 1u8);
        let injector = Injector::new([module]).unwrap();

        let resolved = injector.get_as::<Injector>("injector").unwrap();
        assert!(resolved.ptr_eq(&injector));
        assert!(!injector.is_resolved("injector"));
    }
}
