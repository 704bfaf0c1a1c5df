//! 服务提供者实现
//!
//! 三种提供者对应三种构造策略：
//! - [`Function`]：工厂函数，调用结果即为实例
//! - [`Constructor`]：构造器，构造出新值或返回替代值
//! - 普通值：注册即实例，从不调用

use super::annotation::infer_dependency_names;
use super::instance::Instance;
use crate::errors::{BoxError, InjectorError, InjectorResult};
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// 提供者函数体的返回类型
pub type ProviderResult<T> = Result<T, BoxError>;

type FunctionBody = dyn Fn(Option<&Instance>, &Arguments) -> ProviderResult<Instance> + Send + Sync;
type ConstructorBody = dyn Fn(&Arguments) -> ProviderResult<Construction> + Send + Sync;

/// 提供者种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Factory,
    Type,
    Value,
}

impl ProviderKind {
    /// 从文本解析种类（`factory` / `type` / `value`）
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "factory" => Some(ProviderKind::Factory),
            "type" => Some(ProviderKind::Type),
            "value" => Some(ProviderKind::Value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Factory => "factory",
            ProviderKind::Type => "type",
            ProviderKind::Value => "value",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 依赖声明
///
/// 显式声明优先；否则从参数列表文本推断；两者都没有时视为无依赖。
/// 推断在创建时完成一次。
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    names: Vec<String>,
    annotated: bool,
    signature: Option<Cow<'static, str>>,
}

impl Dependencies {
    pub fn declared<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            annotated: true,
            signature: None,
        }
    }

    pub fn inferred(signature: impl Into<Cow<'static, str>>) -> Self {
        let signature = signature.into();
        Self {
            names: infer_dependency_names(&signature),
            annotated: false,
            signature: Some(signature),
        }
    }

    /// 是否带有显式声明
    pub fn is_annotated(&self) -> bool {
        self.annotated
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// 按声明顺序返回依赖名称
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// 已解析的调用参数，顺序与依赖声明一致
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    names: Vec<String>,
    values: Vec<Instance>,
}

impl Arguments {
    pub(crate) fn new(names: Vec<String>, values: Vec<Instance>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    /// 按位置取出参数并转型
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> InjectorResult<Arc<T>> {
        let instance = self.values.get(index).ok_or(InjectorError::MissingArgument {
            index,
            declared: self.values.len(),
        })?;
        instance.downcast::<T>().ok_or_else(|| InjectorError::TypeMismatch {
            name: self.names[index].clone(),
            expected: type_name::<T>(),
            found: instance.type_name(),
        })
    }

    /// 按依赖名称取出参数并转型
    pub fn named<T: Any + Send + Sync>(&self, name: &str) -> InjectorResult<Arc<T>> {
        match self.names.iter().position(|candidate| candidate == name) {
            Some(index) => self.get(index),
            None => Err(InjectorError::InvalidTarget {
                target: name.to_string(),
                reason: format!("not among the declared dependencies {:?}", self.names),
            }),
        }
    }
}

/// 工厂函数
///
/// 以 `(接收者, 参数)` 调用；大多数工厂不关心接收者，使用 [`Function::new`] 即可。
#[derive(Clone)]
pub struct Function {
    label: Cow<'static, str>,
    dependencies: Dependencies,
    body: Arc<FunctionBody>,
}

impl Function {
    /// 以显式依赖列表创建工厂函数
    pub fn new<I, S, F>(dependencies: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Arguments) -> ProviderResult<Instance> + Send + Sync + 'static,
    {
        Self::with_receiver(dependencies, move |_, arguments| body(arguments))
    }

    /// 创建无依赖的工厂函数
    pub fn without_dependencies<F>(body: F) -> Self
    where
        F: Fn(&Arguments) -> ProviderResult<Instance> + Send + Sync + 'static,
    {
        Self::new(Vec::<String>::new(), body)
    }

    /// 创建接收调用上下文的工厂函数
    pub fn with_receiver<I, S, F>(dependencies: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Option<&Instance>, &Arguments) -> ProviderResult<Instance> + Send + Sync + 'static,
    {
        Self {
            label: Cow::Borrowed("anonymous"),
            dependencies: Dependencies::declared(dependencies),
            body: Arc::new(body),
        }
    }

    /// 创建依赖名称由参数列表文本推断的工厂函数
    pub fn from_signature<F>(signature: impl Into<Cow<'static, str>>, body: F) -> Self
    where
        F: Fn(&Arguments) -> ProviderResult<Instance> + Send + Sync + 'static,
    {
        Self {
            label: Cow::Borrowed("anonymous"),
            dependencies: Dependencies::inferred(signature),
            body: Arc::new(move |_: Option<&Instance>, arguments: &Arguments| body(arguments)),
        }
    }

    /// 用显式依赖列表覆盖推断结果
    pub fn annotate<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let signature = self.dependencies.signature.take();
        self.dependencies = Dependencies {
            signature,
            ..Dependencies::declared(dependencies)
        };
        self
    }

    /// 设置用于日志与错误信息的名称
    pub fn labelled(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub(crate) fn call(
        &self,
        context: Option<&Instance>,
        arguments: &Arguments,
    ) -> ProviderResult<Instance> {
        (self.body)(context, arguments)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("label", &self.label)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// 构造结果：新构造的值，或构造器主动给出的替代值
#[derive(Debug, Clone)]
pub enum Construction<T = Instance> {
    Built(T),
    Replaced(Instance),
}

impl<T> Construction<T> {
    pub fn is_replaced(&self) -> bool {
        matches!(self, Construction::Replaced(_))
    }
}

impl Construction {
    pub fn into_instance(self) -> Instance {
        match self {
            Construction::Built(instance) | Construction::Replaced(instance) => instance,
        }
    }
}

impl<T> From<T> for Construction<T> {
    fn from(value: T) -> Self {
        Construction::Built(value)
    }
}

/// 可由容器构造的类型
///
/// ```
/// use std::sync::Arc;
/// use wiring::{Arguments, Constructible, Construction, ProviderResult};
///
/// struct Greeter {
///     greeting: Arc<String>,
/// }
///
/// impl Constructible for Greeter {
///     fn dependencies() -> Vec<&'static str> {
///         vec!["greeting"]
///     }
///
///     fn construct(arguments: &Arguments) -> ProviderResult<Construction<Self>> {
///         Ok(Greeter { greeting: arguments.get::<String>(0)? }.into())
///     }
/// }
/// ```
pub trait Constructible: Any + Send + Sync + Sized {
    /// 构造参数对应的依赖名称，按参数顺序排列
    fn dependencies() -> Vec<&'static str>;

    fn construct(arguments: &Arguments) -> ProviderResult<Construction<Self>>;
}

/// 构造器
#[derive(Clone)]
pub struct Constructor {
    type_name: Cow<'static, str>,
    dependencies: Dependencies,
    body: Arc<ConstructorBody>,
}

impl Constructor {
    /// 为实现了 [`Constructible`] 的类型创建构造器
    pub fn of<T: Constructible>() -> Self {
        Self {
            type_name: Cow::Borrowed(type_name::<T>()),
            dependencies: Dependencies::declared(T::dependencies()),
            body: Arc::new(|arguments: &Arguments| {
                Ok(match T::construct(arguments)? {
                    Construction::Built(value) => Construction::Built(Instance::new(value)),
                    Construction::Replaced(instance) => Construction::Replaced(instance),
                })
            }),
        }
    }

    /// 以闭包创建构造器
    pub fn new<I, S, F>(type_name: impl Into<Cow<'static, str>>, dependencies: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Arguments) -> ProviderResult<Construction> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            dependencies: Dependencies::declared(dependencies),
            body: Arc::new(body),
        }
    }

    /// 创建依赖名称由参数列表文本推断的构造器
    pub fn from_signature<F>(
        type_name: impl Into<Cow<'static, str>>,
        signature: impl Into<Cow<'static, str>>,
        body: F,
    ) -> Self
    where
        F: Fn(&Arguments) -> ProviderResult<Construction> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            dependencies: Dependencies::inferred(signature),
            body: Arc::new(body),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub(crate) fn construct(&self, arguments: &Arguments) -> ProviderResult<Construction> {
        (self.body)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// 提供者定义
#[derive(Debug, Clone)]
pub enum Provider {
    Factory(Function),
    Type(Constructor),
    Value(Instance),
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Factory(_) => ProviderKind::Factory,
            Provider::Type(_) => ProviderKind::Type,
            Provider::Value(_) => ProviderKind::Value,
        }
    }

    /// 从 `(种类, 定义)` 原始映射项构建提供者
    ///
    /// 未知种类，或定义与种类不符（例如 `factory` 的定义不是 [`Function`]）时返回
    /// `InvalidProvider`。
    pub fn from_raw(name: &str, kind: &str, definition: Instance) -> InjectorResult<Self> {
        let invalid = |reason: String| InjectorError::InvalidProvider {
            name: name.to_string(),
            reason,
        };

        match ProviderKind::parse(kind) {
            Some(ProviderKind::Factory) => definition
                .downcast_ref::<Function>()
                .cloned()
                .map(Provider::Factory)
                .ok_or_else(|| invalid(format!("expected a Function, found {}", definition.type_name()))),
            Some(ProviderKind::Type) => definition
                .downcast_ref::<Constructor>()
                .cloned()
                .map(Provider::Type)
                .ok_or_else(|| {
                    invalid(format!("expected a Constructor, found {}", definition.type_name()))
                }),
            Some(ProviderKind::Value) => Ok(Provider::Value(definition)),
            None => Err(invalid(format!("unknown provider kind '{kind}'"))),
        }
    }
}

impl From<Function> for Provider {
    fn from(function: Function) -> Self {
        Provider::Factory(function)
    }
}

impl From<Constructor> for Provider {
    fn from(constructor: Constructor) -> Self {
        Provider::Type(constructor)
    }
}

impl From<Instance> for Provider {
    fn from(value: Instance) -> Self {
        Provider::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Port(u16);

    #[test]
    fn test_kind_round_trip_through_text() {
        for kind in [ProviderKind::Factory, ProviderKind::Type, ProviderKind::Value] {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::parse("require"), None);
    }

    #[test]
    fn test_declared_dependencies_win_over_signature() {
        let function = Function::from_signature("|a, b|", |_| Ok(Instance::new(())));
        assert!(!function.dependencies().is_annotated());
        assert_eq!(function.dependencies().names(), vec!["a", "b"]);

        let function = function.annotate(["c"]);
        assert!(function.dependencies().is_annotated());
        assert_eq!(function.dependencies().names(), vec!["c"]);
        assert_eq!(function.dependencies().signature(), Some("|a, b|"));
    }

    #[test]
    fn test_inferred_names_are_computed_once() {
        let dependencies = Dependencies::inferred("fn build(db: Db, cache: Cache)");
        let first = dependencies.names();
        let second = dependencies.names();

        assert_eq!(first, ["db", "cache"]);
        assert!(std::ptr::eq(first.as_ptr(), second.as_ptr()));
    }

    #[test]
    fn test_arguments_typed_access() {
        let arguments = Arguments::new(
            vec!["port".into(), "name".into()],
            vec![Instance::new(Port(80)), Instance::new("api".to_string())],
        );

        assert_eq!(arguments.get::<Port>(0).unwrap().0, 80);
        assert_eq!(arguments.named::<String>("name").unwrap().as_str(), "api");
        assert!(matches!(
            arguments.get::<String>(0),
            Err(InjectorError::TypeMismatch { ref name, .. }) if name == "port"
        ));
        assert!(matches!(
            arguments.get::<Port>(5),
            Err(InjectorError::MissingArgument { index: 5, declared: 2 })
        ));
        assert!(arguments.named::<Port>("missing").is_err());
    }

    #[test]
    fn test_from_raw_validates_definitions() {
        let factory = Instance::new(Function::without_dependencies(|_| Ok(Instance::new(1u8))));
        assert_eq!(
            Provider::from_raw("a", "factory", factory).unwrap().kind(),
            ProviderKind::Factory
        );

        let not_callable = Instance::new(Port(1));
        assert!(matches!(
            Provider::from_raw("b", "type", not_callable.clone()),
            Err(InjectorError::InvalidProvider { .. })
        ));
        assert!(matches!(
            Provider::from_raw("c", "singleton", not_callable.clone()),
            Err(InjectorError::InvalidProvider { ref reason, .. }) if reason.contains("singleton")
        ));
        assert_eq!(
            Provider::from_raw("d", "value", not_callable).unwrap().kind(),
            ProviderKind::Value
        );
    }

    #[test]
    fn test_construction_outcomes() {
        let built: Construction<Port> = Port(1).into();
        assert!(!built.is_replaced());

        let replacement = Instance::new(Port(2));
        let replaced: Construction = Construction::Replaced(replacement.clone());
        assert!(replaced.is_replaced());
        assert!(Instance::ptr_eq(&replaced.into_instance(), &replacement));
    }
}
