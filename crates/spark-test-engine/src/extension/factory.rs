use std::{borrow::Cow, collections::BTreeMap, fmt, sync::Arc};

use serde::Serialize;

use crate::{
    error::{ErrorCause, ExtensionInstantiationError, FactoryRegistrationError},
    spec::{Annotation, SpecRef},
};

use super::Extension;

/// 扩展工厂的稳定标识，注解通过它引用工厂。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FactoryId(Cow<'static, str>);

impl FactoryId {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// 以工厂的 Rust 类型名作为标识。
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_static(core::any::type_name::<T>())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 为特定 Spec 产出扩展的工厂。
///
/// 返回 `None` 表示该工厂对此 Spec 不提供扩展，调用方直接跳过。
pub trait ExtensionFactory: Send + Sync + 'static {
    fn extension(&self, spec: &SpecRef) -> Option<Arc<dyn Extension>>;
}

/// 读取 Spec 声明的扩展工厂列表。
pub trait MetadataResolver: Send + Sync {
    fn declared_factories(&self, spec: &SpecRef) -> Vec<FactoryId>;
}

/// 默认解析器：按声明顺序汇总所有 `ApplyExtension` 注解中的工厂。
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotationResolver;

impl MetadataResolver for AnnotationResolver {
    fn declared_factories(&self, spec: &SpecRef) -> Vec<FactoryId> {
        spec.metadata()
            .annotations()
            .iter()
            .filter_map(|annotation| match annotation {
                Annotation::ApplyExtension { factories } => Some(factories.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// 根据标识构造工厂实例。
pub trait FactoryInstantiator: Send + Sync {
    fn instantiate(
        &self,
        id: &FactoryId,
    ) -> Result<Arc<dyn ExtensionFactory>, ExtensionInstantiationError>;
}

type Constructor = Arc<dyn Fn() -> Result<Arc<dyn ExtensionFactory>, ErrorCause> + Send + Sync>;

#[derive(Clone)]
enum FactoryEntry {
    /// 每次实例化都调用构造函数，得到新实例。
    Constructor(Constructor),
    /// 每次实例化都返回同一个共享实例。
    Singleton(Arc<dyn ExtensionFactory>),
}

/// 显式登记的工厂表，是 [`FactoryInstantiator`] 的默认实现。
///
/// # 教案级注释
/// - **意图 (Why)**：注解只携带工厂标识，真正的构造方式必须事先登记；
///   登记表既支持“每次新建”的构造函数，也支持“全局唯一”的共享实例；
/// - **实现策略 (How)**：`BTreeMap<FactoryId, FactoryEntry>` 保证遍历顺序稳定；
///   注册发生在装配阶段，使用 `&mut self`，运行期只读；
/// - **契约 (What)**：标识重复时返回 [`FactoryRegistrationError::Duplicate`]；
///   查询不到的标识返回 [`ExtensionInstantiationError::UnknownFactory`]；
///   构造函数失败时返回 [`ExtensionInstantiationError::Construction`] 并保留根因。
#[derive(Default, Clone)]
pub struct FactoryRegistry {
    entries: BTreeMap<FactoryId, FactoryEntry>,
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.entries.keys().map(FactoryId::as_str).collect();
        f.debug_struct("FactoryRegistry").field("ids", &ids).finish()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记构造函数：每次实例化都会重新调用。
    pub fn register_constructor<F>(
        &mut self,
        id: FactoryId,
        constructor: F,
    ) -> Result<(), FactoryRegistrationError>
    where
        F: Fn() -> Result<Arc<dyn ExtensionFactory>, ErrorCause> + Send + Sync + 'static,
    {
        self.insert(id, FactoryEntry::Constructor(Arc::new(constructor)))
    }

    /// 登记共享实例。
    pub fn register_singleton(
        &mut self,
        id: FactoryId,
        factory: Arc<dyn ExtensionFactory>,
    ) -> Result<(), FactoryRegistrationError> {
        self.insert(id, FactoryEntry::Singleton(factory))
    }

    pub fn contains(&self, id: &FactoryId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &FactoryId> {
        self.entries.keys()
    }

    fn insert(&mut self, id: FactoryId, entry: FactoryEntry) -> Result<(), FactoryRegistrationError> {
        if self.entries.contains_key(&id) {
            return Err(FactoryRegistrationError::Duplicate { factory: id });
        }
        self.entries.insert(id, entry);
        Ok(())
    }
}

impl FactoryInstantiator for FactoryRegistry {
    fn instantiate(
        &self,
        id: &FactoryId,
    ) -> Result<Arc<dyn ExtensionFactory>, ExtensionInstantiationError> {
        match self.entries.get(id) {
            Some(FactoryEntry::Singleton(factory)) => Ok(Arc::clone(factory)),
            Some(FactoryEntry::Constructor(constructor)) => {
                constructor().map_err(|cause| ExtensionInstantiationError::Construction {
                    factory: id.clone(),
                    cause,
                })
            }
            None => Err(ExtensionInstantiationError::UnknownFactory { factory: id.clone() }),
        }
    }
}
