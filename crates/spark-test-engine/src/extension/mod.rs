//! # extension 模块说明
//!
//! ## 角色定位（Why）
//! - 扩展是可在配置中注册、注销的行为对象；彼此互不感知，由拦截器在合适的时机调用；
//! - 一个扩展可以同时具备多种能力（监听、过滤、提供拦截器），能力通过 `as_*` 访问器暴露，
//!   调用方无需向下转型。
//!
//! ## 契约（What）
//! - 扩展的身份按实例判定：同一个 `Arc` 不可重复注册，内容相同的两个实例则互不冲突；
//! - [`ExtensionScope::Spec`] 限定扩展只对某个 Spec 类型生效，见 [`SpecScopedExtension`]。

mod factory;
mod filter;
mod listener;
mod scoped;

use std::{borrow::Cow, fmt};

use serde::Serialize;

use crate::{interceptor::InterceptorFactory, spec::SpecTypeId};

pub use factory::{
    AnnotationResolver, ExtensionFactory, FactoryId, FactoryInstantiator, FactoryRegistry,
    MetadataResolver,
};
pub use filter::{FilterDecision, SpecFilter, TagFilter};
pub use listener::SpecListener;
pub use scoped::SpecScopedExtension;

/// 扩展的静态描述信息，用于日志与配置转储。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExtensionDescriptor {
    name: Cow<'static, str>,
    summary: Cow<'static, str>,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>, summary: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
        }
    }

    /// 未提供描述时的占位实现，名称取自类型名。
    pub fn anonymous<T: ?Sized>() -> Self {
        Self::new(core::any::type_name::<T>(), "")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

/// 扩展生效范围。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtensionScope {
    Global,
    Spec(SpecTypeId),
}

impl ExtensionScope {
    /// 判断扩展是否适用于给定 Spec。
    pub fn applies_to(&self, spec: &SpecTypeId) -> bool {
        match self {
            Self::Global => true,
            Self::Spec(target) => target == spec,
        }
    }
}

impl fmt::Display for ExtensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Spec(spec) => write!(f, "spec:{spec}"),
        }
    }
}

/// 扩展能力标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Listener,
    Filter,
    InterceptorFactory,
}

/// 可注册到 [`Configuration`](crate::Configuration) 的行为对象。
///
/// # 教案式说明
/// - **意图 (Why)**：统一扩展的注册形态，拦截器按能力挑选需要的扩展；
/// - **逻辑 (How)**：实现者覆写与自身能力对应的 `as_*` 方法返回 `Some(self)`，
///   其余保持默认 `None`；[`Extension::capabilities`] 由这些访问器推导；
/// - **契约 (What)**：实现必须是 `Send + Sync + 'static`，以便在并发执行的 Spec 之间共享。
pub trait Extension: Send + Sync + 'static {
    fn descriptor(&self) -> ExtensionDescriptor {
        ExtensionDescriptor::anonymous::<Self>()
    }

    fn scope(&self) -> ExtensionScope {
        ExtensionScope::Global
    }

    fn as_listener(&self) -> Option<&dyn SpecListener> {
        None
    }

    fn as_filter(&self) -> Option<&dyn SpecFilter> {
        None
    }

    fn as_interceptor_factory(&self) -> Option<&dyn InterceptorFactory> {
        None
    }

    fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = Vec::new();
        if self.as_listener().is_some() {
            capabilities.push(Capability::Listener);
        }
        if self.as_filter().is_some() {
            capabilities.push(Capability::Filter);
        }
        if self.as_interceptor_factory().is_some() {
            capabilities.push(Capability::InterceptorFactory);
        }
        capabilities
    }
}

impl fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.descriptor().name())
            .field("scope", &self.scope())
            .finish()
    }
}
