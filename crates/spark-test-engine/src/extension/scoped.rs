use std::sync::Arc;

use crate::{interceptor::InterceptorFactory, spec::SpecTypeId};

use super::{Extension, ExtensionDescriptor, ExtensionScope, SpecFilter, SpecListener};

/// 将扩展限定到单个 Spec 类型的包装。
///
/// # 教案式说明
/// - **意图 (Why)**：通过注解声明的扩展只应作用于声明它的 Spec；包装后即使注册在共享配置中，
///   其它 Spec 通过 [`Configuration::extensions_for`](crate::Configuration::extensions_for) 也看不到它；
/// - **逻辑 (How)**：能力访问器全部委托给内部扩展，仅覆写 [`Extension::scope`]；
/// - **契约 (What)**：每次包装都会得到新的身份，因此同一个内部扩展可以被多个并发执行各自包装、
///   各自注册而不会触发重复注册错误。
pub struct SpecScopedExtension {
    spec: SpecTypeId,
    inner: Arc<dyn Extension>,
}

impl SpecScopedExtension {
    pub fn new(spec: SpecTypeId, inner: Arc<dyn Extension>) -> Self {
        Self { spec, inner }
    }

    pub fn spec(&self) -> &SpecTypeId {
        &self.spec
    }

    pub fn inner(&self) -> &Arc<dyn Extension> {
        &self.inner
    }
}

impl Extension for SpecScopedExtension {
    fn descriptor(&self) -> ExtensionDescriptor {
        self.inner.descriptor()
    }

    fn scope(&self) -> ExtensionScope {
        ExtensionScope::Spec(self.spec.clone())
    }

    fn as_listener(&self) -> Option<&dyn SpecListener> {
        self.inner.as_listener()
    }

    fn as_filter(&self) -> Option<&dyn SpecFilter> {
        self.inner.as_filter()
    }

    fn as_interceptor_factory(&self) -> Option<&dyn InterceptorFactory> {
        self.inner.as_interceptor_factory()
    }
}
