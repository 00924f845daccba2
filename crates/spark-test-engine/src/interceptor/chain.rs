use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    Result,
    configuration::Configuration,
    extension::{ExtensionScope, FactoryInstantiator, MetadataResolver},
    future::BoxFuture,
    spec::{SpecRef, SpecResults},
};

use super::{
    ApplyExtensionsInterceptor, Continuation, IgnoredSpecInterceptor, InterceptorDescriptor,
    SpecFilterInterceptor, SpecListenerInterceptor, SpecRefInterceptor,
};

/// 内置拦截器的优先级。扩展提供的拦截器默认优先级为 0，位于所有内置拦截器之内。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinPriority {
    Ignored = 400,
    Filter = 300,
    ApplyExtensions = 200,
    Listener = 100,
}

impl BuiltinPriority {
    pub const fn value(self) -> i32 {
        self as i32
    }
}

/// 有序拦截器列表，首个元素位于最外层。
///
/// # 教案式说明
/// - **意图 (Why)**：拦截器的 setup 顺序必须与声明顺序一致，teardown 顺序与之相反；
/// - **逻辑 (How)**：[`InterceptorChain::build`] 从终端续体开始逆序折叠，
///   每一层都把内层续体作为 `next` 捕获，最终返回最外层续体；
/// - **契约 (What)**：链路在构建后不可变，返回的续体可被多个 Spec 并发调用。
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn SpecRefInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个拦截器，位于已有拦截器之内。
    pub fn with(mut self, interceptor: Arc<dyn SpecRefInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn push(&mut self, interceptor: Arc<dyn SpecRefInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// 按优先级从高到低装配；优先级相同的保持传入顺序。
    pub fn assemble(entries: impl IntoIterator<Item = (i32, Arc<dyn SpecRefInterceptor>)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Self {
            interceptors: entries.into_iter().map(|(_, interceptor)| interceptor).collect(),
        }
    }

    /// 默认链路：内置拦截器加上配置中全局扩展提供的拦截器。
    ///
    /// 只会读取构建时已注册的全局拦截器工厂；执行期间叠加的扩展不会改变已构建的链路。
    pub fn standard(
        configuration: &Arc<Configuration>,
        resolver: Arc<dyn MetadataResolver>,
        instantiator: Arc<dyn FactoryInstantiator>,
    ) -> Self {
        Self::assemble(Self::standard_entries(configuration, resolver, instantiator))
    }

    /// 默认链路的 `(优先级, 拦截器)` 条目，调用方可以追加自己的条目后再装配。
    pub fn standard_entries(
        configuration: &Arc<Configuration>,
        resolver: Arc<dyn MetadataResolver>,
        instantiator: Arc<dyn FactoryInstantiator>,
    ) -> Vec<(i32, Arc<dyn SpecRefInterceptor>)> {
        let ignored: Arc<dyn SpecRefInterceptor> = Arc::new(IgnoredSpecInterceptor);
        let filter: Arc<dyn SpecRefInterceptor> =
            Arc::new(SpecFilterInterceptor::new(Arc::clone(configuration)));
        let apply_extensions: Arc<dyn SpecRefInterceptor> = Arc::new(
            ApplyExtensionsInterceptor::new(Arc::clone(configuration), resolver, instantiator),
        );
        let listener: Arc<dyn SpecRefInterceptor> =
            Arc::new(SpecListenerInterceptor::new(Arc::clone(configuration)));

        let mut entries = vec![
            (BuiltinPriority::Ignored.value(), ignored),
            (BuiltinPriority::Filter.value(), filter),
            (BuiltinPriority::ApplyExtensions.value(), apply_extensions),
            (BuiltinPriority::Listener.value(), listener),
        ];

        for extension in configuration.extensions() {
            if !matches!(extension.scope(), ExtensionScope::Global) {
                continue;
            }
            let Some(factory) = extension.as_interceptor_factory() else {
                continue;
            };
            if let Some(interceptor) = factory.create(configuration) {
                debug!(
                    extension = extension.descriptor().name(),
                    interceptor = interceptor.descriptor().name(),
                    priority = factory.priority(),
                    "extension interceptor added to chain"
                );
                entries.push((factory.priority(), interceptor));
            }
        }

        entries
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// 从外到内的描述信息。
    pub fn descriptors(&self) -> Vec<InterceptorDescriptor> {
        self.interceptors.iter().map(|i| i.descriptor()).collect()
    }

    /// 以终端续体构建最外层续体。
    pub fn build(
        interceptors: &[Arc<dyn SpecRefInterceptor>],
        terminal: Continuation,
    ) -> Continuation {
        interceptors
            .iter()
            .rev()
            .fold(terminal, |next, interceptor| {
                let interceptor = Arc::clone(interceptor);
                let wrapped: Continuation =
                    Arc::new(move |spec: SpecRef| -> BoxFuture<'static, Result<SpecResults>> {
                        let interceptor = Arc::clone(&interceptor);
                        let next = Arc::clone(&next);
                        Box::pin(async move { interceptor.intercept(spec, next).await })
                    });
                wrapped
            })
    }

    pub fn into_continuation(self, terminal: Continuation) -> Continuation {
        Self::build(&self.interceptors, terminal)
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .interceptors
            .iter()
            .map(|i| i.descriptor().name().to_owned())
            .collect();
        f.debug_struct("InterceptorChain")
            .field("interceptors", &names)
            .finish()
    }
}
