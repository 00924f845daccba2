use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    Result,
    configuration::Configuration,
    error::ExecutionError,
    extension::{
        AnnotationResolver, Extension, ExtensionFactory, FactoryInstantiator, MetadataResolver,
        SpecScopedExtension,
    },
    spec::{SpecRef, SpecResults},
};

use super::{Continuation, InterceptorDescriptor, NextPolicy, SpecRefInterceptor};

/// 在 Spec 执行期间注册其声明的扩展。
///
/// # 教案式说明
/// - **意图 (Why)**：Spec 可以通过注解声明只对自己生效的扩展工厂；扩展需要在 Spec 执行期间可见，
///   执行结束后从共享配置中消失，并且不能影响并发执行的其它 Spec；
/// - **逻辑 (How)**：
///   1. 通过 [`MetadataResolver`] 读取声明的工厂标识；没有声明时直接调用 `next`；
///   2. 通过 [`FactoryInstantiator`] 逐个实例化工厂，遇到第一个失败立即返回，此时尚未注册任何扩展；
///   3. 向每个工厂索取扩展（可能为空），以 [`SpecScopedExtension`] 包装后一次性注册，得到作用域守卫；
///   4. 调用 `next`，随后释放守卫；Future 被丢弃时守卫在析构中完成注销；
/// - **契约 (What)**：
///   - 恰好调用一次 `next`，实例化或注册失败时不调用；
///   - 每个声明的工厂恰好实例化一次；
///   - 注销失败只记录日志，返回值始终是 `next` 的结果；
/// - **风险 (Trade-offs)**：包装后的扩展对其它 Spec 不可见，但仍出现在
///   [`Configuration::extensions`] 的完整列表中，读取方若需要隔离须使用
///   [`Configuration::extensions_for`]。
pub struct ApplyExtensionsInterceptor {
    configuration: Arc<Configuration>,
    resolver: Arc<dyn MetadataResolver>,
    instantiator: Arc<dyn FactoryInstantiator>,
}

impl ApplyExtensionsInterceptor {
    pub fn new(
        configuration: Arc<Configuration>,
        resolver: Arc<dyn MetadataResolver>,
        instantiator: Arc<dyn FactoryInstantiator>,
    ) -> Self {
        Self {
            configuration,
            resolver,
            instantiator,
        }
    }

    /// 使用默认注解解析器。
    pub fn with_instantiator(
        configuration: Arc<Configuration>,
        instantiator: Arc<dyn FactoryInstantiator>,
    ) -> Self {
        Self::new(configuration, Arc::new(AnnotationResolver), instantiator)
    }

    fn scoped_extensions(&self, spec: &SpecRef) -> Result<Vec<Arc<dyn Extension>>> {
        let factories = self
            .resolver
            .declared_factories(spec)
            .iter()
            .map(|id| self.instantiator.instantiate(id))
            .collect::<core::result::Result<Vec<Arc<dyn ExtensionFactory>>, _>>()?;

        Ok(factories
            .iter()
            .filter_map(|factory| factory.extension(spec))
            .map(|extension| {
                Arc::new(SpecScopedExtension::new(spec.id().clone(), extension))
                    as Arc<dyn Extension>
            })
            .collect())
    }
}

#[async_trait]
impl SpecRefInterceptor for ApplyExtensionsInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new(
            "spark.apply_extensions",
            "registers spec-declared extensions for the duration of the spec",
            NextPolicy::ExactlyOnce,
        )
    }

    async fn intercept(&self, spec: SpecRef, next: Continuation) -> Result<SpecResults> {
        let extensions = match self.scoped_extensions(&spec) {
            Ok(extensions) => extensions,
            Err(err) => {
                warn!(spec = %spec.id(), error = %err, "failed to instantiate spec extensions");
                return Err(err);
            }
        };
        let count = extensions.len();

        let registration = self
            .configuration
            .register_scoped(extensions)
            .map_err(|source| ExecutionError::Registration {
                spec: spec.id().clone(),
                source,
            })?;
        if count > 0 {
            debug!(spec = %spec.id(), count, "spec extensions registered");
        }

        let result = next(spec.clone()).await;

        let errors = registration.release();
        if count > 0 {
            debug!(
                spec = %spec.id(),
                count,
                failures = errors.len(),
                "spec extensions deregistered"
            );
        }
        result
    }
}
