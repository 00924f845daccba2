use async_trait::async_trait;
use tracing::info;

use crate::{
    Result,
    spec::{Annotation, AnnotationKind, SpecRef, SpecResults},
};

use super::{Continuation, InterceptorDescriptor, NextPolicy, SpecRefInterceptor};

/// 跳过带有 `Ignored` 注解的 Spec，返回空结果，不调用 `next`。
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoredSpecInterceptor;

#[async_trait]
impl SpecRefInterceptor for IgnoredSpecInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new(
            "spark.ignored_spec",
            "short-circuits specs annotated as ignored",
            NextPolicy::MayShortCircuit,
        )
    }

    async fn intercept(&self, spec: SpecRef, next: Continuation) -> Result<SpecResults> {
        if let Some(Annotation::Ignored { reason }) = spec.annotation(AnnotationKind::Ignored) {
            info!(
                spec = %spec.id(),
                reason = reason.as_deref().unwrap_or(""),
                "spec ignored"
            );
            return Ok(SpecResults::new());
        }
        next(spec).await
    }
}
