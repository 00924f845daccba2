use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    Result,
    configuration::Configuration,
    extension::FilterDecision,
    spec::{SpecRef, SpecResults},
};

use super::{Continuation, InterceptorDescriptor, NextPolicy, SpecRefInterceptor};

/// 依次询问对该 Spec 可见的过滤器扩展，任一排除即短路返回空结果。
///
/// 过滤器按注册顺序调用，第一个排除决定原因。
pub struct SpecFilterInterceptor {
    configuration: Arc<Configuration>,
}

impl SpecFilterInterceptor {
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }

    fn decide(&self, spec: &SpecRef) -> FilterDecision {
        for extension in self.configuration.extensions_for(spec.id()) {
            let Some(filter) = extension.as_filter() else {
                continue;
            };
            let decision = filter.filter(spec, &self.configuration);
            if decision.is_excluded() {
                return decision;
            }
        }
        FilterDecision::Include
    }
}

#[async_trait]
impl SpecRefInterceptor for SpecFilterInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new(
            "spark.spec_filter",
            "short-circuits specs excluded by filter extensions",
            NextPolicy::MayShortCircuit,
        )
    }

    async fn intercept(&self, spec: SpecRef, next: Continuation) -> Result<SpecResults> {
        if let FilterDecision::Exclude(reason) = self.decide(&spec) {
            info!(spec = %spec.id(), %reason, "spec excluded by filter");
            return Ok(SpecResults::new());
        }
        next(spec).await
    }
}
