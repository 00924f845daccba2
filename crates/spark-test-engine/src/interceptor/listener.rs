use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    Result,
    configuration::Configuration,
    error::{ExecutionError, ListenerPhase},
    extension::Extension,
    spec::{SpecRef, SpecResults},
};

use super::{Continuation, InterceptorDescriptor, NextPolicy, SpecRefInterceptor};

/// 在 Spec 执行前后通知监听器扩展。
///
/// # 教案式说明
/// - **逻辑 (How)**：按注册顺序调用 `prepare_spec`，随后调用一次 `next`，再按相反顺序调用 `finalize_spec`；
/// - **契约 (What)**：
///   - 某个监听器 `prepare_spec` 失败时不再调用 `next`，已完成准备的监听器仍会收到 `finalize_spec`，
///     最终返回准备阶段的错误；
///   - `next` 失败时所有监听器仍会收到 `finalize_spec`，`finalize_spec` 自身的失败只记录日志，
///     返回 `next` 的原始错误；
///   - `next` 成功而 `finalize_spec` 失败时，所有监听器都完成回调后返回第一个收尾错误。
pub struct SpecListenerInterceptor {
    configuration: Arc<Configuration>,
}

impl SpecListenerInterceptor {
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }
}

fn listener_name(extension: &Arc<dyn Extension>) -> String {
    extension.descriptor().name().to_owned()
}

async fn finalize_all(
    prepared: &[Arc<dyn Extension>],
    spec: &SpecRef,
    result: &Result<SpecResults>,
) -> Option<ExecutionError> {
    let mut first_error = None;
    for extension in prepared.iter().rev() {
        let Some(listener) = extension.as_listener() else {
            continue;
        };
        if let Err(cause) = listener.finalize_spec(spec, result).await {
            warn!(
                spec = %spec.id(),
                listener = extension.descriptor().name(),
                error = %cause,
                "listener failed to finalize spec"
            );
            if first_error.is_none() {
                first_error = Some(ExecutionError::Listener {
                    spec: spec.id().clone(),
                    listener: listener_name(extension),
                    phase: ListenerPhase::Finalize,
                    cause,
                });
            }
        }
    }
    first_error
}

#[async_trait]
impl SpecRefInterceptor for SpecListenerInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new(
            "spark.spec_listener",
            "notifies listener extensions before and after each spec",
            NextPolicy::MayShortCircuit,
        )
    }

    async fn intercept(&self, spec: SpecRef, next: Continuation) -> Result<SpecResults> {
        let listeners: Vec<Arc<dyn Extension>> = self
            .configuration
            .extensions_for(spec.id())
            .into_iter()
            .filter(|extension| extension.as_listener().is_some())
            .collect();

        let mut prepared = Vec::with_capacity(listeners.len());
        for extension in listeners {
            let Some(listener) = extension.as_listener() else {
                continue;
            };
            if let Err(cause) = listener.prepare_spec(&spec).await {
                let err = ExecutionError::Listener {
                    spec: spec.id().clone(),
                    listener: listener_name(&extension),
                    phase: ListenerPhase::Prepare,
                    cause,
                };
                warn!(spec = %spec.id(), error = %err, "listener failed to prepare spec");
                let failed = Err(err);
                finalize_all(&prepared, &spec, &failed).await;
                return failed;
            }
            prepared.push(extension);
        }

        let result = next(spec.clone()).await;

        let finalize_error = finalize_all(&prepared, &spec, &result).await;
        match (finalize_error, result) {
            (Some(finalize_err), Ok(_)) => Err(finalize_err),
            (_, result) => result,
        }
    }
}
