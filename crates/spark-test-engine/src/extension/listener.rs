use async_trait::async_trait;

use crate::{
    Result,
    error::ErrorCause,
    spec::{SpecRef, SpecResults},
};

/// Spec 生命周期监听器。
///
/// # 契约说明（What）
/// - `prepare_spec` 在 Spec 执行前调用；返回错误会阻止该 Spec 执行；
/// - `finalize_spec` 在执行结束后调用，无论成功与否都会收到结果；
/// - 两个回调都可能在不同线程上被并发调用（不同 Spec），实现需自行保证内部同步。
#[async_trait]
pub trait SpecListener: Send + Sync {
    async fn prepare_spec(&self, _spec: &SpecRef) -> core::result::Result<(), ErrorCause> {
        Ok(())
    }

    async fn finalize_spec(
        &self,
        _spec: &SpecRef,
        _results: &Result<SpecResults>,
    ) -> core::result::Result<(), ErrorCause> {
        Ok(())
    }
}
