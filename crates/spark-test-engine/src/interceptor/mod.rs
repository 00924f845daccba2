//! # interceptor 模块说明
//!
//! ## 角色定位（Why）
//! - 每个 Spec 的执行都被一串拦截器包裹：外层先执行 setup，内层执行完毕后外层再执行 teardown；
//! - 拦截器彼此互不感知，只通过续体 [`Continuation`] 串联。
//!
//! ## 契约（What）
//! - 拦截器至多调用一次 `next`；是否可能短路由 [`NextPolicy`] 在描述信息中声明；
//! - 拦截器不得吞掉内层错误，只能在传播前完成自己的清理；
//! - 续体返回的 Future 为 `Send + 'static`，执行器可以在任意线程上挂起和恢复它。

mod apply_extensions;
mod chain;
mod filter;
mod ignored;
mod listener;

use std::{borrow::Cow, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{
    Result,
    configuration::Configuration,
    future::BoxFuture,
    spec::{SpecRef, SpecResults},
};

pub use apply_extensions::ApplyExtensionsInterceptor;
pub use chain::{BuiltinPriority, InterceptorChain};
pub use filter::SpecFilterInterceptor;
pub use ignored::IgnoredSpecInterceptor;
pub use listener::SpecListenerInterceptor;

/// 续体：执行剩余工作并产出该 Spec 的结果。
pub type Continuation =
    Arc<dyn Fn(SpecRef) -> BoxFuture<'static, Result<SpecResults>> + Send + Sync + 'static>;

/// 以异步闭包构造续体，常用于终端执行逻辑。
pub fn continuation<F, Fut>(f: F) -> Continuation
where
    F: Fn(SpecRef) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<SpecResults>> + Send + 'static,
{
    Arc::new(move |spec: SpecRef| -> BoxFuture<'static, Result<SpecResults>> {
        Box::pin(f(spec))
    })
}

/// 拦截器调用 `next` 的方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextPolicy {
    /// 每次调用都恰好调用一次 `next`。
    ExactlyOnce,
    /// 满足条件时短路返回，不调用 `next`；否则恰好调用一次。
    MayShortCircuit,
}

/// 拦截器元数据，用于日志与链路描述。
///
/// # 契约说明（What）
/// - `name`：稳定标识，建议使用 `vendor.component` 命名；
/// - `summary`：人类可读描述；
/// - `next_policy`：声明拦截器对 `next` 的调用方式。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptorDescriptor {
    name: Cow<'static, str>,
    summary: Cow<'static, str>,
    next_policy: NextPolicy,
}

impl InterceptorDescriptor {
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        summary: impl Into<Cow<'static, str>>,
        next_policy: NextPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            next_policy,
        }
    }

    /// 匿名描述，常用于测试。
    pub fn anonymous(stage: impl Into<Cow<'static, str>>) -> Self {
        let stage = stage.into();
        Self {
            name: Cow::Owned(format!("anonymous.{stage}")),
            summary: Cow::Owned(format!("auto-generated descriptor for {stage}")),
            next_policy: NextPolicy::ExactlyOnce,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn next_policy(&self) -> NextPolicy {
        self.next_policy
    }
}

/// 包裹单个 Spec 执行的拦截器。
///
/// # 教案式说明
/// - **意图 (Why)**：把“执行前准备、执行后清理”这一类横切逻辑从 Spec 执行本身剥离；
/// - **逻辑 (How)**：`intercept` 接收 Spec 句柄与内层续体 `next`，
///   在调用 `next` 前后分别完成 setup 与 teardown；
/// - **契约 (What)**：
///   - 失败路径上同样执行 teardown，然后原样传播内层错误；
///   - 不得在持有锁的情况下 `.await` `next`；
///   - 若返回的 Future 被丢弃，已获取的资源须通过 RAII 守卫释放。
#[async_trait]
pub trait SpecRefInterceptor: Send + Sync + 'static {
    fn descriptor(&self) -> InterceptorDescriptor;

    async fn intercept(&self, spec: SpecRef, next: Continuation) -> Result<SpecResults>;
}

/// 由扩展提供的拦截器工厂。
///
/// `priority` 越大越靠外；相同优先级保持注册顺序。
pub trait InterceptorFactory: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    /// 返回 `None` 表示当前配置下不需要该拦截器。
    fn create(&self, configuration: &Arc<Configuration>) -> Option<Arc<dyn SpecRefInterceptor>>;
}
