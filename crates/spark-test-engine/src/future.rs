use core::{future::Future, pin::Pin};

/// `BoxFuture` 是拦截链在续体之间传递的通用 Future 包装。
///
/// # 契约说明（What）
/// - 约束 Future 为 `Send + 'a`，可在多线程执行器中跨线程挂起与恢复；
/// - 拦截器只能以该类型返回续体结果，保证链路上每一层的签名一致。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
