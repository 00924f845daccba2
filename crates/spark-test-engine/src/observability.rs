//! 日志安装。
//!
//! # 教案式说明
//! - **意图（Why）**：测试运行器通常只需一行调用即可得到结构化日志输出；
//!   库本身只通过 `tracing` 宏产生事件，是否安装订阅者由宿主决定；
//! - **逻辑（How）**：组合 `EnvFilter`（读取 `RUST_LOG`，缺省为 `info`）与 `fmt` 层，注册为全局订阅者；
//! - **契约（What）**：每个进程至多安装一次；重复调用或外部已有全局订阅者时返回对应错误，不会覆盖现有订阅者。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 日志安装失败的原因。
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `install_logging` 被重复调用。
    #[error("logging has already been installed by spark-test-engine")]
    AlreadyInstalled,
    /// 外部提前设置了全局 `tracing` 订阅者。
    #[error("a global tracing subscriber is already set")]
    SubscriberAlreadySet,
    /// 设置全局订阅者失败的底层错误。
    #[error("failed to set the global tracing subscriber")]
    SetGlobalSubscriber(#[source] tracing::subscriber::SetGlobalDefaultError),
}

/// 安装全局日志订阅者。
pub fn install_logging() -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Err(LoggingError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(LoggingError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobalSubscriber)?;

    INSTALLED.set(()).map_err(|_| LoggingError::AlreadyInstalled)
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
