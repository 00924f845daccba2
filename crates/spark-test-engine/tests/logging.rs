//! 日志安装的集成测试。
//!
//! 全局订阅者是进程级状态，因此本文件单独成为一个测试二进制，且只包含一个测试。

use spark_test_engine::{LoggingError, install_logging};

/// ## 只能安装一次
///
/// - **契约 (What)**：首次安装成功；再次安装返回 [`LoggingError::AlreadyInstalled`]，不覆盖已有订阅者。
#[test]
fn install_logging_succeeds_once() {
    install_logging().expect("首次安装应成功");
    tracing::info!(target: "spark_test_engine::logging_test", "subscriber installed");

    let err = install_logging().expect_err("重复安装必须失败");
    assert!(matches!(err, LoggingError::AlreadyInstalled));
}
