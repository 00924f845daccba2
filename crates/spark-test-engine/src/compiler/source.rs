use std::borrow::Cow;

use crate::{configuration::Configuration, error::SourceError};

/// 单个有序配置源。
///
/// # 契约说明（What）
/// - `apply` 就地修改配置；失败时返回 [`SourceError`]，编译器会在第一个失败处中止；
/// - 同一个配置源可能在编译失败后被重新执行，实现应当可重复应用；
/// - `name` 用于日志与错误上下文。
pub trait ConfigurationSource: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    fn apply(&self, configuration: &Configuration) -> Result<(), SourceError>;
}

/// 空操作配置源，用于关闭某个阶段。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSource;

impl ConfigurationSource for NoopSource {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("noop")
    }

    fn apply(&self, _configuration: &Configuration) -> Result<(), SourceError> {
        Ok(())
    }
}
