//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义执行内核对外暴露的全部错误：配置编译失败、扩展工厂实例化失败、Spec 执行失败；
//! - 三类错误的影响面不同：配置错误阻断整个进程的启动序列，实例化错误与执行错误只影响单个 Spec。
//!
//! ## 设计要求（What）
//! - 所有错误均派生 `thiserror::Error`，并满足 `Send + Sync + 'static`；
//! - 原始根因统一以 [`ErrorCause`] 携带，`#[source]` 保证错误链可被逐级遍历；
//! - 错误类型实现 `Clone`，以便在结果映射与报告中复制而无需重新构造。

use std::{borrow::Cow, fmt, sync::Arc};

use thiserror::Error;

use crate::{extension::FactoryId, spec::SpecTypeId};

/// 线程安全、可共享的根因错误。
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// 以人类可读文本构造 [`ErrorCause`]，用于监听器、数据源等无需自定义错误类型的场景。
pub fn cause(message: impl Into<String>) -> ErrorCause {
    let boxed: Box<dyn std::error::Error + Send + Sync> = message.into().into();
    Arc::from(boxed)
}

/// 编译阶段标识，按固定优先级排列。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceStage {
    /// 平台默认值（例如平台原生的标签探测）。
    PlatformDefaults,
    /// 环境变量覆盖。
    Environment,
    /// 自动发现的扩展与项目配置。
    AutoScan,
    /// 调用方显式提供的项目配置。
    ProjectConfig,
}

impl SourceStage {
    /// 返回阶段的稳定字符串描述，用于日志字段。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlatformDefaults => "platform_defaults",
            Self::Environment => "environment",
            Self::AutoScan => "autoscan",
            Self::ProjectConfig => "project_config",
        }
    }
}

impl fmt::Display for SourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配置编译失败。
///
/// # 教案式说明
/// - **意图 (Why)**：任何配置源在应用过程中失败都会被包装为同一个类型，调用方只需处理一种启动失败。
/// - **契约 (What)**：
///   - `Source`：`stage` 为失败阶段，`source_name` 为失败的数据源名称，`cause` 为原始根因；
///   - `Reentrant`：同一线程在编译过程中再次请求编译，直接拒绝以避免自锁；
///   - 出现该错误时进程保持未编译状态，后续调用可以从头重试。
#[derive(Clone, Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration source `{source_name}` failed during the {stage} stage")]
    Source {
        stage: SourceStage,
        source_name: Cow<'static, str>,
        #[source]
        cause: ErrorCause,
    },
    #[error("configuration compilation re-entered on the thread that is already compiling")]
    Reentrant,
}

impl ConfigurationError {
    /// 以阶段与数据源名称包装原始错误。
    pub fn from_source(
        stage: SourceStage,
        source_name: impl Into<Cow<'static, str>>,
        error: SourceError,
    ) -> Self {
        Self::Source {
            stage,
            source_name: source_name.into(),
            cause: Arc::new(error),
        }
    }

    /// 失败阶段；`Reentrant` 没有阶段信息。
    pub fn stage(&self) -> Option<SourceStage> {
        match self {
            Self::Source { stage, .. } => Some(*stage),
            Self::Reentrant => None,
        }
    }

    /// 原始根因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        match self {
            Self::Source { cause, .. } => Some(cause),
            Self::Reentrant => None,
        }
    }
}

/// 单个配置源在应用过程中产生的错误。
#[derive(Clone, Debug, Error)]
pub enum SourceError {
    /// 覆盖值无法解析为目标类型。
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: Cow<'static, str>,
    },
    /// 向配置注册扩展失败。
    #[error(transparent)]
    Registration(#[from] RegistryError),
    /// 自动发现协作方失败。
    #[error("auto-scan failed: {detail}")]
    Discovery { detail: String },
    /// 其它来自数据源实现的错误。
    #[error("{context}")]
    Other {
        context: Cow<'static, str>,
        #[source]
        cause: Option<ErrorCause>,
    },
}

impl SourceError {
    /// 构造仅含上下文描述的错误。
    pub fn other(context: impl Into<Cow<'static, str>>) -> Self {
        Self::Other {
            context: context.into(),
            cause: None,
        }
    }

    /// 构造携带底层根因的错误。
    pub fn with_cause(context: impl Into<Cow<'static, str>>, cause: ErrorCause) -> Self {
        Self::Other {
            context: context.into(),
            cause: Some(cause),
        }
    }
}

/// 扩展注册表的错误。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// 同一实例（按指针身份判定）已经注册。
    #[error("extension `{extension}` is already registered")]
    Duplicate { extension: String },
    /// 注销时未找到该实例，通常意味着它已被其它路径移除。
    #[error("extension `{extension}` is not registered")]
    NotRegistered { extension: String },
    /// 编译完成后禁止移除编译期注册的扩展。
    #[error("extension `{extension}` belongs to the compiled configuration and cannot be removed")]
    Sealed { extension: String },
}

/// 扩展工厂注册表的错误。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FactoryRegistrationError {
    /// 工厂标识重复。
    #[error("extension factory `{factory}` already registered")]
    Duplicate { factory: FactoryId },
}

/// 声明的扩展工厂无法构造。
///
/// 只影响声明了该工厂的 Spec：该 Spec 不会被执行，其它 Spec 不受影响。
#[derive(Clone, Debug, Error)]
pub enum ExtensionInstantiationError {
    #[error("extension factory `{factory}` is not registered")]
    UnknownFactory { factory: FactoryId },
    #[error("extension factory `{factory}` failed to construct")]
    Construction {
        factory: FactoryId,
        #[source]
        cause: ErrorCause,
    },
}

impl ExtensionInstantiationError {
    /// 出错的工厂标识。
    pub fn factory(&self) -> &FactoryId {
        match self {
            Self::UnknownFactory { factory } | Self::Construction { factory, .. } => factory,
        }
    }
}

/// 监听器回调所处的阶段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerPhase {
    Prepare,
    Finalize,
}

impl fmt::Display for ListenerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => f.write_str("prepare"),
            Self::Finalize => f.write_str("finalize"),
        }
    }
}

/// Spec 执行失败。
///
/// # 教案式说明
/// - **意图 (Why)**：拦截链中任何一层（包括终端续体）产生的失败都以该类型向外传播，
///   每个外层拦截器在传播途中仍会执行自己的清理。
/// - **契约 (What)**：拦截器可以附加上下文，但不得吞掉内层失败。
#[derive(Clone, Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Instantiation(#[from] ExtensionInstantiationError),
    #[error("failed to register extensions for spec `{spec}`")]
    Registration {
        spec: SpecTypeId,
        #[source]
        source: RegistryError,
    },
    #[error("listener `{listener}` failed to {phase} spec `{spec}`")]
    Listener {
        spec: SpecTypeId,
        listener: String,
        phase: ListenerPhase,
        #[source]
        cause: ErrorCause,
    },
    #[error("spec `{spec}` failed: {message}")]
    Spec {
        spec: SpecTypeId,
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },
}

impl ExecutionError {
    /// 终端续体报告 Spec 级失败的便捷构造。
    pub fn spec(spec: SpecTypeId, message: impl Into<String>) -> Self {
        Self::Spec {
            spec,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带根因的 Spec 级失败。
    pub fn spec_with_cause(spec: SpecTypeId, message: impl Into<String>, cause: ErrorCause) -> Self {
        Self::Spec {
            spec,
            message: message.into(),
            cause: Some(cause),
        }
    }
}

const _: fn() = || {
    fn assert_error_traits<T: std::error::Error + Send + Sync + Clone + 'static>() {}

    assert_error_traits::<ConfigurationError>();
    assert_error_traits::<SourceError>();
    assert_error_traits::<RegistryError>();
    assert_error_traits::<FactoryRegistrationError>();
    assert_error_traits::<ExtensionInstantiationError>();
    assert_error_traits::<ExecutionError>();
};
