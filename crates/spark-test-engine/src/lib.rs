#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![doc = "spark-test-engine: 测试框架执行内核。"]
#![doc = ""]
#![doc = "== 职责边界 =="]
#![doc = "1. 配置编译：按固定顺序（平台默认值 → 环境变量 → 自动发现 → 项目配置）把多个来源合并为唯一的 `Configuration`，且每个进程只编译一次。"]
#![doc = "2. 拦截链：以洋葱顺序包裹每个 Spec 的执行，外层先 setup、后 teardown；`ApplyExtensionsInterceptor` 负责在执行期间注册 Spec 声明的扩展，并在任何退出路径上撤销注册。"]
#![doc = ""]
#![doc = "== 外部协作方 =="]
#![doc = "Spec 的发现、注解解析、断言评估与报告输出均由调用方提供，本 crate 只在边界上以 trait 接收它们。"]

pub mod compiler;
pub mod configuration;
pub mod engine;
pub mod error;
pub mod extension;
mod future;
pub mod interceptor;
pub mod observability;
pub mod spec;

pub use async_trait::async_trait;
pub use compiler::{
    AutoScan, AutoScanSource, CompilationGuard, CompilationState, ConfigCompiler,
    ConfigurationSource, EnvironmentProvider, EnvironmentSource, NoopSource, PlatformDefaults,
    ProcessEnvironment, ProjectConfig, StaticAutoScan, StaticEnvironment,
};
pub use configuration::{
    Configuration, ConfigurationSnapshot, IsolationMode, ScopedRegistration, SettingKey,
    SettingValue, SpecExecutionOrder, TagExpression, TestCaseConfig,
};
pub use engine::{EngineReport, SpecOutcome, TestEngine, TestEngineBuilder};
pub use error::{
    ConfigurationError, ErrorCause, ExecutionError, ExtensionInstantiationError,
    FactoryRegistrationError, ListenerPhase, RegistryError, SourceError, SourceStage,
};
pub use extension::{
    AnnotationResolver, Capability, Extension, ExtensionDescriptor, ExtensionFactory,
    ExtensionScope, FactoryId, FactoryInstantiator, FactoryRegistry, FilterDecision,
    MetadataResolver, SpecFilter, SpecListener, SpecScopedExtension, TagFilter,
};
pub use future::BoxFuture;
pub use interceptor::{
    ApplyExtensionsInterceptor, BuiltinPriority, Continuation, IgnoredSpecInterceptor,
    InterceptorChain, InterceptorDescriptor, InterceptorFactory, NextPolicy,
    SpecFilterInterceptor, SpecListenerInterceptor, SpecRefInterceptor, continuation,
};
pub use observability::{LoggingError, install_logging};
pub use spec::{
    Annotation, AnnotationKind, SpecMetadata, SpecRef, SpecResults, SpecTypeId, Tag, TestCase,
    TestResult,
};

/// 执行路径统一使用的结果别名。
pub type Result<T, E = ExecutionError> = core::result::Result<T, E>;
