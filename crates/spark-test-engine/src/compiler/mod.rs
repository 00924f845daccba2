//! # compiler 模块说明
//!
//! ## 角色定位（Why）
//! - 把平台默认值、环境变量、自动发现、项目配置四个来源按固定顺序合并到同一个 [`Configuration`]；
//! - 借助 [`CompilationGuard`] 保证每个守卫只成功编译一次，并发调用方等待同一次编译的结果。
//!
//! ## 执行顺序（How）
//! 1. 平台默认值；
//! 2. 环境变量覆盖；
//! 3. 自动发现的扩展与项目配置；
//! 4. 调用方提供的项目配置，按传入顺序。
//!
//! 同一设置键后写覆盖先写；第一个失败的阶段中止编译，错误被包装为 [`ConfigurationError`]。

mod autoscan;
pub mod environment;
mod guard;
mod platform;
mod project;
mod source;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    configuration::Configuration,
    error::{ConfigurationError, SourceStage},
};

pub use autoscan::{AutoScan, AutoScanSource, StaticAutoScan};
pub use environment::{EnvironmentProvider, EnvironmentSource, ProcessEnvironment, StaticEnvironment};
pub use guard::{CompilationGuard, CompilationState};
pub use platform::PlatformDefaults;
pub use project::{ProjectConfig, apply_project_config};
pub use source::{ConfigurationSource, NoopSource};

use project::ProjectConfigSource;

/// 配置编译器。
///
/// # 教案式说明
/// - **意图 (Why)**：启动阶段只需调用一次 [`ConfigCompiler::initialize`]，即可得到封存后的配置；
///   重复调用、并发调用都不会再次执行任何配置源；
/// - **逻辑 (How)**：
///   - [`ConfigCompiler::compile`] 只负责按顺序应用配置源，不触碰守卫；
///   - [`ConfigCompiler::initialize`] 在守卫内调用 `compile`，成功后封存配置并按需输出快照；
/// - **契约 (What)**：
///   - 默认使用独立守卫；需要进程级单例语义时使用 [`ConfigCompiler::for_process`]；
///   - 编译失败时守卫保持未编译状态，配置可能已被部分修改，重试会在其上从头重新应用全部阶段；
/// - **风险 (Trade-offs)**：守卫一旦编译成功，后续传入的其它配置实例也会被原样返回而不做编译，
///   调用方应让一个守卫只对应一个配置实例。
#[derive(Clone)]
pub struct ConfigCompiler {
    guard: Arc<CompilationGuard>,
    platform: Arc<dyn ConfigurationSource>,
    environment: Arc<dyn ConfigurationSource>,
    autoscan: Arc<dyn ConfigurationSource>,
}

impl Default for ConfigCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigCompiler {
    /// 原生平台默认值、进程环境变量、不做自动发现，使用独立守卫。
    pub fn new() -> Self {
        Self {
            guard: Arc::new(CompilationGuard::new()),
            platform: Arc::new(PlatformDefaults::native()),
            environment: Arc::new(EnvironmentSource::process()),
            autoscan: Arc::new(AutoScanSource::disabled()),
        }
    }

    /// 使用进程级共享守卫。
    pub fn for_process() -> Self {
        Self::new().with_guard(CompilationGuard::process())
    }

    pub fn with_guard(mut self, guard: Arc<CompilationGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_platform(mut self, source: impl ConfigurationSource + 'static) -> Self {
        self.platform = Arc::new(source);
        self
    }

    pub fn with_environment(mut self, source: impl ConfigurationSource + 'static) -> Self {
        self.environment = Arc::new(source);
        self
    }

    pub fn with_autoscan(mut self, source: impl ConfigurationSource + 'static) -> Self {
        self.autoscan = Arc::new(source);
        self
    }

    pub fn guard(&self) -> &Arc<CompilationGuard> {
        &self.guard
    }

    /// 至多编译一次，返回（已封存的）配置。
    ///
    /// - **契约 (What)**：编译失败时撤销本次尝试写入的设置与注册的扩展，
    ///   配置回到调用前的状态，之后的重试从头开始。
    pub fn initialize(
        &self,
        configuration: &Arc<Configuration>,
        project_configs: &[Arc<dyn ProjectConfig>],
    ) -> Result<Arc<Configuration>, ConfigurationError> {
        let compiled_now = self.guard.run_once(|| {
            let checkpoint = configuration.checkpoint();
            if let Err(err) = self.compile(configuration, project_configs) {
                configuration.rollback(checkpoint);
                return Err(err);
            }
            configuration.seal();
            Ok(())
        })?;

        if compiled_now {
            info!(
                extensions = configuration.extension_count(),
                settings = configuration.settings().len(),
                "configuration compiled"
            );
            if configuration.dump_config() {
                dump(configuration);
            }
        } else {
            debug!("configuration already compiled; sources skipped");
        }
        Ok(Arc::clone(configuration))
    }

    /// 按固定顺序应用全部配置源，不检查也不修改守卫。
    pub fn compile(
        &self,
        configuration: &Configuration,
        project_configs: &[Arc<dyn ProjectConfig>],
    ) -> Result<(), ConfigurationError> {
        apply_stage(SourceStage::PlatformDefaults, self.platform.as_ref(), configuration)?;
        apply_stage(SourceStage::Environment, self.environment.as_ref(), configuration)?;
        apply_stage(SourceStage::AutoScan, self.autoscan.as_ref(), configuration)?;
        for project in project_configs {
            apply_stage(
                SourceStage::ProjectConfig,
                &ProjectConfigSource(project.as_ref()),
                configuration,
            )?;
        }
        Ok(())
    }
}

fn apply_stage(
    stage: SourceStage,
    source: &dyn ConfigurationSource,
    configuration: &Configuration,
) -> Result<(), ConfigurationError> {
    let name = source.name();
    debug!(stage = stage.as_str(), source = %name, "applying configuration source");
    source.apply(configuration).map_err(|err| {
        warn!(
            stage = stage.as_str(),
            source = %name,
            error = %err,
            "configuration source failed"
        );
        ConfigurationError::from_source(stage, name, err)
    })
}

fn dump(configuration: &Configuration) {
    match configuration.snapshot().to_json_pretty() {
        Ok(json) => info!(target: "spark_test_engine::config_dump", "{json}"),
        Err(err) => warn!(error = %err, "failed to serialize configuration snapshot"),
    }
}
