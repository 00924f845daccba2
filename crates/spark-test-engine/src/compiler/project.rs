use std::{borrow::Cow, sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    configuration::{Configuration, IsolationMode, SettingKey, SettingValue, SpecExecutionOrder},
    error::SourceError,
    extension::Extension,
};

use super::ConfigurationSource;

/// 项目级配置对象。
///
/// # 教案式说明
/// - **意图 (Why)**：项目通常以一个或多个配置对象集中声明并行度、超时、标签以及全局扩展；
/// - **逻辑 (How)**：所有覆盖项默认返回 `None`，只有返回 `Some` 的项会写入配置，
///   因此未声明的项不会覆盖先前阶段的值；
/// - **契约 (What)**：`extensions` 可以失败，失败会中止整个编译；
///   监听器、过滤器以带有相应能力的扩展形式通过 `extensions` 提供。
pub trait ProjectConfig: Send + Sync {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(core::any::type_name::<Self>())
    }

    fn parallelism(&self) -> Option<usize> {
        None
    }

    fn isolation_mode(&self) -> Option<IsolationMode> {
        None
    }

    fn spec_execution_order(&self) -> Option<SpecExecutionOrder> {
        None
    }

    fn fail_on_ignored(&self) -> Option<bool> {
        None
    }

    fn fail_on_empty(&self) -> Option<bool> {
        None
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn invocation_timeout(&self) -> Option<Duration> {
        None
    }

    fn invocations(&self) -> Option<u32> {
        None
    }

    fn include_tags(&self) -> Option<Vec<String>> {
        None
    }

    fn exclude_tags(&self) -> Option<Vec<String>> {
        None
    }

    /// 任意附加设置，按返回顺序写入。
    fn settings(&self) -> Vec<(SettingKey, SettingValue)> {
        Vec::new()
    }

    fn extensions(&self) -> Result<Vec<Arc<dyn Extension>>, SourceError> {
        Ok(Vec::new())
    }
}

/// 将单个项目配置写入配置。
pub fn apply_project_config(
    project: &dyn ProjectConfig,
    configuration: &Configuration,
) -> Result<(), SourceError> {
    if let Some(value) = project.parallelism() {
        configuration.set_parallelism(value);
    }
    if let Some(value) = project.isolation_mode() {
        configuration.set_isolation_mode(value);
    }
    if let Some(value) = project.spec_execution_order() {
        configuration.set_spec_execution_order(value);
    }
    if let Some(value) = project.fail_on_ignored() {
        configuration.set_fail_on_ignored(value);
    }
    if let Some(value) = project.fail_on_empty() {
        configuration.set_fail_on_empty(value);
    }
    if let Some(value) = project.timeout() {
        configuration.set_timeout(value);
    }
    if let Some(value) = project.invocation_timeout() {
        configuration.set_invocation_timeout(value);
    }
    if let Some(value) = project.invocations() {
        configuration.set_invocations(value);
    }
    if let Some(tags) = project.include_tags() {
        configuration.set_include_tags(tags);
    }
    if let Some(tags) = project.exclude_tags() {
        configuration.set_exclude_tags(tags);
    }
    for (key, value) in project.settings() {
        configuration.set(key, value);
    }

    let extensions = project.extensions()?;
    let count = extensions.len();
    for extension in extensions {
        configuration.register(extension)?;
    }
    debug!(project = %project.name(), extensions = count, "project config applied");
    Ok(())
}

/// 把项目配置适配为配置源。
pub(crate) struct ProjectConfigSource<'a>(pub(crate) &'a dyn ProjectConfig);

impl ConfigurationSource for ProjectConfigSource<'_> {
    fn name(&self) -> Cow<'static, str> {
        self.0.name()
    }

    fn apply(&self, configuration: &Configuration) -> Result<(), SourceError> {
        apply_project_config(self.0, configuration)
    }
}
