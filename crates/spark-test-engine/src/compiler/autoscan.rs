use std::{borrow::Cow, sync::Arc};

use tracing::debug;

use crate::{configuration::Configuration, error::SourceError, extension::Extension};

use super::{ConfigurationSource, ProjectConfig, project::apply_project_config};

/// 自动发现协作方：提供扫描得到的扩展与项目配置。
///
/// 扫描机制本身（类路径、注册表、构建脚本生成的清单等）不在本 crate 范围内。
pub trait AutoScan: Send + Sync {
    fn extensions(&self) -> Result<Vec<Arc<dyn Extension>>, SourceError>;

    fn project_configs(&self) -> Result<Vec<Arc<dyn ProjectConfig>>, SourceError>;
}

/// 预先确定结果的自动发现实现。
#[derive(Clone, Default)]
pub struct StaticAutoScan {
    extensions: Vec<Arc<dyn Extension>>,
    project_configs: Vec<Arc<dyn ProjectConfig>>,
}

impl StaticAutoScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn with_project_config(mut self, config: Arc<dyn ProjectConfig>) -> Self {
        self.project_configs.push(config);
        self
    }
}

impl AutoScan for StaticAutoScan {
    fn extensions(&self) -> Result<Vec<Arc<dyn Extension>>, SourceError> {
        Ok(self.extensions.clone())
    }

    fn project_configs(&self) -> Result<Vec<Arc<dyn ProjectConfig>>, SourceError> {
        Ok(self.project_configs.clone())
    }
}

/// 自动发现阶段。
///
/// 配置中 `spark.test.autoscan.disabled` 为真时（通常由环境变量阶段写入），整个阶段被跳过。
#[derive(Clone)]
pub struct AutoScanSource {
    scanner: Option<Arc<dyn AutoScan>>,
}

impl AutoScanSource {
    pub fn new(scanner: impl AutoScan + 'static) -> Self {
        Self {
            scanner: Some(Arc::new(scanner)),
        }
    }

    /// 不做任何扫描。
    pub const fn disabled() -> Self {
        Self { scanner: None }
    }
}

impl Default for AutoScanSource {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ConfigurationSource for AutoScanSource {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("autoscan")
    }

    fn apply(&self, configuration: &Configuration) -> Result<(), SourceError> {
        let Some(scanner) = &self.scanner else {
            return Ok(());
        };
        if configuration.autoscan_disabled() {
            debug!("autoscan disabled by configuration; skipping");
            return Ok(());
        }

        let extensions = scanner.extensions()?;
        let discovered = extensions.len();
        for extension in extensions {
            configuration.register(extension)?;
        }

        let configs = scanner.project_configs()?;
        for config in &configs {
            apply_project_config(config.as_ref(), configuration)?;
        }
        debug!(
            extensions = discovered,
            project_configs = configs.len(),
            "autoscan contributions applied"
        );
        Ok(())
    }
}
