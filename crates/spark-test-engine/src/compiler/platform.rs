use std::{borrow::Cow, sync::Arc};

use crate::{
    configuration::{Configuration, keys},
    error::SourceError,
    extension::TagFilter,
};

use super::ConfigurationSource;

/// 平台默认值阶段。
///
/// 在支持标签探测的平台上注册 [`TagFilter`]，并记录平台名称；其它平台上不做任何修改。
#[derive(Clone, Debug)]
pub struct PlatformDefaults {
    platform: Option<&'static str>,
    tag_detection: bool,
}

impl PlatformDefaults {
    /// 当前编译目标的默认值。
    pub fn native() -> Self {
        Self {
            platform: Some(std::env::consts::OS),
            tag_detection: cfg!(not(target_family = "wasm")),
        }
    }

    /// 不提供任何平台默认值。
    pub const fn none() -> Self {
        Self {
            platform: None,
            tag_detection: false,
        }
    }

    pub fn tag_detection(&self) -> bool {
        self.tag_detection
    }
}

impl Default for PlatformDefaults {
    fn default() -> Self {
        Self::native()
    }
}

impl ConfigurationSource for PlatformDefaults {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("platform-defaults")
    }

    fn apply(&self, configuration: &Configuration) -> Result<(), SourceError> {
        if let Some(platform) = self.platform.filter(|p| !p.is_empty()) {
            configuration.set(keys::PLATFORM, platform);
        }
        if self.tag_detection {
            configuration.register(Arc::new(TagFilter))?;
        }
        Ok(())
    }
}
