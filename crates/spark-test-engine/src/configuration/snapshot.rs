use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    extension::{Capability, ExtensionDescriptor},
    spec::SpecTypeId,
};

use super::{SettingKey, SettingValue, TestCaseConfig};

/// 配置的只读快照，用于转储与诊断。
#[derive(Clone, Debug, Serialize)]
pub struct ConfigurationSnapshot {
    pub sealed: bool,
    pub settings: BTreeMap<SettingKey, SettingValue>,
    pub test_case_defaults: TestCaseConfig,
    pub extensions: Vec<ExtensionSnapshot>,
}

/// 快照中的单个扩展条目。
#[derive(Clone, Debug, Serialize)]
pub struct ExtensionSnapshot {
    #[serde(flatten)]
    pub descriptor: ExtensionDescriptor,
    /// 限定的 Spec；全局扩展为 `None`。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecTypeId>,
    pub capabilities: Vec<Capability>,
}

impl ConfigurationSnapshot {
    /// 以缩进 JSON 输出。
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        configuration::{Configuration, keys},
        extension::{Extension, SpecScopedExtension, TagFilter},
        spec::SpecTypeId,
    };

    #[test]
    fn snapshot_serializes_settings_and_extensions() {
        let configuration = Configuration::new();
        configuration.set_parallelism(4);
        configuration
            .register(Arc::new(TagFilter))
            .expect("注册全局扩展");
        let inner: Arc<dyn Extension> = Arc::new(TagFilter);
        configuration
            .register(Arc::new(SpecScopedExtension::new(
                SpecTypeId::from_static("DbSpec"),
                inner,
            )))
            .expect("注册限定扩展");

        let json = configuration
            .snapshot()
            .to_json_pretty()
            .expect("快照应可序列化");
        let value: serde_json::Value = serde_json::from_str(&json).expect("输出应为合法 JSON");

        assert_eq!(value["sealed"], false);
        assert_eq!(value["settings"][keys::PARALLELISM.as_str()]["value"], 4);
        assert_eq!(value["test_case_defaults"]["invocations"], 1);
        let extensions = value["extensions"].as_array().expect("扩展应为数组");
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0]["name"], "spark.tag_filter");
        assert!(extensions[0].get("spec").is_none(), "全局扩展不输出 spec 字段");
        assert_eq!(extensions[1]["spec"], "DbSpec");
        assert_eq!(extensions[1]["capabilities"][0], "filter");
    }
}
