//! 环境变量覆盖阶段。
//!
//! # 键表（What）
//! | 环境变量 | 设置 | 格式 |
//! |---|---|---|
//! | `SPARK_TEST_PARALLELISM` | 并行度 | 正整数 |
//! | `SPARK_TEST_TIMEOUT_MS` | 用例总超时 | 毫秒 |
//! | `SPARK_TEST_INVOCATION_TIMEOUT_MS` | 单次调用超时 | 毫秒 |
//! | `SPARK_TEST_ISOLATION_MODE` | 隔离模式 | `single_instance` 等 |
//! | `SPARK_TEST_SPEC_ORDER` | 执行顺序 | `declared` / `lexicographic` |
//! | `SPARK_TEST_FAIL_ON_IGNORED` | 存在被忽略的 Spec 时失败 | 布尔 |
//! | `SPARK_TEST_FAIL_ON_EMPTY` | 没有任何用例时失败 | 布尔 |
//! | `SPARK_TEST_INCLUDE_TAGS` / `SPARK_TEST_EXCLUDE_TAGS` | 标签表达式 | 逗号分隔 |
//! | `SPARK_TEST_DUMP_CONFIG` | 编译后输出配置快照 | 布尔 |
//! | `SPARK_TEST_AUTOSCAN_DISABLE` | 跳过自动发现阶段 | 布尔 |
//! | `SPARK_TEST_SETTING_<NAME>` | 任意设置 `<name>`（小写，`_` 换成 `.`） | 文本 |
//!
//! 布尔值接受 `true/false/1/0/yes/no/on/off`，不区分大小写。
//! 任何无法解析的值都会使本阶段失败；透传变量映射到 `spark.test.` 命名空间同样失败。

use std::{
    borrow::Cow,
    collections::BTreeMap,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use crate::{
    configuration::{
        Configuration, IsolationMode, SettingKey, SettingValue, SpecExecutionOrder, keys,
    },
    error::SourceError,
};

use super::ConfigurationSource;

pub const PARALLELISM: &str = "SPARK_TEST_PARALLELISM";
pub const TIMEOUT_MS: &str = "SPARK_TEST_TIMEOUT_MS";
pub const INVOCATION_TIMEOUT_MS: &str = "SPARK_TEST_INVOCATION_TIMEOUT_MS";
pub const ISOLATION_MODE: &str = "SPARK_TEST_ISOLATION_MODE";
pub const SPEC_ORDER: &str = "SPARK_TEST_SPEC_ORDER";
pub const FAIL_ON_IGNORED: &str = "SPARK_TEST_FAIL_ON_IGNORED";
pub const FAIL_ON_EMPTY: &str = "SPARK_TEST_FAIL_ON_EMPTY";
pub const INCLUDE_TAGS: &str = "SPARK_TEST_INCLUDE_TAGS";
pub const EXCLUDE_TAGS: &str = "SPARK_TEST_EXCLUDE_TAGS";
pub const DUMP_CONFIG: &str = "SPARK_TEST_DUMP_CONFIG";
pub const AUTOSCAN_DISABLE: &str = "SPARK_TEST_AUTOSCAN_DISABLE";
pub const SETTING_PREFIX: &str = "SPARK_TEST_SETTING_";

/// 环境变量读取接口，便于在测试中替换真实进程环境。
pub trait EnvironmentProvider: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;

    /// 全部变量，用于前缀扫描。
    fn vars(&self) -> Vec<(String, String)>;
}

/// 读取当前进程的环境变量；非 UTF-8 的变量被忽略。
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentProvider for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}

/// 固定内容的环境。
#[derive(Debug, Default, Clone)]
pub struct StaticEnvironment {
    vars: BTreeMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvironmentProvider for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// 从环境变量读取覆盖值的配置源。
#[derive(Clone)]
pub struct EnvironmentSource {
    provider: Arc<dyn EnvironmentProvider>,
}

impl EnvironmentSource {
    pub fn new(provider: impl EnvironmentProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn process() -> Self {
        Self::new(ProcessEnvironment)
    }

    fn read<T>(
        &self,
        key: &str,
        parse: impl FnOnce(&str) -> Result<T, Cow<'static, str>>,
    ) -> Result<Option<T>, SourceError> {
        let Some(raw) = self.provider.var(key) else {
            return Ok(None);
        };
        parse(raw.trim())
            .map(Some)
            .map_err(|reason| SourceError::InvalidValue {
                key: key.to_owned(),
                value: raw,
                reason,
            })
    }
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self::process()
    }
}

fn parse_bool(raw: &str) -> Result<bool, Cow<'static, str>> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Cow::Borrowed("expected a boolean")),
    }
}

fn parse_positive(raw: &str) -> Result<usize, Cow<'static, str>> {
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Cow::Borrowed("expected a positive integer")),
    }
}

fn parse_millis(raw: &str) -> Result<Duration, Cow<'static, str>> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| Cow::Borrowed("expected a duration in milliseconds"))
}

fn parse_enum<T: FromStr<Err = &'static str>>(raw: &str) -> Result<T, Cow<'static, str>> {
    raw.parse().map_err(Cow::Borrowed)
}

fn parse_tags(raw: &str) -> Result<Vec<String>, Cow<'static, str>> {
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect())
}

/// `SPARK_TEST_SETTING_MY_FLAG` → `my.flag`
fn passthrough_key(var: &str) -> Option<SettingKey> {
    let name = var.strip_prefix(SETTING_PREFIX)?;
    if name.is_empty() {
        return None;
    }
    Some(SettingKey::new(name.to_ascii_lowercase().replace('_', ".")))
}

impl ConfigurationSource for EnvironmentSource {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("environment")
    }

    fn apply(&self, configuration: &Configuration) -> Result<(), SourceError> {
        if let Some(value) = self.read(PARALLELISM, parse_positive)? {
            configuration.set_parallelism(value);
        }
        if let Some(value) = self.read(TIMEOUT_MS, parse_millis)? {
            configuration.set_timeout(value);
        }
        if let Some(value) = self.read(INVOCATION_TIMEOUT_MS, parse_millis)? {
            configuration.set_invocation_timeout(value);
        }
        if let Some(value) = self.read(ISOLATION_MODE, parse_enum::<IsolationMode>)? {
            configuration.set_isolation_mode(value);
        }
        if let Some(value) = self.read(SPEC_ORDER, parse_enum::<SpecExecutionOrder>)? {
            configuration.set_spec_execution_order(value);
        }
        if let Some(value) = self.read(FAIL_ON_IGNORED, parse_bool)? {
            configuration.set_fail_on_ignored(value);
        }
        if let Some(value) = self.read(FAIL_ON_EMPTY, parse_bool)? {
            configuration.set_fail_on_empty(value);
        }
        if let Some(tags) = self.read(INCLUDE_TAGS, parse_tags)? {
            configuration.set_include_tags(tags);
        }
        if let Some(tags) = self.read(EXCLUDE_TAGS, parse_tags)? {
            configuration.set_exclude_tags(tags);
        }
        if let Some(value) = self.read(DUMP_CONFIG, parse_bool)? {
            configuration.set_dump_config(value);
        }
        if let Some(value) = self.read(AUTOSCAN_DISABLE, parse_bool)? {
            configuration.set_autoscan_disabled(value);
        }

        let mut passthrough = Vec::new();
        for (var, value) in self.provider.vars() {
            let Some(key) = passthrough_key(&var) else {
                continue;
            };
            if key.as_str().starts_with(keys::RESERVED_PREFIX) {
                return Err(SourceError::InvalidValue {
                    key: var,
                    value,
                    reason: Cow::Owned(format!(
                        "`{key}` is reserved; use the typed variable instead"
                    )),
                });
            }
            passthrough.push((key, value));
        }
        passthrough.sort_by(|a: &(SettingKey, String), b| a.0.cmp(&b.0));
        for (key, value) in passthrough {
            configuration.set(key, SettingValue::Text(value));
        }
        Ok(())
    }
}
