use std::{collections::BTreeSet, fmt, str::FromStr, time::Duration};

use serde::Serialize;

use crate::spec::Tag;

/// 测试用例未显式声明时使用的默认参数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TestCaseConfig {
    /// 单个用例全部调用的总超时。
    pub timeout: Duration,
    /// 单次调用的超时；`None` 表示仅受总超时约束。
    pub invocation_timeout: Option<Duration>,
    /// 每个用例的调用次数，至少为 1。
    pub invocations: u32,
    pub enabled: bool,
}

impl TestCaseConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
}

impl Default for TestCaseConfig {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            invocation_timeout: None,
            invocations: 1,
            enabled: true,
        }
    }
}

/// Spec 实例的隔离方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// 所有测试用例共享一个 Spec 实例。
    #[default]
    SingleInstance,
    /// 每个叶子用例使用独立实例。
    InstancePerLeaf,
    /// 每个用例（含容器）使用独立实例。
    InstancePerTest,
}

impl IsolationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleInstance => "single_instance",
            Self::InstancePerLeaf => "instance_per_leaf",
            Self::InstancePerTest => "instance_per_test",
        }
    }
}

impl FromStr for IsolationMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single_instance" | "singleinstance" => Ok(Self::SingleInstance),
            "instance_per_leaf" | "instanceperleaf" => Ok(Self::InstancePerLeaf),
            "instance_per_test" | "instancepertest" => Ok(Self::InstancePerTest),
            _ => Err("expected single_instance, instance_per_leaf or instance_per_test"),
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spec 的执行顺序。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecExecutionOrder {
    /// 保持调用方提供的顺序。
    #[default]
    Declared,
    /// 按 Spec 类型标识的字典序。
    Lexicographic,
}

impl SpecExecutionOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Declared => "declared",
            Self::Lexicographic => "lexicographic",
        }
    }
}

impl FromStr for SpecExecutionOrder {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "declared" => Ok(Self::Declared),
            "lexicographic" => Ok(Self::Lexicographic),
            _ => Err("expected declared or lexicographic"),
        }
    }
}

/// 标签表达式：包含集合与排除集合。
///
/// # 契约说明（What）
/// - 排除优先：Spec 只要携带任一排除标签即被拒绝；
/// - 包含集合为空时不限制；非空时 Spec 至少携带其中一个标签。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TagExpression {
    pub include: BTreeSet<Tag>,
    pub exclude: BTreeSet<Tag>,
}

impl TagExpression {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn allows(&self, tags: &[Tag]) -> bool {
        if tags.iter().any(|tag| self.exclude.contains(tag)) {
            return false;
        }
        self.include.is_empty() || tags.iter().any(|tag| self.include.contains(tag))
    }
}
