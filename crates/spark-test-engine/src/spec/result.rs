use std::{collections::BTreeMap, fmt};

use crate::error::ErrorCause;

use super::SpecTypeId;

/// Spec 中的单个测试用例。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCase {
    spec: SpecTypeId,
    name: String,
}

impl TestCase {
    pub fn new(spec: SpecTypeId, name: impl Into<String>) -> Self {
        Self {
            spec,
            name: name.into(),
        }
    }

    pub fn spec(&self) -> &SpecTypeId {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.spec, self.name)
    }
}

/// 单个测试用例的结果。
///
/// `Failed` 表示断言不成立；`Errored` 表示用例在到达断言之前就出现了错误。
#[derive(Clone, Debug)]
pub enum TestResult {
    Passed,
    Failed(ErrorCause),
    Skipped(Option<String>),
    Errored(ErrorCause),
}

impl TestResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// `Failed` 或 `Errored`。
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Errored(_))
    }
}

/// 一次 Spec 执行产出的 `TestCase → TestResult` 映射，按用例排序。
#[derive(Clone, Debug, Default)]
pub struct SpecResults(BTreeMap<TestCase, TestResult>);

impl SpecResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, case: TestCase, result: TestResult) -> Option<TestResult> {
        self.0.insert(case, result)
    }

    pub fn with(mut self, case: TestCase, result: TestResult) -> Self {
        self.0.insert(case, result);
        self
    }

    pub fn get(&self, case: &TestCase) -> Option<&TestResult> {
        self.0.get(case)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TestCase, &TestResult)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.0.values().any(TestResult::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.0.values().filter(|r| r.is_skipped()).count()
    }
}

impl FromIterator<(TestCase, TestResult)> for SpecResults {
    fn from_iter<I: IntoIterator<Item = (TestCase, TestResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SpecResults {
    type Item = (TestCase, TestResult);
    type IntoIter = std::collections::btree_map::IntoIter<TestCase, TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
