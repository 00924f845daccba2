use std::{borrow::Cow, fmt, time::Duration};

use serde::Serialize;

/// 设置项的稳定标识符。
///
/// ## 设计目的（Why）
/// - 以点分命名（例如 `spark.test.parallelism`）区分内核设置与扩展自定义设置；
/// - 内置键以 `const` 形式声明，避免散落的字符串字面量。
///
/// ## 契约定义（What）
/// - 比较与排序按完整字符串进行，`BTreeMap` 中的迭代顺序因此稳定；
/// - 不校验命名格式，由调用方保证可读性。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SettingKey(Cow<'static, str>);

impl SettingKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for SettingKey {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// 设置值。
///
/// ### 设计目标（Why）
/// - 各配置源产出的覆盖值类型有限，用强类型枚举承载可以在读取端直接匹配，省去重复解析；
/// - 序列化采用 `kind`/`value` 标签表示，便于配置转储时人工比对。
///
/// ### 契约定义（What）
/// - 访问器只在变体匹配时返回 `Some`，不做跨类型转换（`Integer` 不会被读成 `Duration`）。
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Duration(Duration),
    List(Vec<SettingValue>),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SettingValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// 以文本列表构造 `List` 值。
    pub fn text_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Duration> for SettingValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_do_not_coerce_between_kinds() {
        let value = SettingValue::Integer(30);
        assert_eq!(value.as_integer(), Some(30));
        assert_eq!(value.as_duration(), None);
        assert_eq!(value.as_text(), None);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let value = SettingValue::text_list(["fast", "db"]);
        let json = serde_json::to_value(&value).expect("序列化不应失败");
        assert_eq!(json["kind"], "list");
        assert_eq!(json["value"][1]["kind"], "text");
        assert_eq!(json["value"][1]["value"], "db");
    }
}
