//! 内核识别的设置键。
//!
//! 未列在此处的键同样可以写入设置表，由扩展自行解释。

use super::SettingKey;

/// 内核保留的命名空间；只能通过类型化入口写入。
pub const RESERVED_PREFIX: &str = "spark.test.";

/// 同时执行的 Spec 数量上限。
pub const PARALLELISM: SettingKey = SettingKey::from_static("spark.test.parallelism");
/// 单个测试用例的默认总超时。
pub const TIMEOUT: SettingKey = SettingKey::from_static("spark.test.timeout");
/// 单次调用的默认超时。
pub const INVOCATION_TIMEOUT: SettingKey = SettingKey::from_static("spark.test.invocation_timeout");
/// 每个测试用例的默认调用次数。
pub const INVOCATIONS: SettingKey = SettingKey::from_static("spark.test.invocations");
pub const ISOLATION_MODE: SettingKey = SettingKey::from_static("spark.test.isolation_mode");
pub const SPEC_ORDER: SettingKey = SettingKey::from_static("spark.test.spec_order");
pub const FAIL_ON_IGNORED: SettingKey = SettingKey::from_static("spark.test.fail_on_ignored");
pub const FAIL_ON_EMPTY: SettingKey = SettingKey::from_static("spark.test.fail_on_empty");
pub const INCLUDE_TAGS: SettingKey = SettingKey::from_static("spark.test.tags.include");
pub const EXCLUDE_TAGS: SettingKey = SettingKey::from_static("spark.test.tags.exclude");
/// 编译完成后以 JSON 输出配置快照。
pub const DUMP_CONFIG: SettingKey = SettingKey::from_static("spark.test.dump_config");
/// 跳过自动发现阶段。
pub const AUTOSCAN_DISABLED: SettingKey = SettingKey::from_static("spark.test.autoscan.disabled");
/// 平台默认值阶段写入的平台名称。
pub const PLATFORM: SettingKey = SettingKey::from_static("spark.test.platform");
