//! # configuration 模块说明
//!
//! ## 角色定位（Why）
//! - 承载编译结果：有序扩展集合、命名设置表以及测试用例默认参数；
//! - 编译期可写，编译完成后设置表只读，扩展集合只允许作用域叠加。
//!
//! ## 模块结构（How）
//! - [`setting`]：设置键与强类型设置值；
//! - [`keys`]：内核识别的设置键常量；
//! - `defaults`：测试用例默认参数、隔离模式、执行顺序、标签表达式；
//! - `registry`：扩展集合与作用域注册守卫；
//! - `snapshot`：可序列化快照，用于配置转储。

mod defaults;
pub mod keys;
mod model;
mod registry;
pub mod setting;
mod snapshot;

pub use defaults::{IsolationMode, SpecExecutionOrder, TagExpression, TestCaseConfig};
pub use model::Configuration;
pub use registry::ScopedRegistration;
pub use setting::{SettingKey, SettingValue};
pub use snapshot::{ConfigurationSnapshot, ExtensionSnapshot};
