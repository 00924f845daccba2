use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    error::RegistryError,
    extension::{Extension, ExtensionScope},
    spec::{SpecTypeId, Tag},
};

use super::{
    ConfigurationSnapshot, IsolationMode, SettingKey, SettingValue, SpecExecutionOrder,
    TagExpression, TestCaseConfig, keys,
    registry::{ExtensionRegistry, Origin, ScopedRegistration},
    snapshot::ExtensionSnapshot,
};

/// 进程级运行时配置。
///
/// # 教案式说明
/// - **意图 (Why)**：编译阶段由多个配置源依次写入；编译完成后供所有 Spec 并发读取，
///   同时允许拦截器在单个 Spec 执行期间临时叠加扩展；
/// - **逻辑 (How)**：
///   - 设置表使用 `BTreeMap`，同键后写覆盖先写，迭代顺序稳定；
///   - 扩展集合见 [`ExtensionRegistry`]，记录每个条目是编译期写入还是编译后叠加；
///   - `sealed` 标志在编译成功后置位，此后设置写入被忽略并记录 `warn` 日志；
/// - **契约 (What)**：
///   - 通过 `Arc<Configuration>` 共享，所有方法只需 `&self`；
///   - 编译后注册的扩展属于叠加层，可随时注销；编译期注册的扩展不可注销；
///   - 锁只在单次读写期间持有，绝不跨越 `.await`。
#[derive(Default)]
pub struct Configuration {
    extensions: ExtensionRegistry,
    settings: RwLock<BTreeMap<SettingKey, SettingValue>>,
    sealed: AtomicBool,
}

/// 编译开始前的配置状态，见 [`Configuration::checkpoint`]。
pub(crate) struct Checkpoint {
    settings: BTreeMap<SettingKey, SettingValue>,
    extensions: usize,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("sealed", &self.is_sealed())
            .field("settings", &*self.settings.read())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建共享句柄的便捷方法。
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// 配置是否已完成编译。
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub(crate) fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// 记录编译前的设置表与扩展数量。
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            settings: self.settings(),
            extensions: self.extensions.len(),
        }
    }

    /// 撤销检查点之后的全部设置写入与扩展注册。
    ///
    /// - **契约 (What)**：只在未封存时生效；扩展按注册顺序追加，截断到检查点长度即可撤销。
    pub(crate) fn rollback(&self, checkpoint: Checkpoint) {
        if self.is_sealed() {
            warn!("configuration is sealed; rollback ignored");
            return;
        }
        let dropped = self.extensions.truncate(checkpoint.extensions);
        *self.settings.write() = checkpoint.settings;
        debug!(dropped_extensions = dropped, "configuration rolled back to checkpoint");
    }

    // ---- 设置表 ----

    /// 写入设置；编译完成后写入无效并返回 `false`。
    pub fn set(&self, key: SettingKey, value: impl Into<SettingValue>) -> bool {
        if self.is_sealed() {
            warn!(key = %key, "configuration is sealed; setting write ignored");
            return false;
        }
        let value = value.into();
        debug!(key = %key, ?value, "setting applied");
        self.settings.write().insert(key, value);
        true
    }

    pub fn get(&self, key: &SettingKey) -> Option<SettingValue> {
        self.settings.read().get(key).cloned()
    }

    pub fn contains(&self, key: &SettingKey) -> bool {
        self.settings.read().contains_key(key)
    }

    /// 全部设置的有序副本。
    pub fn settings(&self) -> BTreeMap<SettingKey, SettingValue> {
        self.settings.read().clone()
    }

    fn bool_setting(&self, key: &SettingKey) -> Option<bool> {
        self.typed(key, SettingValue::as_bool)
    }

    fn typed<T>(&self, key: &SettingKey, read: impl FnOnce(&SettingValue) -> Option<T>) -> Option<T> {
        let settings = self.settings.read();
        let value = settings.get(key)?;
        let typed = read(value);
        if typed.is_none() {
            debug!(key = %key, ?value, "setting has an unexpected kind; using default");
        }
        typed
    }

    fn parsed<T: core::str::FromStr>(&self, key: &SettingKey) -> Option<T> {
        let text = self.typed(key, |value| value.as_text().map(str::to_owned))?;
        match text.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                debug!(key = %key, value = %text, "setting cannot be parsed; using default");
                None
            }
        }
    }

    fn tags(&self, key: &SettingKey) -> BTreeSet<Tag> {
        self.typed(key, |value| {
            value.as_list().map(|items| {
                items
                    .iter()
                    .filter_map(SettingValue::as_text)
                    .map(|name| Tag::new(name.to_owned()))
                    .collect()
            })
        })
        .unwrap_or_default()
    }

    // ---- 内核设置的类型化访问器 ----

    /// 同时执行的 Spec 数量，至少为 1。
    pub fn parallelism(&self) -> usize {
        self.typed(&keys::PARALLELISM, SettingValue::as_integer)
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| *value > 0)
            .unwrap_or(1)
    }

    pub fn set_parallelism(&self, parallelism: usize) -> bool {
        let value = i64::try_from(parallelism).unwrap_or(i64::MAX);
        self.set(keys::PARALLELISM, value)
    }

    pub fn isolation_mode(&self) -> IsolationMode {
        self.parsed(&keys::ISOLATION_MODE).unwrap_or_default()
    }

    pub fn set_isolation_mode(&self, mode: IsolationMode) -> bool {
        self.set(keys::ISOLATION_MODE, mode.as_str())
    }

    pub fn spec_execution_order(&self) -> SpecExecutionOrder {
        self.parsed(&keys::SPEC_ORDER).unwrap_or_default()
    }

    pub fn set_spec_execution_order(&self, order: SpecExecutionOrder) -> bool {
        self.set(keys::SPEC_ORDER, order.as_str())
    }

    pub fn fail_on_ignored(&self) -> bool {
        self.bool_setting(&keys::FAIL_ON_IGNORED).unwrap_or(false)
    }

    pub fn set_fail_on_ignored(&self, enabled: bool) -> bool {
        self.set(keys::FAIL_ON_IGNORED, enabled)
    }

    pub fn fail_on_empty(&self) -> bool {
        self.bool_setting(&keys::FAIL_ON_EMPTY).unwrap_or(false)
    }

    pub fn set_fail_on_empty(&self, enabled: bool) -> bool {
        self.set(keys::FAIL_ON_EMPTY, enabled)
    }

    pub fn dump_config(&self) -> bool {
        self.bool_setting(&keys::DUMP_CONFIG).unwrap_or(false)
    }

    pub fn set_dump_config(&self, enabled: bool) -> bool {
        self.set(keys::DUMP_CONFIG, enabled)
    }

    pub fn autoscan_disabled(&self) -> bool {
        self.bool_setting(&keys::AUTOSCAN_DISABLED).unwrap_or(false)
    }

    pub fn set_autoscan_disabled(&self, disabled: bool) -> bool {
        self.set(keys::AUTOSCAN_DISABLED, disabled)
    }

    pub fn tag_expression(&self) -> TagExpression {
        TagExpression {
            include: self.tags(&keys::INCLUDE_TAGS),
            exclude: self.tags(&keys::EXCLUDE_TAGS),
        }
    }

    pub fn set_include_tags<I, S>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(keys::INCLUDE_TAGS, SettingValue::text_list(tags))
    }

    pub fn set_exclude_tags<I, S>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(keys::EXCLUDE_TAGS, SettingValue::text_list(tags))
    }

    /// 未显式声明参数的测试用例所使用的默认值。
    pub fn default_test_config(&self) -> TestCaseConfig {
        let defaults = TestCaseConfig::default();
        TestCaseConfig {
            timeout: self
                .typed(&keys::TIMEOUT, SettingValue::as_duration)
                .unwrap_or(defaults.timeout),
            invocation_timeout: self
                .typed(&keys::INVOCATION_TIMEOUT, SettingValue::as_duration)
                .or(defaults.invocation_timeout),
            invocations: self
                .typed(&keys::INVOCATIONS, SettingValue::as_integer)
                .and_then(|value| u32::try_from(value).ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.invocations),
            enabled: defaults.enabled,
        }
    }

    pub fn set_timeout(&self, timeout: Duration) -> bool {
        self.set(keys::TIMEOUT, timeout)
    }

    pub fn set_invocation_timeout(&self, timeout: Duration) -> bool {
        self.set(keys::INVOCATION_TIMEOUT, timeout)
    }

    pub fn set_invocations(&self, invocations: u32) -> bool {
        self.set(keys::INVOCATIONS, i64::from(invocations))
    }

    // ---- 扩展集合 ----

    /// 注册扩展。编译完成前进入基础层，之后进入叠加层。
    pub fn register(&self, extension: Arc<dyn Extension>) -> Result<(), RegistryError> {
        let origin = if self.is_sealed() {
            Origin::Overlay
        } else {
            Origin::Base
        };
        let name = extension.descriptor();
        self.extensions.register(extension, origin)?;
        debug!(extension = name.name(), ?origin, "extension registered");
        Ok(())
    }

    /// 注销扩展。
    pub fn deregister(&self, extension: &Arc<dyn Extension>) -> Result<(), RegistryError> {
        self.extensions.deregister(extension, self.is_sealed())
    }

    /// 批量注册并返回作用域守卫；任一注册失败时回滚已注册的部分。
    ///
    /// # 契约说明（What）
    /// - 成功时所有扩展都已可见，守卫析构或 [`ScopedRegistration::release`] 时按逆序注销；
    /// - 失败时返回第一个注册错误，本次调用注册过的扩展全部被撤销。
    pub fn register_scoped(
        self: &Arc<Self>,
        extensions: impl IntoIterator<Item = Arc<dyn Extension>>,
    ) -> Result<ScopedRegistration, RegistryError> {
        let mut guard = ScopedRegistration::new(Arc::clone(self));
        for extension in extensions {
            self.register(Arc::clone(&extension))?;
            guard.track(extension);
        }
        Ok(guard)
    }

    pub fn is_registered(&self, extension: &Arc<dyn Extension>) -> bool {
        self.extensions.contains(extension)
    }

    /// 当前全部扩展，按注册顺序。
    pub fn extensions(&self) -> Vec<Arc<dyn Extension>> {
        self.extensions.snapshot()
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// 对指定 Spec 可见的扩展：全局扩展与限定到该 Spec 的扩展，按注册顺序。
    pub fn extensions_for(&self, spec: &SpecTypeId) -> Vec<Arc<dyn Extension>> {
        self.extensions
            .snapshot()
            .into_iter()
            .filter(|extension| extension.scope().applies_to(spec))
            .collect()
    }

    /// 生成可序列化的配置快照。
    pub fn snapshot(&self) -> ConfigurationSnapshot {
        let extensions = self
            .extensions
            .snapshot()
            .iter()
            .map(|extension| {
                let scope = match extension.scope() {
                    ExtensionScope::Global => None,
                    ExtensionScope::Spec(spec) => Some(spec),
                };
                ExtensionSnapshot {
                    descriptor: extension.descriptor(),
                    spec: scope,
                    capabilities: extension.capabilities(),
                }
            })
            .collect();

        ConfigurationSnapshot {
            sealed: self.is_sealed(),
            settings: self.settings(),
            test_case_defaults: self.default_test_config(),
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{ExtensionDescriptor, SpecScopedExtension};
    use tracing_test::traced_test;

    struct Named(&'static str);

    impl Extension for Named {
        fn descriptor(&self) -> ExtensionDescriptor {
            ExtensionDescriptor::new(self.0, "")
        }
    }

    fn ext(name: &'static str) -> Arc<dyn Extension> {
        Arc::new(Named(name))
    }

    #[test]
    fn later_writes_override_earlier_ones() {
        let config = Configuration::new();
        assert!(config.set_parallelism(2));
        assert!(config.set_parallelism(8));
        assert_eq!(config.parallelism(), 8);
    }

    #[test]
    fn typed_getters_fall_back_on_wrong_kind() {
        let config = Configuration::new();
        config.set(keys::PARALLELISM, "eight");
        config.set(keys::ISOLATION_MODE, "sideways");
        assert_eq!(config.parallelism(), 1);
        assert_eq!(config.isolation_mode(), IsolationMode::SingleInstance);
    }

    #[test]
    #[traced_test]
    fn sealed_configuration_ignores_setting_writes() {
        let config = Configuration::new();
        config.set_fail_on_empty(true);
        config.seal();

        assert!(!config.set_fail_on_empty(false));
        assert!(config.fail_on_empty());
        assert!(logs_contain("setting write ignored"));
    }

    #[test]
    fn rollback_restores_settings_and_drops_later_extensions() {
        let config = Configuration::new();
        config.set_parallelism(2);
        let kept = ext("kept");
        config.register(Arc::clone(&kept)).expect("检查点之前注册");

        let checkpoint = config.checkpoint();
        config.set_parallelism(8);
        config.set_fail_on_empty(true);
        let dropped = ext("dropped");
        config.register(Arc::clone(&dropped)).expect("检查点之后注册");
        config.rollback(checkpoint);

        assert_eq!(config.parallelism(), 2);
        assert!(!config.contains(&keys::FAIL_ON_EMPTY));
        assert!(config.is_registered(&kept));
        assert!(!config.is_registered(&dropped));
        config.register(dropped).expect("回滚后可再次注册同一实例");
    }

    #[test]
    fn debug_output_summarizes_state() {
        let config = Configuration::new();
        config.set_parallelism(3);
        config.register(ext("one")).expect("注册");

        let rendered = format!("{config:?}");
        assert!(rendered.starts_with("Configuration"));
        assert!(rendered.contains("sealed: false"));
        assert!(rendered.contains("extensions: 1"));
    }

    #[test]
    fn duplicate_instances_are_rejected_but_equal_values_are_not() {
        let config = Configuration::new();
        let first = ext("same");
        config.register(Arc::clone(&first)).expect("首次注册");

        let err = config
            .register(Arc::clone(&first))
            .expect_err("同一实例不可重复注册");
        assert_eq!(
            err,
            RegistryError::Duplicate {
                extension: "same".to_owned()
            }
        );
        config.register(ext("same")).expect("不同实例可注册");
        assert_eq!(config.extension_count(), 2);
    }

    #[test]
    fn base_extensions_cannot_be_removed_after_seal() {
        let config = Arc::new(Configuration::new());
        let base = ext("base");
        config.register(Arc::clone(&base)).expect("编译期注册");
        config.seal();

        assert!(matches!(
            config.deregister(&base),
            Err(RegistryError::Sealed { .. })
        ));

        let overlay = ext("overlay");
        config.register(Arc::clone(&overlay)).expect("叠加注册");
        config.deregister(&overlay).expect("叠加层可注销");
        assert!(matches!(
            config.deregister(&overlay),
            Err(RegistryError::NotRegistered { .. })
        ));
    }

    #[test]
    fn scoped_registration_rolls_back_on_partial_failure() {
        let config = Arc::new(Configuration::new());
        let existing = ext("existing");
        config.register(Arc::clone(&existing)).expect("预先注册");

        let fresh = ext("fresh");
        let result = config.register_scoped([Arc::clone(&fresh), Arc::clone(&existing)]);
        assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
        assert!(!config.is_registered(&fresh), "失败时必须回滚已注册的扩展");
        assert!(config.is_registered(&existing));
    }

    #[test]
    fn scoped_guard_deregisters_on_drop() {
        let config = Arc::new(Configuration::new());
        let a = ext("a");
        let b = ext("b");
        {
            let guard = config
                .register_scoped([Arc::clone(&a), Arc::clone(&b)])
                .expect("作用域注册");
            assert_eq!(guard.extensions().len(), 2);
            assert_eq!(config.extension_count(), 2);
        }
        assert_eq!(config.extension_count(), 0);
    }

    #[test]
    #[traced_test]
    fn release_collects_errors_for_already_removed_extensions() {
        let config = Arc::new(Configuration::new());
        let a = ext("a");
        let guard = config
            .register_scoped([Arc::clone(&a)])
            .expect("作用域注册");
        config.deregister(&a).expect("外部提前注销");

        let errors = guard.release();
        assert_eq!(
            errors,
            vec![RegistryError::NotRegistered {
                extension: "a".to_owned()
            }]
        );
        assert!(logs_contain("failed to deregister scoped extension"));
    }

    #[test]
    fn extensions_for_filters_by_scope_in_registration_order() {
        let config = Configuration::new();
        let spec_a = SpecTypeId::from_static("SpecA");
        let spec_b = SpecTypeId::from_static("SpecB");
        config.register(ext("global")).expect("注册");
        config
            .register(Arc::new(SpecScopedExtension::new(spec_a.clone(), ext("only-a"))))
            .expect("注册");
        config
            .register(Arc::new(SpecScopedExtension::new(spec_b.clone(), ext("only-b"))))
            .expect("注册");

        let visible: Vec<String> = config
            .extensions_for(&spec_a)
            .iter()
            .map(|e| e.descriptor().name().to_owned())
            .collect();
        assert_eq!(visible, ["global", "only-a"]);
    }

    #[test]
    fn default_test_config_reads_overrides() {
        let config = Configuration::new();
        config.set_timeout(Duration::from_secs(5));
        config.set_invocations(3);

        let defaults = config.default_test_config();
        assert_eq!(defaults.timeout, Duration::from_secs(5));
        assert_eq!(defaults.invocations, 3);
        assert_eq!(defaults.invocation_timeout, None);
    }
}
