use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{error::RegistryError, extension::Extension};

use super::Configuration;

/// 注册来源：编译期写入的基础扩展，或编译后叠加的临时扩展。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    Base,
    Overlay,
}

struct RegistryEntry {
    extension: Arc<dyn Extension>,
    origin: Origin,
}

/// 有序的扩展集合。
///
/// # 教案式说明
/// - **意图 (Why)**：注册顺序决定监听器、过滤器的调用顺序，因此使用 `Vec` 而非哈希集合；
/// - **逻辑 (How)**：读写锁仅在一次注册、注销或快照期间持有，拦截器在 `.await` 之前就已释放；
///   身份比较使用 [`core::ptr::addr_eq`]，只比较数据指针，不受 vtable 地址差异影响；
/// - **契约 (What)**：同一实例重复注册返回 [`RegistryError::Duplicate`]；
///   编译完成后移除 `Base` 条目返回 [`RegistryError::Sealed`]。
#[derive(Default)]
pub(crate) struct ExtensionRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
}

impl ExtensionRegistry {
    pub(crate) fn register(
        &self,
        extension: Arc<dyn Extension>,
        origin: Origin,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        if entries.iter().any(|entry| same_instance(&entry.extension, &extension)) {
            return Err(RegistryError::Duplicate {
                extension: extension.descriptor().name().to_owned(),
            });
        }
        entries.push(RegistryEntry { extension, origin });
        Ok(())
    }

    pub(crate) fn deregister(
        &self,
        extension: &Arc<dyn Extension>,
        sealed: bool,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let Some(position) = entries
            .iter()
            .position(|entry| same_instance(&entry.extension, extension))
        else {
            return Err(RegistryError::NotRegistered {
                extension: extension.descriptor().name().to_owned(),
            });
        };
        if sealed && entries[position].origin == Origin::Base {
            return Err(RegistryError::Sealed {
                extension: extension.descriptor().name().to_owned(),
            });
        }
        entries.remove(position);
        Ok(())
    }

    pub(crate) fn contains(&self, extension: &Arc<dyn Extension>) -> bool {
        self.entries
            .read()
            .iter()
            .any(|entry| same_instance(&entry.extension, extension))
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Extension>> {
        self.entries
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.extension))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// 丢弃 `len` 之后的全部条目，返回丢弃的数量。
    pub(crate) fn truncate(&self, len: usize) -> usize {
        let mut entries = self.entries.write();
        let dropped = entries.len().saturating_sub(len);
        entries.truncate(len);
        dropped
    }
}

fn same_instance(a: &Arc<dyn Extension>, b: &Arc<dyn Extension>) -> bool {
    core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// 一次作用域注册的 RAII 守卫。
///
/// # 教案式说明
/// - **意图 (Why)**：Spec 执行可能因失败、超时或 Future 被丢弃而提前结束；
///   把注销绑定到守卫的析构上，任何退出路径都会撤销本次注册；
/// - **逻辑 (How)**：守卫只记录自己注册的实例，按注册的逆序逐个注销；
///   [`ScopedRegistration::release`] 显式注销并返回收集到的错误，`Drop` 在未显式释放时兜底执行；
/// - **契约 (What)**：注销失败（例如实例已被其它路径移除）只记录 `warn` 日志并收集，
///   不会 panic，也不会覆盖执行路径上的原始错误；
/// - **风险 (Trade-offs)**：守卫持有 `Arc<Configuration>`，在守卫存活期间配置不会被释放。
#[must_use = "dropping the guard immediately deregisters the extensions"]
pub struct ScopedRegistration {
    configuration: Arc<Configuration>,
    extensions: Vec<Arc<dyn Extension>>,
    released: bool,
}

impl ScopedRegistration {
    pub(crate) fn new(configuration: Arc<Configuration>) -> Self {
        Self {
            configuration,
            extensions: Vec::new(),
            released: false,
        }
    }

    pub(crate) fn track(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    /// 本次注册的扩展，按注册顺序。
    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// 立即注销全部扩展，返回注销过程中遇到的错误。
    pub fn release(mut self) -> Vec<RegistryError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Vec<RegistryError> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut errors = Vec::new();
        while let Some(extension) = self.extensions.pop() {
            match self.configuration.deregister(&extension) {
                Ok(()) => debug!(
                    extension = extension.descriptor().name(),
                    "scoped extension deregistered"
                ),
                Err(err) => {
                    warn!(
                        extension = extension.descriptor().name(),
                        error = %err,
                        "failed to deregister scoped extension"
                    );
                    errors.push(err);
                }
            }
        }
        errors
    }
}

impl Drop for ScopedRegistration {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl core::fmt::Debug for ScopedRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedRegistration")
            .field("extensions", &self.extensions)
            .field("released", &self.released)
            .finish()
    }
}
