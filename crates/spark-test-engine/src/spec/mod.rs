//! Spec 句柄与声明式元数据。
//!
//! # 设计背景（Why）
//! - 执行内核不关心 Spec 如何被发现，只需要一个不可变的句柄：类型标识加上一组注解；
//! - 注解解析由外部协作方完成，这里只保留解析后的结构化结果，拦截器据此决定行为。
//!
//! # 契约说明（What）
//! - [`SpecRef`] 克隆成本为一次 `Arc` 引用计数递增，可在并发续体之间自由传递；
//! - 注解按声明顺序保存，[`SpecRef::annotation`] 返回同类注解中的第一个。

mod result;

use std::{borrow::Cow, fmt, sync::Arc};

use serde::Serialize;

use crate::extension::FactoryId;

pub use result::{SpecResults, TestCase, TestResult};

/// Spec 的类型标识。
///
/// 相等性按字符串比较，通常取自 `core::any::type_name`。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SpecTypeId(Cow<'static, str>);

impl SpecTypeId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// 以 Rust 类型名作为 Spec 标识。
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_static(core::any::type_name::<T>())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpecTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 标签，用于按标签表达式筛选 Spec。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 解析后的声明式注解。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    /// 声明在执行该 Spec 期间需要应用的扩展工厂，按声明顺序。
    ApplyExtension { factories: Vec<FactoryId> },
    /// Spec 被整体忽略。
    Ignored { reason: Option<String> },
    /// Spec 携带的标签。
    Tags(Vec<Tag>),
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::ApplyExtension { .. } => AnnotationKind::ApplyExtension,
            Self::Ignored { .. } => AnnotationKind::Ignored,
            Self::Tags(_) => AnnotationKind::Tags,
        }
    }
}

/// 注解种类，用于 [`SpecRef::annotation`] 查找。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    ApplyExtension,
    Ignored,
    Tags,
}

/// Spec 的元数据集合。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecMetadata {
    annotations: Vec<Annotation>,
}

impl SpecMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn find(&self, kind: AnnotationKind) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.kind() == kind)
    }

    /// 汇总所有 `Tags` 注解中的标签。
    pub fn tags(&self) -> Vec<Tag> {
        self.annotations
            .iter()
            .filter_map(|annotation| match annotation {
                Annotation::Tags(tags) => Some(tags.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// 不可变的 Spec 句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：在拦截链中传递时只需共享同一份元数据，不应产生深拷贝；
/// - **契约 (What)**：创建后不可修改；两个句柄的 `id` 相同即视为同一 Spec 类型，
///   但同一类型的多次并发执行各自持有独立的扩展注册。
#[derive(Clone, Debug)]
pub struct SpecRef {
    id: SpecTypeId,
    metadata: Arc<SpecMetadata>,
}

impl SpecRef {
    pub fn new(id: SpecTypeId, metadata: SpecMetadata) -> Self {
        Self {
            id,
            metadata: Arc::new(metadata),
        }
    }

    /// 以 Rust 类型构造句柄。
    pub fn of<T: ?Sized + 'static>(metadata: SpecMetadata) -> Self {
        Self::new(SpecTypeId::of::<T>(), metadata)
    }

    pub fn id(&self) -> &SpecTypeId {
        &self.id
    }

    pub fn metadata(&self) -> &SpecMetadata {
        &self.metadata
    }

    pub fn annotation(&self, kind: AnnotationKind) -> Option<&Annotation> {
        self.metadata.find(kind)
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.metadata.tags()
    }
}
