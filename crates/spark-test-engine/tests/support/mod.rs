#![allow(dead_code)]
//! 集成测试共享的记录型桩实现。
//!
//! # 教案级导览
//! - **Why**：配置源、拦截器、监听器、扩展工厂的测试都需要“记录调用顺序、按需失败”的桩，
//!   集中实现避免各测试文件重复；
//! - **How**：所有桩把事件写入 [`shared_vec`] 返回的共享向量，测试结束后一次性断言；
//! - **What**：桩本身不做任何断言，只负责记录与注入失败。

use std::{
    borrow::Cow,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use spark_test_engine::{
    Annotation, ConfigurationSource, Continuation, Extension, ExtensionDescriptor,
    ExtensionFactory, FactoryId, FactoryRegistry, InterceptorDescriptor, NextPolicy,
    ProjectConfig, Result, SettingKey, SettingValue, SourceError, SpecListener, SpecMetadata,
    SpecRef, SpecRefInterceptor, SpecResults, SpecTypeId, TestCase, TestResult, async_trait,
    configuration::Configuration, continuation, error::cause,
};

pub type Log = Arc<Mutex<Vec<String>>>;

/// 构造线程安全的共享向量。
pub fn shared_vec<T>() -> Arc<Mutex<Vec<T>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// 记录调用并可写入设置、可按开关失败的配置源。
#[derive(Clone)]
pub struct RecordingSource {
    pub name: &'static str,
    pub log: Log,
    pub writes: Vec<(SettingKey, SettingValue)>,
    pub fail: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
    pub delay: Option<Duration>,
}

impl RecordingSource {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            writes: Vec::new(),
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn writing(mut self, key: SettingKey, value: impl Into<SettingValue>) -> Self {
        self.writes.push((key, value.into()));
        self
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConfigurationSource for RecordingSource {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.name)
    }

    fn apply(&self, configuration: &Configuration) -> core::result::Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(self.name.to_owned());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::with_cause(
                format!("{} exploded", self.name),
                cause("boom"),
            ));
        }
        for (key, value) in &self.writes {
            configuration.set(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// 仅设置并行度、并记录应用顺序的项目配置。
pub struct ParallelismProject {
    pub name: &'static str,
    pub parallelism: usize,
    pub log: Log,
    pub extensions: Vec<Arc<dyn Extension>>,
}

impl ProjectConfig for ParallelismProject {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.name)
    }

    fn parallelism(&self) -> Option<usize> {
        self.log.lock().push(self.name.to_owned());
        Some(self.parallelism)
    }

    fn extensions(&self) -> core::result::Result<Vec<Arc<dyn Extension>>, SourceError> {
        Ok(self.extensions.clone())
    }
}

/// 记录 before/after 的拦截器；after 在内层失败时同样记录。
pub struct RecordingInterceptor {
    pub label: &'static str,
    pub log: Log,
}

impl RecordingInterceptor {
    pub fn shared(label: &'static str, log: &Log) -> Arc<dyn SpecRefInterceptor> {
        Arc::new(Self {
            label,
            log: Arc::clone(log),
        })
    }
}

#[async_trait]
impl SpecRefInterceptor for RecordingInterceptor {
    fn descriptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor::new(self.label, "records before/after", NextPolicy::ExactlyOnce)
    }

    async fn intercept(&self, spec: SpecRef, next: Continuation) -> Result<SpecResults> {
        self.log.lock().push(format!("{}-before", self.label));
        let result = next(spec).await;
        self.log.lock().push(format!("{}-after", self.label));
        result
    }
}

/// 记录 `terminal` 并返回单个通过用例的终端续体。
pub fn passing_terminal(log: &Log) -> Continuation {
    let log = Arc::clone(log);
    continuation(move |spec: SpecRef| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push("terminal".to_owned());
            Ok(SpecResults::new().with(TestCase::new(spec.id().clone(), "works"), TestResult::Passed))
        }
    })
}

/// 记录 `terminal` 并以 Spec 级错误失败的终端续体。
pub fn failing_terminal(log: &Log) -> Continuation {
    let log = Arc::clone(log);
    continuation(move |spec: SpecRef| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push("terminal".to_owned());
            Err(spark_test_engine::ExecutionError::spec(
                spec.id().clone(),
                "assertion failed",
            ))
        }
    })
}

/// 带名称的空扩展。
pub struct NamedExtension(pub &'static str);

impl Extension for NamedExtension {
    fn descriptor(&self) -> ExtensionDescriptor {
        ExtensionDescriptor::new(self.0, "test extension")
    }
}

/// 产出 [`NamedExtension`] 的工厂。
pub struct NamedFactory(pub &'static str);

impl ExtensionFactory for NamedFactory {
    fn extension(&self, _spec: &SpecRef) -> Option<Arc<dyn Extension>> {
        Some(Arc::new(NamedExtension(self.0)))
    }
}

/// 不为任何 Spec 提供扩展的工厂。
pub struct EmptyFactory;

impl ExtensionFactory for EmptyFactory {
    fn extension(&self, _spec: &SpecRef) -> Option<Arc<dyn Extension>> {
        None
    }
}

/// 以构造函数登记工厂，并统计实例化次数。
pub fn counting_registry(names: &[&'static str]) -> (FactoryRegistry, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = FactoryRegistry::new();
    for &name in names {
        let counter = Arc::clone(&counter);
        registry
            .register_constructor(FactoryId::from_static(name), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(NamedFactory(name)) as Arc<dyn ExtensionFactory>)
            })
            .expect("测试工厂名称不应重复");
    }
    (registry, counter)
}

/// 声明了扩展工厂的 Spec。
pub fn spec_with_factories(name: &'static str, factories: &[&'static str]) -> SpecRef {
    SpecRef::new(
        SpecTypeId::from_static(name),
        SpecMetadata::new().with(Annotation::ApplyExtension {
            factories: factories.iter().copied().map(FactoryId::from_static).collect(),
        }),
    )
}

pub fn plain_spec(name: &'static str) -> SpecRef {
    SpecRef::new(SpecTypeId::from_static(name), SpecMetadata::new())
}

/// 记录 prepare/finalize 的监听器扩展，可按开关在准备阶段失败。
pub struct RecordingListener {
    pub label: &'static str,
    pub log: Log,
    pub fail_prepare: bool,
    pub fail_finalize: bool,
}

impl RecordingListener {
    pub fn shared(label: &'static str, log: &Log) -> Arc<dyn Extension> {
        Arc::new(Self {
            label,
            log: Arc::clone(log),
            fail_prepare: false,
            fail_finalize: false,
        })
    }
}

#[async_trait]
impl SpecListener for RecordingListener {
    async fn prepare_spec(&self, spec: &SpecRef) -> core::result::Result<(), spark_test_engine::ErrorCause> {
        self.log
            .lock()
            .push(format!("{}-prepare:{}", self.label, spec.id()));
        if self.fail_prepare {
            return Err(cause("listener refused"));
        }
        Ok(())
    }

    async fn finalize_spec(
        &self,
        spec: &SpecRef,
        results: &Result<SpecResults>,
    ) -> core::result::Result<(), spark_test_engine::ErrorCause> {
        let outcome = if results.is_ok() { "ok" } else { "err" };
        self.log
            .lock()
            .push(format!("{}-finalize:{}:{outcome}", self.label, spec.id()));
        if self.fail_finalize {
            return Err(cause("finalize failed"));
        }
        Ok(())
    }
}

impl Extension for RecordingListener {
    fn descriptor(&self) -> ExtensionDescriptor {
        ExtensionDescriptor::new(self.label, "recording listener")
    }

    fn as_listener(&self) -> Option<&dyn SpecListener> {
        Some(self)
    }
}
