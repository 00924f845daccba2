//! # engine 模块说明
//!
//! ## 角色定位（Why）
//! - 把配置编译与拦截链串成一次完整的测试运行：先初始化配置，再为每个 Spec 调用组合后的续体；
//! - 配置编译失败只报告一次，并且不执行任何 Spec，与单个 Spec 的失败区分开。
//!
//! ## 契约（What）
//! - 同时执行的 Spec 数量不超过配置中的并行度；报告中的顺序与执行顺序设置一致；
//! - 单个 Spec 的失败只记录在它自己的 [`SpecOutcome`] 中，不影响其它 Spec。

use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::{debug, error, info};

use crate::{
    Result,
    compiler::{ConfigCompiler, ProjectConfig},
    configuration::{Configuration, SpecExecutionOrder},
    error::{ConfigurationError, ExecutionError},
    extension::{AnnotationResolver, FactoryInstantiator, FactoryRegistry, MetadataResolver},
    interceptor::{Continuation, InterceptorChain, SpecRefInterceptor},
    spec::{AnnotationKind, SpecRef, SpecResults, SpecTypeId},
};

/// 单个 Spec 的执行结果。
#[derive(Clone, Debug)]
pub struct SpecOutcome {
    pub spec: SpecTypeId,
    /// Spec 带有 `Ignored` 注解。
    pub ignored: bool,
    pub result: Result<SpecResults>,
}

impl SpecOutcome {
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(results) => results.has_failures(),
            Err(_) => true,
        }
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.result.as_ref().err()
    }
}

/// 一次运行的汇总报告。
#[derive(Clone, Debug)]
pub struct EngineReport {
    outcomes: Vec<SpecOutcome>,
    fail_on_ignored: bool,
    fail_on_empty: bool,
}

impl EngineReport {
    pub fn outcomes(&self) -> &[SpecOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, spec: &SpecTypeId) -> Option<&SpecOutcome> {
        self.outcomes.iter().find(|o| &o.spec == spec)
    }

    /// 全部 Spec 产出的测试用例数量。
    pub fn test_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(SpecResults::len)
            .sum()
    }

    pub fn failed_specs(&self) -> Vec<&SpecTypeId> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| &o.spec)
            .collect()
    }

    /// 被忽略的 Spec 数量加上被跳过的用例数量。
    pub fn ignored_count(&self) -> usize {
        let specs = self.outcomes.iter().filter(|o| o.ignored).count();
        let cases: usize = self
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(SpecResults::skipped)
            .sum();
        specs + cases
    }

    /// 是否整体成功：无失败；开启相应设置时，还要求没有忽略项、至少有一个用例。
    pub fn is_success(&self) -> bool {
        if self.outcomes.iter().any(SpecOutcome::is_failure) {
            return false;
        }
        if self.fail_on_ignored && self.ignored_count() > 0 {
            return false;
        }
        if self.fail_on_empty && self.test_count() == 0 {
            return false;
        }
        true
    }
}

/// 测试引擎。
///
/// # 教案式说明
/// - **意图 (Why)**：作为执行内核的调用方，示范“初始化一次、每个 Spec 走一遍拦截链”的使用方式；
/// - **逻辑 (How)**：
///   1. [`ConfigCompiler::initialize`] 编译配置，失败时记录一次 `error` 日志并返回；
///   2. 以 [`InterceptorChain::standard_entries`] 加上自定义拦截器装配链路；
///   3. 按执行顺序设置排序 Spec，以并行度为上限并发执行，保持报告顺序；
/// - **契约 (What)**：`run` 可以被多次调用，配置只在第一次成功时编译。
pub struct TestEngine {
    configuration: Arc<Configuration>,
    compiler: ConfigCompiler,
    project_configs: Vec<Arc<dyn ProjectConfig>>,
    resolver: Arc<dyn MetadataResolver>,
    instantiator: Arc<dyn FactoryInstantiator>,
    interceptors: Vec<(i32, Arc<dyn SpecRefInterceptor>)>,
}

impl TestEngine {
    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder::default()
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// 编译配置（至多一次）并装配拦截链。
    pub fn prepare(&self, terminal: Continuation) -> core::result::Result<Continuation, ConfigurationError> {
        let configuration = self
            .compiler
            .initialize(&self.configuration, &self.project_configs)
            .inspect_err(|err| error!(error = %err, "configuration compilation failed; no spec will run"))?;

        let mut entries = InterceptorChain::standard_entries(
            &configuration,
            Arc::clone(&self.resolver),
            Arc::clone(&self.instantiator),
        );
        entries.extend(self.interceptors.iter().cloned());
        let chain = InterceptorChain::assemble(entries);
        debug!(chain = ?chain, "interceptor chain assembled");
        Ok(chain.into_continuation(terminal))
    }

    /// 执行一组 Spec。
    pub async fn run(
        &self,
        specs: Vec<SpecRef>,
        terminal: Continuation,
    ) -> core::result::Result<EngineReport, ConfigurationError> {
        let continuation = self.prepare(terminal)?;
        let configuration = &self.configuration;

        let mut specs = specs;
        if configuration.spec_execution_order() == SpecExecutionOrder::Lexicographic {
            specs.sort_by(|a, b| a.id().cmp(b.id()));
        }
        let parallelism = configuration.parallelism();
        info!(specs = specs.len(), parallelism, "running specs");

        let outcomes: Vec<SpecOutcome> = stream::iter(specs.into_iter().map(|spec| {
            let continuation = Arc::clone(&continuation);
            async move {
                let id = spec.id().clone();
                let ignored = spec.annotation(AnnotationKind::Ignored).is_some();
                let result = continuation(spec).await;
                match &result {
                    Ok(results) => debug!(spec = %id, tests = results.len(), "spec completed"),
                    Err(err) => error!(spec = %id, error = %err, "spec failed"),
                }
                SpecOutcome {
                    spec: id,
                    ignored,
                    result,
                }
            }
        }))
        .buffered(parallelism)
        .collect()
        .await;

        let report = EngineReport {
            outcomes,
            fail_on_ignored: configuration.fail_on_ignored(),
            fail_on_empty: configuration.fail_on_empty(),
        };
        info!(
            specs = report.outcomes.len(),
            tests = report.test_count(),
            failed = report.failed_specs().len(),
            success = report.is_success(),
            "run finished"
        );
        Ok(report)
    }
}

/// [`TestEngine`] 的构建器。
#[derive(Default)]
pub struct TestEngineBuilder {
    configuration: Option<Arc<Configuration>>,
    compiler: Option<ConfigCompiler>,
    project_configs: Vec<Arc<dyn ProjectConfig>>,
    resolver: Option<Arc<dyn MetadataResolver>>,
    instantiator: Option<Arc<dyn FactoryInstantiator>>,
    interceptors: Vec<(i32, Arc<dyn SpecRefInterceptor>)>,
}

impl TestEngineBuilder {
    pub fn configuration(mut self, configuration: Arc<Configuration>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn compiler(mut self, compiler: ConfigCompiler) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn project_config(mut self, config: Arc<dyn ProjectConfig>) -> Self {
        self.project_configs.push(config);
        self
    }

    pub fn metadata_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn factories(mut self, instantiator: Arc<dyn FactoryInstantiator>) -> Self {
        self.instantiator = Some(instantiator);
        self
    }

    /// 追加自定义拦截器；优先级规则同 [`InterceptorChain::assemble`]。
    pub fn interceptor(mut self, priority: i32, interceptor: Arc<dyn SpecRefInterceptor>) -> Self {
        self.interceptors.push((priority, interceptor));
        self
    }

    pub fn build(self) -> TestEngine {
        TestEngine {
            configuration: self.configuration.unwrap_or_else(Configuration::shared),
            compiler: self.compiler.unwrap_or_default(),
            project_configs: self.project_configs,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(AnnotationResolver)),
            instantiator: self
                .instantiator
                .unwrap_or_else(|| Arc::new(FactoryRegistry::new())),
            interceptors: self.interceptors,
        }
    }
}
