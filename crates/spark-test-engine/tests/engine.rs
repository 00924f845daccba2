//! `TestEngine` 的端到端测试。
//!
//! # 教案级导览
//! - **Why**：引擎把配置编译与拦截链串起来，需要验证两者在一次完整运行中的协作；
//! - **How**：所有配置源替换为可控实现，避免读取真实进程环境；终端续体记录执行顺序与并发度；
//! - **What**：覆盖并行度上限、配置失败不执行任何 Spec、报告判定、执行顺序与单 Spec 失败隔离。

mod support;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use spark_test_engine::{
    Annotation, ConfigCompiler, ConfigurationSource, Continuation, ExecutionError, NoopSource,
    SpecMetadata, SpecRef, SpecResults, SpecTypeId, TestCase, TestEngine, TestResult,
    configuration::keys, continuation,
};

use support::{
    ParallelismProject, RecordingSource, counting_registry, entries, passing_terminal, plain_spec,
    shared_vec, spec_with_factories,
};

fn quiet_compiler(environment: impl ConfigurationSource + 'static) -> ConfigCompiler {
    ConfigCompiler::new()
        .with_platform(NoopSource)
        .with_environment(environment)
        .with_autoscan(NoopSource)
}

fn ignored_spec(name: &'static str) -> SpecRef {
    SpecRef::new(
        SpecTypeId::from_static(name),
        SpecMetadata::new().with(Annotation::Ignored { reason: None }),
    )
}

/// 统计同时处于终端内的 Spec 数量并记录峰值。
fn gauge_terminal(current: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Continuation {
    let current = Arc::clone(current);
    let peak = Arc::clone(peak);
    continuation(move |spec: SpecRef| {
        let current = Arc::clone(&current);
        let peak = Arc::clone(&peak);
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(SpecResults::new().with(TestCase::new(spec.id().clone(), "case"), TestResult::Passed))
        }
    })
}

/// ## 并行度上限
///
/// - **契约 (What)**：项目配置把并行度设为 2，同时执行的 Spec 不超过 2 个，报告保留全部结果。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallelism_bounds_concurrent_specs() {
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(NoopSource))
        .project_config(Arc::new(ParallelismProject {
            name: "project",
            parallelism: 2,
            log: shared_vec(),
            extensions: Vec::new(),
        }))
        .build();
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let specs = ["A", "B", "C", "D", "E", "F"].map(plain_spec).to_vec();

    let report = engine
        .run(specs, gauge_terminal(&current, &peak))
        .await
        .expect("配置编译应成功");

    assert_eq!(peak.load(Ordering::SeqCst), 2, "并发峰值应等于并行度");
    assert_eq!(report.outcomes().len(), 6);
    assert_eq!(report.test_count(), 6);
    assert!(report.is_success());
}

/// ## 配置失败时不执行任何 Spec
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configuration_failure_runs_nothing() {
    let log = shared_vec();
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(RecordingSource::new("env", &log).failing()))
        .build();

    let err = engine
        .run(vec![plain_spec("NeverRuns")], passing_terminal(&log))
        .await
        .expect_err("配置失败必须返回错误");

    assert!(err.stage().is_some());
    assert_eq!(entries(&log), ["env"], "终端不得执行");
    assert!(!engine.configuration().is_sealed());
}

/// ## 多次运行只编译一次
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_runs_compile_once() {
    let log = shared_vec();
    let environment = RecordingSource::new("env", &log);
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(environment.clone()))
        .build();

    for _ in 0..3 {
        engine
            .run(vec![plain_spec("Again")], passing_terminal(&log))
            .await
            .expect("运行应成功");
    }
    assert_eq!(environment.calls(), 1);
}

/// ## 字典序执行
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lexicographic_order_sorts_specs() {
    let log = shared_vec();
    let environment = RecordingSource::new("env", &log).writing(keys::SPEC_ORDER, "lexicographic");
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(environment))
        .build();

    let order = shared_vec();
    let terminal = {
        let order = Arc::clone(&order);
        continuation(move |spec: SpecRef| {
            let order = Arc::clone(&order);
            async move {
                order.lock().push(spec.id().to_string());
                Ok(SpecResults::new())
            }
        })
    };

    let report = engine
        .run(
            vec![plain_spec("Charlie"), plain_spec("Alpha"), plain_spec("Bravo")],
            terminal,
        )
        .await
        .expect("运行应成功");

    assert_eq!(entries(&order), ["Alpha", "Bravo", "Charlie"]);
    let reported: Vec<&str> = report.outcomes().iter().map(|o| o.spec.as_str()).collect();
    assert_eq!(reported, ["Alpha", "Bravo", "Charlie"]);
}

/// ## 单个 Spec 失败不影响其它 Spec
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spec_failure_is_isolated() {
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(NoopSource))
        .build();
    let terminal = continuation(move |spec: SpecRef| async move {
        if spec.id().as_str() == "Bad" {
            return Err(ExecutionError::spec(spec.id().clone(), "boom"));
        }
        Ok(SpecResults::new().with(TestCase::new(spec.id().clone(), "ok"), TestResult::Passed))
    });

    let report = engine
        .run(
            vec![plain_spec("Good"), plain_spec("Bad"), plain_spec("AlsoGood")],
            terminal,
        )
        .await
        .expect("配置编译应成功");

    let failed: Vec<&str> = report.failed_specs().iter().map(|id| id.as_str()).collect();
    assert_eq!(failed, ["Bad"]);
    assert_eq!(report.test_count(), 2);
    assert!(!report.is_success());
    let good = report
        .outcome(&SpecTypeId::from_static("Good"))
        .expect("应包含 Good 的结果");
    assert!(good.error().is_none());
}

/// ## 失败的用例使整体失败
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_test_case_fails_the_run() {
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(NoopSource))
        .build();
    let terminal = continuation(move |spec: SpecRef| async move {
        Ok(SpecResults::new().with(
            TestCase::new(spec.id().clone(), "broken"),
            TestResult::Failed(spark_test_engine::error::cause("expected 1, got 2")),
        ))
    });

    let report = engine
        .run(vec![plain_spec("Assertive")], terminal)
        .await
        .expect("配置编译应成功");

    assert_eq!(report.failed_specs().len(), 1);
    assert!(!report.is_success());
}

/// ## 空运行与忽略项的判定
///
/// - **契约 (What)**：
///   - 默认设置下，只有被忽略的 Spec 的运行视为成功；
///   - 开启 `fail_on_empty` 后，没有任何用例的运行失败；
///   - 开启 `fail_on_ignored` 后，存在被忽略的 Spec 的运行失败。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_and_ignored_runs_follow_settings() {
    let log = shared_vec();
    let sources = shared_vec();

    let lenient = TestEngine::builder()
        .compiler(quiet_compiler(NoopSource))
        .build();
    let report = lenient
        .run(vec![ignored_spec("Skipped")], passing_terminal(&log))
        .await
        .expect("运行应成功");
    assert_eq!(report.ignored_count(), 1);
    assert!(report.is_success());

    let strict_empty = TestEngine::builder()
        .compiler(quiet_compiler(
            RecordingSource::new("env", &sources).writing(keys::FAIL_ON_EMPTY, true),
        ))
        .build();
    let report = strict_empty
        .run(vec![ignored_spec("Skipped")], passing_terminal(&log))
        .await
        .expect("运行应成功");
    assert_eq!(report.test_count(), 0);
    assert!(!report.is_success());

    let strict_ignored = TestEngine::builder()
        .compiler(quiet_compiler(
            RecordingSource::new("env", &sources).writing(keys::FAIL_ON_IGNORED, true),
        ))
        .build();
    let report = strict_ignored
        .run(
            vec![ignored_spec("Skipped"), plain_spec("Runs")],
            passing_terminal(&log),
        )
        .await
        .expect("运行应成功");
    assert_eq!(report.test_count(), 1);
    assert!(!report.is_success());
    assert_eq!(entries(&log), ["terminal"], "只有未被忽略的 Spec 到达终端");
}

/// ## 引擎装配的链路会应用 Spec 声明的扩展
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_applies_spec_scoped_extensions() {
    let (registry, instantiations) = counting_registry(&["db"]);
    let engine = TestEngine::builder()
        .compiler(quiet_compiler(NoopSource))
        .factories(Arc::new(registry))
        .build();
    let configuration = Arc::clone(engine.configuration());
    let terminal = continuation(move |spec: SpecRef| {
        let visible = configuration.extensions_for(spec.id()).len();
        async move {
            Ok(SpecResults::new().with(
                TestCase::new(spec.id().clone(), format!("visible={visible}")),
                TestResult::Passed,
            ))
        }
    });

    let report = engine
        .run(
            vec![spec_with_factories("First", &["db"]), spec_with_factories("Second", &["db"])],
            terminal,
        )
        .await
        .expect("运行应成功");

    assert!(report.is_success());
    assert_eq!(instantiations.load(Ordering::SeqCst), 2);
    for outcome in report.outcomes() {
        let results = outcome.result.as_ref().expect("Spec 应成功");
        let (case, _) = results.iter().next().expect("应有一个用例");
        assert_eq!(case.name(), "visible=1");
    }
    assert_eq!(engine.configuration().extension_count(), 0);
}
