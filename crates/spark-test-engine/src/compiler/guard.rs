//! 编译守卫：单飞（single-flight）的一次性执行原语。
//!
//! # 设计动机（Why）
//! - 配置只能编译一次；多个调用方可能同时发起初始化，必须只有一个真正执行配置源，
//!   其余调用方阻塞等待并观察编译结果；
//! - 编译失败不能把进程卡在“已编译”状态，后续调用需要能够从头重试。
//!
//! # 使用契约（What）
//! - [`CompilationGuard::run_once`] 成功执行一次后状态不可逆地变为 `Compiled`；
//! - 编译过程中同一线程再次请求编译返回 [`ConfigurationError::Reentrant`]，避免自锁；
//! - 编译闭包在不持有互斥锁的情况下执行，等待方通过条件变量唤醒。
//!
//! # 风险提示（Trade-offs & Gotchas）
//! - 编译失败时等待方被唤醒后会自行重试，配置源因此可能被多个调用方依次执行；
//!   每次重试都从第一个配置源开始。

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::ConfigurationError;

/// 对外可见的编译状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompilationState {
    Uninitialized,
    Compiling,
    Compiled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GuardState {
    Uninitialized,
    Compiling { owner: ThreadId },
    Compiled,
}

static PROCESS_GUARD: OnceLock<Arc<CompilationGuard>> = OnceLock::new();

/// 单飞编译守卫。
#[derive(Debug)]
pub struct CompilationGuard {
    state: Mutex<GuardState>,
    completed: Condvar,
    compiled: AtomicBool,
}

impl Default for CompilationGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationGuard {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GuardState::Uninitialized),
            completed: Condvar::new(),
            compiled: AtomicBool::new(false),
        }
    }

    /// 进程级共享守卫，供需要单例语义的调用方使用。
    pub fn process() -> Arc<CompilationGuard> {
        Arc::clone(PROCESS_GUARD.get_or_init(|| Arc::new(CompilationGuard::new())))
    }

    pub fn state(&self) -> CompilationState {
        match *self.state.lock() {
            GuardState::Uninitialized => CompilationState::Uninitialized,
            GuardState::Compiling { .. } => CompilationState::Compiling,
            GuardState::Compiled => CompilationState::Compiled,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.load(Ordering::Acquire)
    }

    /// 至多成功执行一次 `compile`。
    ///
    /// # 契约（What）
    /// - 返回 `Ok(true)`：本次调用执行了 `compile` 且成功；
    /// - 返回 `Ok(false)`：此前已编译完成，`compile` 未被调用；
    /// - 返回 `Err`：本次 `compile` 失败（状态回到 `Uninitialized`），或发生同线程重入；
    /// - `compile` panic 时状态同样回到 `Uninitialized`，等待方被唤醒。
    pub fn run_once<F>(&self, compile: F) -> Result<bool, ConfigurationError>
    where
        F: FnOnce() -> Result<(), ConfigurationError>,
    {
        if self.is_compiled() {
            return Ok(false);
        }

        let me = thread::current().id();
        {
            let mut state = self.state.lock();
            loop {
                match *state {
                    GuardState::Compiled => return Ok(false),
                    GuardState::Compiling { owner } if owner == me => {
                        return Err(ConfigurationError::Reentrant);
                    }
                    GuardState::Compiling { .. } => {
                        debug!("configuration compilation in progress on another thread; waiting");
                        self.completed.wait(&mut state);
                    }
                    GuardState::Uninitialized => {
                        *state = GuardState::Compiling { owner: me };
                        break;
                    }
                }
            }
        }

        let mut finish = Finish {
            guard: self,
            succeeded: false,
        };
        let outcome = compile();
        finish.succeeded = outcome.is_ok();
        drop(finish);
        outcome.map(|()| true)
    }
}

/// 在正常返回与 panic 展开时都能落定守卫状态。
struct Finish<'a> {
    guard: &'a CompilationGuard,
    succeeded: bool,
}

impl Drop for Finish<'_> {
    fn drop(&mut self) {
        let mut state = self.guard.state.lock();
        if self.succeeded {
            *state = GuardState::Compiled;
            self.guard.compiled.store(true, Ordering::Release);
        } else {
            *state = GuardState::Uninitialized;
        }
        drop(state);
        self.guard.completed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_at_most_once_after_success() {
        let guard = CompilationGuard::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            guard
                .run_once(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .expect("编译不应失败");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.state(), CompilationState::Compiled);
    }

    #[test]
    fn failure_leaves_guard_uninitialized() {
        let guard = CompilationGuard::new();
        let result = guard.run_once(|| Err(ConfigurationError::Reentrant));
        assert!(result.is_err());
        assert_eq!(guard.state(), CompilationState::Uninitialized);

        assert!(matches!(guard.run_once(|| Ok(())), Ok(true)), "失败后必须允许重试");
    }

    #[test]
    fn reentry_on_same_thread_is_rejected() {
        let guard = CompilationGuard::new();
        let inner = guard.run_once(|| {
            let nested = guard.run_once(|| Ok(()));
            assert!(matches!(nested, Err(ConfigurationError::Reentrant)));
            Ok(())
        });
        assert!(matches!(inner, Ok(true)));
    }

    #[test]
    fn panic_during_compile_resets_state() {
        let guard = CompilationGuard::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = guard.run_once(|| panic!("source exploded"));
        }));
        assert!(outcome.is_err());
        assert_eq!(guard.state(), CompilationState::Uninitialized);
    }
}
