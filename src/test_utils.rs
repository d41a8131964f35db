//! Test utilities.
//!
//! Shared helpers for unit and integration tests: consistent
//! tracing-based logging initialization, phase/section macros for readable
//! test output, and runtime constructors for common pool shapes.
//!
//! # Example
//! ```
//! use filament::test_utils::{init_test_logging, test_runtime};
//!
//! init_test_logging();
//! let runtime = test_runtime(2);
//! assert_eq!(runtime.spawn(|| 1).get(), Ok(1));
//! ```

use std::sync::{Mutex, Once};

use tracing_subscriber::fmt::format::FmtSpan;

use crate::runtime::{PoolConfig, Runtime, RuntimeConfig, SchedulerMode};

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
#[must_use]
pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().expect("env lock poisoned")
}

/// Create a runtime with one default-mode pool of `workers` units.
#[must_use]
pub fn test_runtime(workers: usize) -> Runtime {
    test_runtime_with_mode(workers, SchedulerMode::DEFAULT)
}

/// Create a runtime with one pool of `workers` units in the given mode.
#[must_use]
pub fn test_runtime_with_mode(workers: usize, mode: SchedulerMode) -> Runtime {
    Runtime::new(RuntimeConfig::with_pool(
        PoolConfig::new("default").worker_threads(workers).mode(mode),
    ))
    .expect("failed to build test runtime")
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
