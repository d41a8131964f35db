//! Environment variable overrides for [`RuntimeConfig`].
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic** — values set on the config before the override pass
//! 2. **Environment variables** — `FILAMENT_*` values, applied by
//!    [`apply_env_overrides`]
//! 3. **Defaults** — [`RuntimeConfig::default`]
//!
//! Overrides apply to the runtime's default pool (the first configured
//! pool). Only variables that are set are applied; a set-but-unparseable
//! value is a config error, never silently ignored.
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `FILAMENT_WORKER_THREADS` | `usize` | `worker_threads` |
//! | `FILAMENT_THREAD_STACK_SIZE` | `usize` | `thread_stack_size` |
//! | `FILAMENT_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |
//! | `FILAMENT_SCHEDULER_MODE` | mode list | `mode` |
//!
//! The mode list is comma-separated mode names, e.g.
//! `elasticity,stealing` or `none`.

use crate::error::{Error, ErrorKind};
use crate::runtime::config::{PoolConfig, RuntimeConfig, SchedulerMode};

/// Environment variable name for the worker thread count.
pub const ENV_WORKER_THREADS: &str = "FILAMENT_WORKER_THREADS";
/// Environment variable name for the per-thread stack size.
pub const ENV_THREAD_STACK_SIZE: &str = "FILAMENT_THREAD_STACK_SIZE";
/// Environment variable name for the worker thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "FILAMENT_THREAD_NAME_PREFIX";
/// Environment variable name for the scheduler mode list.
pub const ENV_SCHEDULER_MODE: &str = "FILAMENT_SCHEDULER_MODE";

/// Applies `FILAMENT_*` overrides to the default pool of `config`.
///
/// # Errors
///
/// Fails with a config error naming the offending variable when a set
/// value cannot be parsed.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> crate::Result<()> {
    if config.pools.is_empty() {
        config.pools.push(PoolConfig::new("default"));
    }
    let pool = &mut config.pools[0];

    if let Some(threads) = parse_env_usize(ENV_WORKER_THREADS)? {
        pool.worker_threads = threads;
    }
    if let Some(stack) = parse_env_usize(ENV_THREAD_STACK_SIZE)? {
        pool.thread_stack_size = stack;
    }
    if let Ok(prefix) = std::env::var(ENV_THREAD_NAME_PREFIX) {
        if !prefix.trim().is_empty() {
            pool.thread_name_prefix = prefix;
        }
    }
    if let Some(mode) = parse_env_mode(ENV_SCHEDULER_MODE)? {
        pool.mode = mode;
    }
    Ok(())
}

fn parse_env_usize(var: &'static str) -> crate::Result<Option<usize>> {
    match std::env::var(var) {
        Err(_) => Ok(None),
        Ok(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
            Error::new(
                ErrorKind::InvalidConfigValue,
                "filament::env_config",
                format!("{var}={raw:?} is not a valid unsigned integer"),
            )
        }),
    }
}

fn parse_env_mode(var: &'static str) -> crate::Result<Option<SchedulerMode>> {
    match std::env::var(var) {
        Err(_) => Ok(None),
        Ok(raw) => {
            let mut mode = SchedulerMode::NONE;
            for name in raw.split(',') {
                match SchedulerMode::from_name(name) {
                    Some(bit) => mode = mode.with(bit),
                    None => {
                        return Err(Error::new(
                            ErrorKind::InvalidConfigValue,
                            "filament::env_config",
                            format!("{var}={raw:?} contains unknown mode {name:?}"),
                        ))
                    }
                }
            }
            Ok(Some(mode))
        }
    }
}
