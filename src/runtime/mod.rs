//! The runtime: named worker pools, a registry, and spawning.
//!
//! A [`Runtime`] is an explicitly passed registry of [`WorkerPool`]s built
//! from a [`RuntimeConfig`]. Construction spawns every pool's worker
//! threads; dropping the last runtime handle signals shutdown and joins
//! them. There is no process-wide singleton: everything that needs the
//! runtime takes it as a value.
//!
//! # Example
//!
//! ```
//! use filament::runtime::{PoolConfig, Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::new(RuntimeConfig::with_pool(
//!     PoolConfig::new("default").worker_threads(2),
//! ))
//! .expect("runtime starts");
//!
//! let result = runtime.spawn(|| 6 * 7);
//! assert_eq!(result.get(), Ok(42));
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod elasticity;
pub mod env_config;
pub mod pool;

pub(crate) mod queue;
pub(crate) mod task;
pub(crate) mod worker;

pub use config::{PoolConfig, RuntimeConfig, SchedulerMode};
pub use context::{current_pool, current_unit, in_runtime};
pub use elasticity::{
    resume_pool, resume_pool_cb, resume_processing_unit, resume_processing_unit_cb, suspend_pool,
    suspend_pool_cb, suspend_processing_unit, suspend_processing_unit_cb,
};
pub use pool::WorkerPool;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::completion::result::AsyncResult;
use crate::error::{Error, ErrorKind};

/// A handle to a running runtime. Cloning is cheap; the pools shut down
/// when the last handle drops.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    pools: Vec<Arc<WorkerPool>>,
    by_name: HashMap<String, usize>,
    default_pool: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Runtime {
    /// Builds the configured pools and starts their worker threads.
    ///
    /// # Errors
    ///
    /// Fails when the OS refuses to spawn a worker thread; pools already
    /// started are shut down again before returning.
    pub fn new(mut config: RuntimeConfig) -> crate::Result<Self> {
        config.normalize();

        let mut pools: Vec<Arc<WorkerPool>> = Vec::with_capacity(config.pools.len());
        let mut by_name = HashMap::new();
        let mut handles = Vec::new();

        for pool_config in &config.pools {
            let (pool, workers) = WorkerPool::build(pool_config);
            for worker in workers {
                let name = format!("{}-{}", pool_config.thread_name_prefix, worker.unit);
                let spawned = std::thread::Builder::new()
                    .name(name)
                    .stack_size(pool_config.thread_stack_size)
                    .spawn(move || worker.run());
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        pool.begin_shutdown();
                        for started in &pools {
                            started.begin_shutdown();
                        }
                        for handle in handles {
                            let _ = handle.join();
                        }
                        return Err(Error::new(
                            ErrorKind::ThreadSpawnFailed,
                            "filament::Runtime::new",
                            err.to_string(),
                        ));
                    }
                }
            }
            tracing::info!(
                pool = %pool.name(),
                units = pool.unit_count(),
                mode = %pool.mode(),
                "worker pool started"
            );
            by_name.insert(pool.name().to_string(), pools.len());
            pools.push(pool);
        }

        let default_pool = by_name.get("default").copied().unwrap_or(0);
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                pools,
                by_name,
                default_pool,
                workers: Mutex::new(handles),
            }),
        })
    }

    /// Builds a runtime from the default configuration plus `FILAMENT_*`
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Fails on unparseable overrides or thread-spawn failure.
    pub fn from_env() -> crate::Result<Self> {
        Self::new(RuntimeConfig::from_env()?)
    }

    /// Looks up a pool by name.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<&Arc<WorkerPool>> {
        self.inner
            .by_name
            .get(name)
            .map(|&index| &self.inner.pools[index])
    }

    /// The pool that receives work submitted through the runtime.
    #[must_use]
    pub fn default_pool(&self) -> &Arc<WorkerPool> {
        &self.inner.pools[self.inner.default_pool]
    }

    /// Iterates over every registered pool.
    pub fn pools(&self) -> impl Iterator<Item = &Arc<WorkerPool>> {
        self.inner.pools.iter()
    }

    /// Spawns `f` on the default pool.
    pub fn spawn<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> T + Send + 'static,
    ) -> AsyncResult<T> {
        self.default_pool().spawn(f)
    }

    /// Spawns fallible work on the default pool; an `Err` return fails the
    /// result.
    pub fn spawn_fallible<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> crate::Result<T> + Send + 'static,
    ) -> AsyncResult<T> {
        self.default_pool().spawn_fallible(f)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("pools", &self.inner.pools)
            .finish_non_exhaustive()
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        for pool in &self.pools {
            pool.begin_shutdown();
        }
        let current = std::thread::current().id();
        let handles = std::mem::take(
            &mut *self.workers.lock().expect("runtime worker list poisoned"),
        );
        for handle in handles {
            // A worker can hold the last runtime handle itself; joining it
            // from its own thread would deadlock.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        tracing::info!("runtime shut down");
    }
}
