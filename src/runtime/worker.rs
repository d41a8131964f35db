//! The per-unit scheduling loop.

use std::sync::Arc;

use crate::runtime::agent::Parker;
use crate::runtime::config::SchedulerMode;
use crate::runtime::context;
use crate::runtime::pool::{UnitControl, WorkerPool};
use crate::runtime::queue::{steal_task, LocalQueue, Stealer};
use crate::util::DetRng;

/// State owned by one worker thread: one processing unit of a pool.
pub(crate) struct Worker {
    pub(crate) pool: Arc<WorkerPool>,
    pub(crate) unit: usize,
    pub(crate) local: LocalQueue,
    pub(crate) stealers: Vec<Stealer>,
    pub(crate) control: Arc<UnitControl>,
    pub(crate) parker: Parker,
    pub(crate) rng: DetRng,
}

impl Worker {
    /// Runs the scheduling loop until shutdown.
    ///
    /// Priority order per iteration: honor a pending suspend request, then
    /// local queue (LIFO), then global queue, then stealing (when the pool
    /// allows it), then park until new work or a control change arrives.
    pub(crate) fn run(mut self) {
        context::enter(&self.pool, self.unit);
        tracing::debug!(pool = %self.pool.name(), unit = self.unit, "worker started");

        loop {
            if self.pool.is_shutdown() {
                break;
            }

            if self
                .pool
                .acknowledge_suspension(self.pool.unit_slot_unchecked(self.unit), false)
            {
                continue;
            }

            if let Some(task) = self.local.pop() {
                task.run();
                continue;
            }

            if let Some(task) = self.pool.global_pop() {
                task.run();
                continue;
            }

            if self.pool.mode().contains(SchedulerMode::STEALING) {
                if let Some(task) = steal_task(&self.stealers, &mut self.rng) {
                    task.run();
                    continue;
                }
            }

            self.parker.park();
        }

        tracing::debug!(pool = %self.pool.name(), unit = self.unit, "worker stopped");
        context::exit();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("pool", &self.pool.name())
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}
