//! Worker pools and their processing-unit control protocol.
//!
//! A [`WorkerPool`] owns a fixed set of processing-unit slots, a
//! scheduling-mode bitmask, a global injection queue, and per-unit local
//! queues. Units are either active (running the scheduling loop) or
//! suspended (parked, not scheduling); only that state is mutated after
//! construction.
//!
//! Suspension is a two-phase handshake through the unit's control block:
//! the controller raises `suspend_requested` and waits for the worker to
//! publish `suspended`; the worker drains its local queue into the global
//! queue first, so no ready work is stranded on a sleeping unit. Resume
//! clears the request and waits for the worker to publish activity again.
//! Both directions are idempotent, and concurrent suspend/resume requests
//! for one unit resolve to whichever request was observed last, with no
//! handshake lost.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::completion::result::AsyncResult;
use crate::completion::state::{run_into, CompletionState};
use crate::error::{Error, ErrorKind};
use crate::runtime::agent::Parker;
use crate::runtime::config::{PoolConfig, SchedulerMode};
use crate::runtime::context;
use crate::runtime::queue::{GlobalQueue, LocalQueue, Stealer};
use crate::runtime::task::Task;
use crate::runtime::worker::Worker;
use crate::util::DetRng;

/// Active/suspended handshake state of one processing unit.
#[derive(Debug, Clone, Copy)]
struct UnitState {
    suspend_requested: bool,
    suspended: bool,
}

/// Control block shared between a unit's worker thread and controllers.
#[derive(Debug)]
pub(crate) struct UnitControl {
    state: Mutex<UnitState>,
    changed: Condvar,
}

impl UnitControl {
    fn new() -> Self {
        Self {
            state: Mutex::new(UnitState {
                suspend_requested: false,
                suspended: false,
            }),
            changed: Condvar::new(),
        }
    }
}

/// Per-unit bookkeeping owned by the pool.
pub(crate) struct UnitSlot {
    pub(crate) control: Arc<UnitControl>,
    pub(crate) local: LocalQueue,
    pub(crate) stealer: Stealer,
    pub(crate) parker: Parker,
}

/// A pool of processing units, each backed by one pinned worker thread.
pub struct WorkerPool {
    name: String,
    mode: SchedulerMode,
    global: GlobalQueue,
    units: Vec<UnitSlot>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    /// Builds the pool and the worker state for each of its units.
    ///
    /// The caller (the runtime) spawns one OS thread per returned
    /// [`Worker`].
    pub(crate) fn build(config: &PoolConfig) -> (Arc<Self>, Vec<Worker>) {
        let locals: Vec<LocalQueue> = (0..config.worker_threads).map(|_| LocalQueue::new()).collect();
        let units: Vec<UnitSlot> = locals
            .iter()
            .map(|local| UnitSlot {
                control: Arc::new(UnitControl::new()),
                local: local.clone(),
                stealer: local.stealer(),
                parker: Parker::new(),
            })
            .collect();

        let pool = Arc::new(Self {
            name: config.name.clone(),
            mode: config.mode,
            global: GlobalQueue::new(),
            units,
            shutdown: AtomicBool::new(false),
        });

        let workers = locals
            .into_iter()
            .enumerate()
            .map(|(unit, local)| {
                let stealers: Vec<Stealer> = pool
                    .units
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != unit)
                    .map(|(_, slot)| slot.stealer.clone())
                    .collect();
                Worker {
                    pool: Arc::clone(&pool),
                    unit,
                    local,
                    stealers,
                    control: Arc::clone(&pool.units[unit].control),
                    parker: pool.units[unit].parker.clone(),
                    rng: DetRng::new(unit as u64 + 1),
                }
            })
            .collect();

        (pool, workers)
    }

    /// Returns the pool's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pool's scheduling-mode bitmask.
    #[must_use]
    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// Capability query: may this pool's units be suspended and resumed?
    #[must_use]
    pub fn supports_elasticity(&self) -> bool {
        self.mode.contains(SchedulerMode::ELASTICITY)
    }

    /// Capability query: do this pool's units steal work from each other?
    #[must_use]
    pub fn supports_stealing(&self) -> bool {
        self.mode.contains(SchedulerMode::STEALING)
    }

    /// Returns the number of processing units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Reports whether `unit` is currently suspended.
    ///
    /// # Errors
    ///
    /// Fails when `unit` is out of range.
    pub fn is_unit_suspended(&self, unit: usize) -> crate::Result<bool> {
        let slot = self.unit_slot(unit, "filament::WorkerPool::is_unit_suspended")?;
        Ok(slot.control.state.lock().suspended)
    }

    /// Spawns `f` on this pool, returning the result handle.
    pub fn spawn<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> T + Send + 'static,
    ) -> AsyncResult<T> {
        self.spawn_fallible(move || Ok(f()))
    }

    /// Spawns fallible work on this pool; an `Err` return fails the result.
    pub fn spawn_fallible<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> crate::Result<T> + Send + 'static,
    ) -> AsyncResult<T> {
        let state = CompletionState::new_started();
        let task_state = Arc::clone(&state);
        self.submit(Task::new(move || run_into(f, &task_state)));
        AsyncResult::from_state(state)
    }

    /// Enqueues a task: on the submitting unit's local queue when called
    /// from inside this pool, on the global queue otherwise.
    pub(crate) fn submit(&self, task: Task) {
        match context::current_unit_in(self) {
            Some(unit) => self.units[unit].local.push(task),
            None => self.global.push(task),
        }
        self.notify_idle();
    }

    pub(crate) fn global_push(&self, task: Task) {
        self.global.push(task);
    }

    pub(crate) fn global_pop(&self) -> Option<Task> {
        self.global.pop()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Signals every unit to stop scheduling and wakes whatever is parked.
    pub(crate) fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for slot in &self.units {
            slot.parker.unpark();
            let _state = slot.control.state.lock();
            slot.control.changed.notify_all();
        }
    }

    fn notify_idle(&self) {
        for slot in &self.units {
            slot.parker.unpark();
        }
    }

    fn unit_slot(&self, unit: usize, op: &'static str) -> crate::Result<&UnitSlot> {
        self.units.get(unit).ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownUnit,
                op,
                format!(
                    "unit {unit} out of range for pool '{}' with {} units",
                    self.name,
                    self.units.len()
                ),
            )
        })
    }

    /// Stops `unit` from scheduling, returning once it has drained its
    /// local ready state and parked.
    ///
    /// When invoked from the target unit itself the handshake is performed
    /// inline: the calling task drains the queue, publishes the suspended
    /// state and parks right here until resumed.
    ///
    /// # Errors
    ///
    /// Fails when `unit` is out of range.
    pub fn suspend_processing_unit_direct(&self, unit: usize) -> crate::Result<()> {
        let slot = self.unit_slot(unit, "filament::WorkerPool::suspend_processing_unit_direct")?;

        if context::current_unit_in(self) == Some(unit) {
            tracing::debug!(pool = %self.name, unit, "unit suspending itself");
            self.acknowledge_suspension(slot, true);
            return Ok(());
        }

        {
            let mut state = slot.control.state.lock();
            state.suspend_requested = true;
        }
        // The worker may be parked idle; wake it so it notices the request.
        slot.parker.unpark();
        let mut state = slot.control.state.lock();
        // A concurrent resume clearing the request supersedes this call;
        // both resolve to the single final state.
        while !state.suspended && state.suspend_requested && !self.is_shutdown() {
            slot.control.changed.wait(&mut state);
        }
        tracing::debug!(pool = %self.name, unit, "unit suspended");
        Ok(())
    }

    /// Restores `unit` to active scheduling, returning once it is running
    /// the loop again. Resuming an active unit is a no-op.
    ///
    /// # Errors
    ///
    /// Fails when `unit` is out of range.
    pub fn resume_processing_unit_direct(&self, unit: usize) -> crate::Result<()> {
        let slot = self.unit_slot(unit, "filament::WorkerPool::resume_processing_unit_direct")?;
        {
            let mut state = slot.control.state.lock();
            state.suspend_requested = false;
            slot.control.changed.notify_all();
            // A concurrent suspend re-raising the request supersedes this
            // call.
            while state.suspended && !state.suspend_requested && !self.is_shutdown() {
                slot.control.changed.wait(&mut state);
            }
        }
        slot.parker.unpark();
        tracing::debug!(pool = %self.name, unit, "unit resumed");
        Ok(())
    }

    /// Suspends every unit of the pool, one after another.
    ///
    /// Must not be called from a task running on this pool; the elasticity
    /// helpers enforce that.
    ///
    /// # Errors
    ///
    /// Propagates the first unit-level failure.
    pub fn suspend_direct(&self) -> crate::Result<()> {
        for unit in 0..self.units.len() {
            self.suspend_processing_unit_direct(unit)?;
        }
        Ok(())
    }

    /// Resumes every unit of the pool.
    ///
    /// # Errors
    ///
    /// Propagates the first unit-level failure.
    pub fn resume_direct(&self) -> crate::Result<()> {
        for unit in 0..self.units.len() {
            self.resume_processing_unit_direct(unit)?;
        }
        Ok(())
    }

    /// Performs the worker side of the suspension handshake.
    ///
    /// Returns true if a request was honored. `forced` raises the request
    /// itself first (the self-suspension path).
    pub(crate) fn acknowledge_suspension(&self, slot: &UnitSlot, forced: bool) -> bool {
        let mut state = slot.control.state.lock();
        if forced {
            state.suspend_requested = true;
        }
        if !state.suspend_requested {
            return false;
        }

        let drained = slot.local.drain();
        if !drained.is_empty() {
            tracing::debug!(
                pool = %self.name,
                count = drained.len(),
                "re-injecting local tasks before suspension"
            );
            for task in drained {
                self.global.push(task);
            }
        }

        state.suspended = true;
        slot.control.changed.notify_all();
        while state.suspend_requested && !self.is_shutdown() {
            slot.control.changed.wait(&mut state);
        }
        state.suspended = false;
        slot.control.changed.notify_all();
        drop(state);

        // Work may have been re-injected or submitted while parked; make
        // sure somebody looks at it.
        self.notify_idle();
        true
    }

    pub(crate) fn unit_slot_unchecked(&self, unit: usize) -> &UnitSlot {
        &self.units[unit]
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("units", &self.units.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
