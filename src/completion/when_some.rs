//! The N-of-M join combinator.
//!
//! [`when_some`] waits until at least `n` of the supplied asynchronous
//! results have completed and yields the indices that became ready, in
//! completion order, together with the input sequence itself. Failures of
//! individual inputs count as completions and never fail the join; the
//! caller observes them only when inspecting those specific handles.
//!
//! Inputs may be a homogeneous `Vec`, a heterogeneous tuple, or nested
//! sub-collections, recursively — anything implementing [`ResultSequence`].
//! Indices are assigned in traversal order across the whole sequence.
//!
//! # Completion race
//!
//! Each input contributes its index exactly once, under the join record's
//! lock, paired with one atomic count increment. The increment that pushes
//! the count to `n` either resumes the waiting task (when it happens on a
//! different agent) or raises the goal flag so the waiting task notices
//! *before* suspending (when its own probing satisfied the threshold
//! synchronously) — a task whose own call stack reached the goal would
//! otherwise park with nobody left to wake it. Completions arriving after
//! the goal are counted but their indices are dropped, so the ready list
//! never exceeds `n`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::completion::result::AsyncResult;
use crate::completion::state::CompletionObserver;
use crate::error::{Error, ErrorKind};
use crate::runtime::agent::{self, AgentRef};
use crate::runtime::Runtime;

/// Result of a [`when_some`] call: the indices that became ready, in
/// completion order, and the input sequence passed back to the caller.
#[derive(Debug)]
pub struct WhenSomeResult<S> {
    /// Indices of inputs that completed, ordered by completion.
    pub indices: Vec<usize>,
    /// The input sequence as passed to [`when_some`].
    pub results: S,
}

/// A traversable collection of asynchronous results.
///
/// Implemented for single results, vectors, tuples up to arity eight, and
/// any nesting thereof. Traversal order defines the index space reported
/// by [`WhenSomeResult::indices`].
pub trait ResultSequence: Send + 'static {
    /// Visits every leaf result's observer in traversal order.
    fn visit_observers(&self, visit: &mut dyn FnMut(&dyn CompletionObserver));

    /// Number of leaf results in the sequence.
    fn result_count(&self) -> usize {
        let mut count = 0;
        self.visit_observers(&mut |_| count += 1);
        count
    }
}

impl<T: Send + 'static> ResultSequence for AsyncResult<T> {
    fn visit_observers(&self, visit: &mut dyn FnMut(&dyn CompletionObserver)) {
        visit(self.observer());
    }

    fn result_count(&self) -> usize {
        1
    }
}

impl<S: ResultSequence> ResultSequence for Vec<S> {
    fn visit_observers(&self, visit: &mut dyn FnMut(&dyn CompletionObserver)) {
        for element in self {
            element.visit_observers(visit);
        }
    }
}

impl ResultSequence for () {
    fn visit_observers(&self, _visit: &mut dyn FnMut(&dyn CompletionObserver)) {}

    fn result_count(&self) -> usize {
        0
    }
}

macro_rules! impl_result_sequence_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: ResultSequence),+> ResultSequence for ($($name,)+) {
            fn visit_observers(&self, visit: &mut dyn FnMut(&dyn CompletionObserver)) {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                $($name.visit_observers(visit);)+
            }
        }
    };
}

impl_result_sequence_for_tuple!(A);
impl_result_sequence_for_tuple!(A, B);
impl_result_sequence_for_tuple!(A, B, C);
impl_result_sequence_for_tuple!(A, B, C, D);
impl_result_sequence_for_tuple!(A, B, C, D, E);
impl_result_sequence_for_tuple!(A, B, C, D, E, F);
impl_result_sequence_for_tuple!(A, B, C, D, E, F, G);
impl_result_sequence_for_tuple!(A, B, C, D, E, F, G, H);

/// Shared record for one join in flight.
struct JoinRecord {
    /// Indices of inputs observed ready, in readiness order.
    indices: Mutex<Vec<usize>>,
    /// Count of inputs observed ready, including dropped late arrivals.
    count: AtomicUsize,
    /// The threshold `n`.
    needed: usize,
    /// Set when the final increment happened on the waiting agent itself.
    goal_reached_on_calling_agent: AtomicBool,
    /// The agent of the task performing the join.
    waiting: AgentRef,
}

impl JoinRecord {
    /// Continuation body for input `index`.
    fn on_result_ready(&self, index: usize) {
        let new_count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if new_count <= self.needed {
            self.indices
                .lock()
                .expect("join record lock poisoned")
                .push(index);
            if new_count == self.needed {
                if self.waiting == agent::current() {
                    self.goal_reached_on_calling_agent
                        .store(true, Ordering::Release);
                } else {
                    self.waiting.resume();
                }
            }
        }
    }
}

/// Waits for `n` of the supplied results to complete.
///
/// Returns a new asynchronous result that becomes ready once the threshold
/// is reached. `n == 0` yields an immediately-ready empty result without
/// inspecting or starting any input; the join itself never fails once
/// started — input failures stay attached to their inputs.
///
/// A threshold larger than the number of supplied results fails
/// immediately with a bounds error and registers no continuations.
pub fn when_some<S: ResultSequence>(
    runtime: &Runtime,
    n: usize,
    results: S,
) -> AsyncResult<WhenSomeResult<S>> {
    if n == 0 {
        return AsyncResult::ready(WhenSomeResult {
            indices: Vec::new(),
            results,
        });
    }
    let total = results.result_count();
    if n > total {
        return AsyncResult::from_error(Error::new(
            ErrorKind::ThresholdOutOfBounds,
            "filament::when_some",
            format!("waiting for {n} results but only {total} were supplied"),
        ));
    }
    runtime.spawn(move || wait_for_some(n, results))
}

/// Iterator form of [`when_some`]: consumes up to `count` results from
/// `results` and joins on those.
pub fn when_some_n<T: Send + 'static>(
    runtime: &Runtime,
    n: usize,
    results: impl IntoIterator<Item = AsyncResult<T>>,
    count: usize,
) -> AsyncResult<WhenSomeResult<Vec<AsyncResult<T>>>> {
    let values: Vec<_> = results.into_iter().take(count).collect();
    when_some(runtime, n, values)
}

/// The body of the join task; runs on a pool worker.
fn wait_for_some<S: ResultSequence>(needed: usize, results: S) -> WhenSomeResult<S> {
    let record = Arc::new(JoinRecord {
        indices: Mutex::new(Vec::new()),
        count: AtomicUsize::new(0),
        needed,
        goal_reached_on_calling_agent: AtomicBool::new(false),
        waiting: agent::current(),
    });

    let mut index = 0_usize;
    results.visit_observers(&mut |observer| {
        let current = index;
        index += 1;

        // Inputs past the threshold are not touched at all.
        if record.count.load(Ordering::SeqCst) >= needed {
            return;
        }

        if !observer.is_ready() {
            observer.force_start();
            // Forcing may have completed it inline; re-check before
            // registering.
            if !observer.is_ready() {
                let callback_record = Arc::clone(&record);
                if observer
                    .try_register(Box::new(move || callback_record.on_result_ready(current)))
                    .is_ok()
                {
                    return;
                }
                // Completed between the check and the registration; fall
                // through to the direct path.
            }
        }

        // Already completed: record on this agent directly.
        record
            .indices
            .lock()
            .expect("join record lock poisoned")
            .push(current);
        if record.count.fetch_add(1, Ordering::SeqCst) + 1 == needed {
            record
                .goal_reached_on_calling_agent
                .store(true, Ordering::Release);
        }
    });

    // If our own probing satisfied the threshold we must not suspend: the
    // resume that would wake us already happened on this very stack.
    if !record
        .goal_reached_on_calling_agent
        .load(Ordering::Acquire)
    {
        while record.count.load(Ordering::SeqCst) < needed {
            agent::suspend();
        }
    }

    debug_assert!(record.count.load(Ordering::SeqCst) >= needed);
    tracing::trace!(needed, "join threshold reached");

    let indices = std::mem::take(
        &mut *record
            .indices
            .lock()
            .expect("join record lock poisoned"),
    );
    WhenSomeResult { indices, results }
}
