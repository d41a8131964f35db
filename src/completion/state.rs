//! The shared completion state behind promises and asynchronous results.
//!
//! A [`CompletionState`] is a one-shot cell shared by one producer and any
//! number of observers. Its tag moves monotonically from pending to
//! value-or-error exactly once; the payload is immutable once set and is
//! handed out once. Continuations are modeled as an explicit state machine —
//! idle, pending registration, fired — with a register-or-fire-now
//! operation: registering on a completed state invokes the continuation
//! inline, completing a state with a registration invokes it synchronously
//! on the completing thread. Registering a second continuation while one is
//! pending chains the two; each fires exactly once.
//!
//! Sharing is plain `Arc` cloning. Anything stored *inside* the state that
//! must reach back to it — in particular the starter of a deferred
//! operation — holds only a [`Weak`] back-reference, so an unstarted
//! deferred result is freed as soon as its last handle drops.

use std::sync::{Arc, Mutex, Weak};

use crate::error::{Error, ErrorKind};

/// A continuation stored in, or fired by, a completion state.
pub type Continuation = Box<dyn FnOnce() + Send>;

/// Read-side view of a completion state, independent of its value type.
///
/// This is the surface combinators observe inputs through: readiness,
/// force-starting deferred work, and racing a registration against
/// completion.
pub trait CompletionObserver: Send + Sync {
    /// Returns true once the state holds a value or an error.
    fn is_ready(&self) -> bool;

    /// Starts a deferred operation if it has not started yet.
    ///
    /// Deferred work runs inline on the forcing caller; eager states ignore
    /// this.
    fn force_start(&self);

    /// Registers `continuation` unless the state is already completed.
    ///
    /// On `Err` the state completed first and the unfired continuation is
    /// handed back; the caller either drops it and observes the result
    /// directly, or invokes it inline for register-or-fire-now semantics.
    fn try_register(&self, continuation: Continuation) -> Result<(), Continuation>;
}

enum Payload<T> {
    Pending,
    Value(T),
    Error(Error),
    Retrieved,
}

enum ContinuationSlot {
    Idle,
    Registered(Continuation),
    Fired,
}

struct Inner<T> {
    payload: Payload<T>,
    continuation: ContinuationSlot,
    started: bool,
    starter: Option<Continuation>,
}

/// The shared cell. See the module docs for the protocol.
pub(crate) struct CompletionState<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> CompletionState<T> {
    /// Creates a pending state for an operation that is already running.
    pub(crate) fn new_started() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                payload: Payload::Pending,
                continuation: ContinuationSlot::Idle,
                started: true,
                starter: None,
            }),
        })
    }

    /// Creates an already-completed state.
    pub(crate) fn new_completed(result: Result<T, Error>) -> Arc<Self> {
        let payload = match result {
            Ok(value) => Payload::Value(value),
            Err(error) => Payload::Error(error),
        };
        Arc::new(Self {
            inner: Mutex::new(Inner {
                payload,
                continuation: ContinuationSlot::Idle,
                started: true,
                starter: None,
            }),
        })
    }

    /// Returns true once the state holds a value or an error.
    pub(crate) fn is_ready(&self) -> bool {
        !matches!(
            self.inner
                .lock()
                .expect("completion state lock poisoned")
                .payload,
            Payload::Pending
        )
    }

    /// Runs the stored starter exactly once, if there is one.
    pub(crate) fn force_start(&self) {
        let starter = {
            let mut inner = self.inner.lock().expect("completion state lock poisoned");
            if inner.started {
                None
            } else {
                inner.started = true;
                inner.starter.take()
            }
        };
        if let Some(starter) = starter {
            starter();
        }
    }

    /// Transitions pending → completed, then fires any registered
    /// continuation synchronously on this thread.
    ///
    /// # Errors
    ///
    /// Completing a state twice is a protocol violation.
    pub(crate) fn complete(&self, result: Result<T, Error>, op: &'static str) -> crate::Result<()> {
        let fired = {
            let mut inner = self.inner.lock().expect("completion state lock poisoned");
            if !matches!(inner.payload, Payload::Pending) {
                return Err(Error::new(
                    ErrorKind::AlreadyCompleted,
                    op,
                    "completion state has already been completed",
                ));
            }
            inner.payload = match result {
                Ok(value) => Payload::Value(value),
                Err(error) => Payload::Error(error),
            };
            match std::mem::replace(&mut inner.continuation, ContinuationSlot::Fired) {
                ContinuationSlot::Registered(continuation) => Some(continuation),
                // Nothing registered yet; a later registration fires inline
                // against the completed payload.
                ContinuationSlot::Idle | ContinuationSlot::Fired => None,
            }
        };
        if let Some(continuation) = fired {
            continuation();
        }
        Ok(())
    }

    /// Registers a continuation, firing it inline when already completed.
    pub(crate) fn register(&self, continuation: Continuation) {
        if let Err(continuation) = self.try_register(continuation) {
            continuation();
        }
    }

    /// Stores `continuation` while still pending; hands it back otherwise.
    pub(crate) fn try_register(&self, continuation: Continuation) -> Result<(), Continuation> {
        let mut inner = self.inner.lock().expect("completion state lock poisoned");
        if !matches!(inner.payload, Payload::Pending) {
            return Err(continuation);
        }
        inner.continuation =
            match std::mem::replace(&mut inner.continuation, ContinuationSlot::Idle) {
                ContinuationSlot::Idle => ContinuationSlot::Registered(continuation),
                ContinuationSlot::Registered(previous) => {
                    ContinuationSlot::Registered(Box::new(move || {
                        previous();
                        continuation();
                    }))
                }
                ContinuationSlot::Fired => {
                    unreachable!("continuation fired while state still pending")
                }
            };
        Ok(())
    }

    /// Takes the payload if the state is completed.
    ///
    /// Returns `None` while pending; taking twice yields a protocol
    /// violation error.
    pub(crate) fn try_take(&self, op: &'static str) -> Option<crate::Result<T>> {
        let mut inner = self.inner.lock().expect("completion state lock poisoned");
        match inner.payload {
            Payload::Pending => None,
            Payload::Retrieved => Some(Err(Error::new(
                ErrorKind::ResultRetrieved,
                op,
                "result payload has already been retrieved",
            ))),
            Payload::Value(_) | Payload::Error(_) => {
                match std::mem::replace(&mut inner.payload, Payload::Retrieved) {
                    Payload::Value(value) => Some(Ok(value)),
                    Payload::Error(error) => Some(Err(error)),
                    Payload::Pending | Payload::Retrieved => {
                        unreachable!("payload variant changed under the lock")
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending_continuation(&self) -> bool {
        matches!(
            self.inner
                .lock()
                .expect("completion state lock poisoned")
                .continuation,
            ContinuationSlot::Registered(_)
        )
    }

    #[cfg(test)]
    pub(crate) fn was_started(&self) -> bool {
        self.inner
            .lock()
            .expect("completion state lock poisoned")
            .started
    }
}

impl<T: Send + 'static> CompletionState<T> {
    /// Creates a deferred state whose work runs when first forced.
    pub(crate) fn new_deferred(f: impl FnOnce() -> crate::Result<T> + Send + 'static) -> Arc<Self> {
        let state = Arc::new(Self {
            inner: Mutex::new(Inner {
                payload: Payload::Pending,
                continuation: ContinuationSlot::Idle,
                started: false,
                starter: None,
            }),
        });
        let weak = Arc::downgrade(&state);
        let starter: Continuation = Box::new(move || {
            if let Some(state) = Weak::upgrade(&weak) {
                run_into(f, &state);
            }
        });
        state
            .inner
            .lock()
            .expect("completion state lock poisoned")
            .starter = Some(starter);
        state
    }
}

impl<T: Send + 'static> CompletionObserver for CompletionState<T> {
    fn is_ready(&self) -> bool {
        Self::is_ready(self)
    }

    fn force_start(&self) {
        Self::force_start(self);
    }

    fn try_register(&self, continuation: Continuation) -> Result<(), Continuation> {
        Self::try_register(self, continuation)
    }
}

/// Runs `f`, converting panics into task errors, and completes `state` with
/// the outcome.
pub(crate) fn run_into<T>(f: impl FnOnce() -> crate::Result<T>, state: &Arc<CompletionState<T>>) {
    let outcome = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::panicked(payload.as_ref())),
    };
    if let Err(err) = state.complete(outcome, "filament::task") {
        tracing::error!(error = %err, "task tried to complete an already-completed state");
    }
}
