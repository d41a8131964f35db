//! Execution-context agents: the suspension/resumption handle for whatever
//! is currently running, whether that is a task on a pool worker or a plain
//! OS thread.
//!
//! Every thread owns one [`AgentRef`], reachable through [`current`]. A
//! blocking operation captures the current agent, registers a continuation
//! that will [`resume`](AgentRef::resume) it, and then calls [`suspend`].
//! Completers compare the captured agent against their own before resuming:
//! resuming yourself is how a waiter that was satisfied synchronously on its
//! own call stack avoids parking forever.
//!
//! Agents are compared by identity, not value; two clones of the same
//! thread's agent are equal.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A handle to a suspendable execution context.
#[derive(Debug, Clone)]
pub struct AgentRef {
    inner: Arc<AgentInner>,
}

#[derive(Debug)]
struct AgentInner {
    parker: Parker,
}

impl AgentRef {
    fn new() -> Self {
        Self {
            inner: Arc::new(AgentInner {
                parker: Parker::new(),
            }),
        }
    }

    /// Resumes the context this agent refers to.
    ///
    /// Resuming before the context suspends is fine: the next suspension
    /// returns immediately. Waiters therefore always re-check their wake
    /// condition in a loop.
    pub fn resume(&self) {
        self.inner.parker.unpark();
    }
}

impl PartialEq for AgentRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AgentRef {}

thread_local! {
    static CURRENT: AgentRef = AgentRef::new();
}

/// Returns the agent of the calling context.
#[must_use]
pub fn current() -> AgentRef {
    CURRENT.with(Clone::clone)
}

/// Suspends the calling context until some other context resumes its agent.
pub fn suspend() {
    CURRENT.with(|agent| agent.inner.parker.park());
}

/// A one-token parking primitive.
///
/// `unpark` before `park` leaves a token that the next `park` consumes, so
/// the wake is never lost; a stray token at worst causes one spurious
/// return, which callers absorb by re-checking their condition.
#[derive(Debug, Clone)]
pub(crate) struct Parker {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Parker {
    /// Creates a new parker with no token.
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Parks the current thread until a token is available, consuming it.
    pub(crate) fn park(&self) {
        let (lock, cvar) = &*self.inner;
        let mut notified = lock.lock().expect("parker lock poisoned");
        while !*notified {
            notified = cvar.wait(notified).expect("parker lock poisoned");
        }
        *notified = false;
    }

    /// Parks with a timeout; consumes the token if one arrived.
    pub(crate) fn park_timeout(&self, duration: Duration) {
        let (lock, cvar) = &*self.inner;
        let mut notified = lock.lock().expect("parker lock poisoned");
        if !*notified {
            let (guard, _result) = cvar
                .wait_timeout(notified, duration)
                .expect("parker lock poisoned");
            notified = guard;
        }
        *notified = false;
    }

    /// Deposits a token, waking a parked thread if there is one.
    pub(crate) fn unpark(&self) {
        let (lock, cvar) = &*self.inner;
        {
            let mut notified = lock.lock().expect("parker lock poisoned");
            *notified = true;
        }
        cvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn current_agent_is_stable_per_thread() {
        let a = current();
        let b = current();
        assert_eq!(a, b);
    }

    #[test]
    fn agents_differ_across_threads() {
        let here = current();
        let there = thread::spawn(current).join().expect("thread panicked");
        assert_ne!(here, there);
    }

    #[test]
    fn resume_wakes_suspended_thread() {
        let (agent_tx, agent_rx) = std::sync::mpsc::channel();
        let waiter = thread::spawn(move || {
            agent_tx.send(current()).expect("send agent");
            suspend();
            42
        });
        let agent = agent_rx.recv().expect("receive agent");
        thread::sleep(Duration::from_millis(20));
        agent.resume();
        assert_eq!(waiter.join().expect("waiter panicked"), 42);
    }

    #[test]
    fn resume_before_suspend_is_not_lost() {
        let agent = current();
        agent.resume();
        // Token already deposited: suspend returns immediately.
        suspend();
    }

    #[test]
    fn park_timeout_returns_without_token() {
        let parker = Parker::new();
        let start = std::time::Instant::now();
        parker.park_timeout(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
