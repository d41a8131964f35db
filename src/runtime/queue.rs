//! Task queues: the per-pool global injection queue and per-unit local
//! queues with work-stealing handles.

use crossbeam_queue::SegQueue;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::runtime::task::Task;
use crate::util::DetRng;

/// A thread-safe unbounded queue for tasks submitted from outside the pool
/// or re-injected when a unit suspends.
#[derive(Debug, Default)]
pub(crate) struct GlobalQueue {
    inner: SegQueue<Task>,
}

impl GlobalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    pub(crate) fn push(&self, task: Task) {
        self.inner.push(task);
    }

    pub(crate) fn pop(&self) -> Option<Task> {
        self.inner.pop()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

/// A per-unit task queue.
///
/// The owning worker pushes and pops at the back (LIFO for cache warmth);
/// thieves steal from the front (FIFO, oldest first). Lock-based, which is
/// plenty for queues touched by one owner and occasional thieves.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalQueue {
    inner: Arc<Mutex<VecDeque<Task>>>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub(crate) fn push(&self, task: Task) {
        self.inner
            .lock()
            .expect("local queue lock poisoned")
            .push_back(task);
    }

    pub(crate) fn pop(&self) -> Option<Task> {
        self.inner
            .lock()
            .expect("local queue lock poisoned")
            .pop_back()
    }

    /// Removes every queued task, oldest first.
    ///
    /// Used when a unit suspends: its ready state is re-injected into the
    /// pool's global queue so no work is stranded.
    pub(crate) fn drain(&self) -> SmallVec<[Task; 8]> {
        self.inner
            .lock()
            .expect("local queue lock poisoned")
            .drain(..)
            .collect()
    }

    pub(crate) fn stealer(&self) -> Stealer {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A handle for stealing tasks from another unit's local queue.
#[derive(Debug, Clone)]
pub(crate) struct Stealer {
    inner: Arc<Mutex<VecDeque<Task>>>,
}

impl Stealer {
    pub(crate) fn steal(&self) -> Option<Task> {
        self.inner
            .lock()
            .expect("local queue lock poisoned")
            .pop_front()
    }
}

/// Tries each stealer once, starting at a random victim.
pub(crate) fn steal_task(stealers: &[Stealer], rng: &mut DetRng) -> Option<Task> {
    if stealers.is_empty() {
        return None;
    }
    let len = stealers.len();
    let start = rng.next_index(len);
    for i in 0..len {
        if let Some(task) = stealers[(start + i) % len].steal() {
            return Some(task);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Task::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn local_queue_is_lifo_for_owner() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let queue = LocalQueue::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            queue.push(Task::new(move || {
                order.lock().expect("order lock").push(i);
            }));
        }
        while let Some(task) = queue.pop() {
            task.run();
        }
        assert_eq!(*order.lock().expect("order lock"), vec![2, 1, 0]);
    }

    #[test]
    fn stealer_takes_oldest_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let queue = LocalQueue::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            queue.push(Task::new(move || {
                order.lock().expect("order lock").push(i);
            }));
        }
        let stealer = queue.stealer();
        stealer.steal().expect("oldest task").run();
        assert_eq!(*order.lock().expect("order lock"), vec![0]);
    }

    #[test]
    fn drain_empties_the_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = LocalQueue::new();
        for _ in 0..5 {
            queue.push(counting_task(&counter));
        }
        let drained = queue.drain();
        assert_eq!(drained.len(), 5);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn steal_task_covers_all_victims() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queues: Vec<LocalQueue> = (0..4).map(|_| LocalQueue::new()).collect();
        // Only the last queue has work.
        queues[3].push(counting_task(&counter));
        let stealers: Vec<Stealer> = queues.iter().map(LocalQueue::stealer).collect();
        let mut rng = DetRng::new(99);
        let task = steal_task(&stealers, &mut rng).expect("finds the one task");
        task.run();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(steal_task(&stealers, &mut rng).is_none());
    }

    #[test]
    fn global_queue_is_fifo() {
        let global = GlobalQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            global.push(Task::new(move || {
                order.lock().expect("order lock").push(i);
            }));
        }
        assert_eq!(global.len(), 3);
        while let Some(task) = global.pop() {
            task.run();
        }
        assert_eq!(*order.lock().expect("order lock"), vec![0, 1, 2]);
    }
}
