//! The unit of work moved through pool queues.

/// A cooperative task: a boxed closure run to completion on a worker.
///
/// The closure owns everything the task needs, including the completion
/// state it reports into; the queues never look inside.
pub(crate) struct Task {
    run: Box<dyn FnOnce() + Send>,
}

impl Task {
    /// Wraps a closure as a queueable task.
    pub(crate) fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self { run: Box::new(f) }
    }

    /// Executes the task, consuming it.
    pub(crate) fn run(self) {
        (self.run)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
