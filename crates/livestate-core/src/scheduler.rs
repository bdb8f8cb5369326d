#![forbid(unsafe_code)]

//! Cooperative task queue for deferred work.
//!
//! [`Scheduler`] is the "run after the current call stack unwinds" primitive
//! behind deferred setters. Tasks are plain closures run in FIFO submission
//! order whenever the host calls [`Scheduler::tick`] or
//! [`Scheduler::run_until_idle`]. Submission is fire-and-forget: there is no
//! cancellation handle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

type Task = Box<dyn FnOnce()>;

/// A shared FIFO of deferred tasks. Cloning shares the queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task for a later tick.
    pub fn submit(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the tasks that were queued when the tick started. Tasks submitted
    /// while the tick runs wait for the next one. Returns the number run.
    pub fn tick(&self) -> usize {
        let batch: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }
        if ran > 0 {
            trace!(ran, remaining = self.pending(), "scheduler tick");
        }
        ran
    }

    /// Tick until the queue is empty. Returns the total number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.tick();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}
