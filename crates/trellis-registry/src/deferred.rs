//! One-shot deferred registration queue.
//!
//! Binding setup that is expensive (or that needs types not yet loaded)
//! can be queued and run lazily at the first lookup. The queue settles
//! exactly once: the flushing thread takes every task, later flush calls
//! return the recorded outcome. A failure is cached and re-raised
//! verbatim by every subsequent lookup, so a broken deferred task cannot
//! be papered over by retrying. A task that performs a lookup on the
//! same registry would flush recursively; that is detected and fatal.

use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use trellis_core::RegistrationError;

use crate::registry::PluginRegistry;

pub(crate) type DeferredTask =
    Box<dyn FnOnce(&PluginRegistry) -> Result<(), RegistrationError> + Send>;

enum DeferredState {
    /// Tasks queued, nothing run yet.
    Pending(Vec<DeferredTask>),
    /// One thread is running the tasks; others wait on the condvar.
    Running { thread: ThreadId },
    Done,
    Failed(RegistrationError),
}

pub(crate) struct DeferredQueue {
    state: Mutex<DeferredState>,
    settled: Condvar,
}

impl DeferredQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DeferredState::Pending(Vec::new())),
            settled: Condvar::new(),
        }
    }

    /// Queue a task. Legal only before the queue settles.
    pub(crate) fn push(&self, task: DeferredTask) -> Result<(), RegistrationError> {
        let mut state = self.state.lock();
        match &mut *state {
            DeferredState::Pending(tasks) => {
                tasks.push(task);
                Ok(())
            }
            _ => Err(RegistrationError::DeferredAfterFlush),
        }
    }

    /// Run the queued tasks once and record the outcome. Every later
    /// call returns that same outcome without re-running anything.
    pub(crate) fn flush(&self, registry: &PluginRegistry) -> Result<(), RegistrationError> {
        let mut state = self.state.lock();
        let tasks = loop {
            match &mut *state {
                DeferredState::Done => return Ok(()),
                DeferredState::Failed(err) => return Err(err.clone()),
                DeferredState::Running { thread } => {
                    if *thread == thread::current().id() {
                        return Err(RegistrationError::RecursiveDeferredFlush);
                    }
                    self.settled.wait(&mut state);
                }
                DeferredState::Pending(tasks) => {
                    let tasks = std::mem::take(tasks);
                    *state = DeferredState::Running {
                        thread: thread::current().id(),
                    };
                    break tasks;
                }
            }
        };
        drop(state);

        if !tasks.is_empty() {
            tracing::debug!(tasks = tasks.len(), "running deferred registrations");
        }
        let mut outcome = Ok(());
        for task in tasks {
            if let Err(err) = task(registry) {
                outcome = Err(err);
                break;
            }
        }

        let mut state = self.state.lock();
        *state = match &outcome {
            Ok(()) => DeferredState::Done,
            Err(err) => DeferredState::Failed(err.clone()),
        };
        self.settled.notify_all();
        outcome
    }
}
