//! Serialised, re-entrant access to a stage's state.
//!
//! A `Gate` owns the state of one stage (store, sort, window...) behind a
//! re-entrant mutex. All mutation and delivery for the stage runs while the
//! gate is held, so subscribers of one stage observe change sets one at a
//! time and in order.
//!
//! Delivery is where re-entrancy shows up: a subscriber may call back into
//! the stage that is notifying it. Such nested calls are not run inside the
//! delivery. They are queued on the gate and drained, in call order, once
//! the outer call has finished delivering and before it returns.

use parking_lot::ReentrantMutex;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Job<S> = Box<dyn FnOnce(&Gate<S>) + Send>;

struct GateCell<S> {
    state: RefCell<S>,
    /// True while the outermost `run` on the owning thread is active
    draining: Cell<bool>,
    backlog: RefCell<VecDeque<Job<S>>>,
}

/// Serialises access to a stage's state.
pub struct Gate<S> {
    cell: ReentrantMutex<GateCell<S>>,
}

impl<S> Gate<S> {
    /// Creates a gate around `state`.
    pub fn new(state: S) -> Self {
        Self {
            cell: ReentrantMutex::new(GateCell {
                state: RefCell::new(state),
                draining: Cell::new(false),
                backlog: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// Reads the state.
    ///
    /// # Panics
    ///
    /// Panics if called from inside `write` on the same gate.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.cell.lock();
        let state = guard.state.borrow();
        f(&state)
    }

    /// Mutates the state. `f` must not call back into the gate.
    pub fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let guard = self.cell.lock();
        let mut state = guard.state.borrow_mut();
        f(&mut state)
    }

    /// Runs a two-phase operation under the gate.
    ///
    /// `prepare` runs immediately with shared access to the state and may
    /// call user code. If it returns a job, the job runs once every job
    /// queued before it has finished: immediately for an outermost call,
    /// or after the current delivery when called from inside one.
    pub fn run<P, J>(&self, prepare: P)
    where
        P: FnOnce(&S) -> Option<J>,
        J: FnOnce(&Gate<S>) + Send + 'static,
    {
        let guard = self.cell.lock();
        let outermost = !guard.draining.replace(true);
        let _drain = outermost.then(|| DrainGuard { cell: &*guard });

        let job = {
            let state = guard.state.borrow();
            prepare(&state)
        };

        if let Some(job) = job {
            if outermost {
                job(self);
            } else {
                let mut backlog = guard.backlog.borrow_mut();
                backlog.push_back(Box::new(job));
                tracing::trace!(queued = backlog.len(), "nested operation deferred");
            }
        }

        if outermost {
            loop {
                let next = guard.backlog.borrow_mut().pop_front();
                match next {
                    Some(job) => job(self),
                    None => break,
                }
            }
        }
    }

    /// Returns true while a `run` is active on the calling thread.
    pub fn is_draining(&self) -> bool {
        self.cell.lock().draining.get()
    }
}

/// Resets the gate when the outermost `run` ends, including by panic.
struct DrainGuard<'a, S> {
    cell: &'a GateCell<S>,
}

impl<S> Drop for DrainGuard<'_, S> {
    fn drop(&mut self) {
        self.cell.draining.set(false);
        if std::thread::panicking() {
            let discarded = self.cell.backlog.borrow_mut().drain(..).count();
            if discarded > 0 {
                tracing::warn!(discarded, "subscriber panicked; discarding queued operations");
            }
        }
    }
}
