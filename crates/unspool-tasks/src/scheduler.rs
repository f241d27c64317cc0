//! Round-robin scheduler for cooperative tasklets

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};
use unspool_core::{Engine, EngineError, Outcome, Resumed, SentinelConfig, StepResult, Suspended};

/// A task ready to run, with the value (if any) to deliver when it resumes.
pub(crate) struct Ready<T> {
    pub(crate) task: Suspended<T>,
    pub(crate) value: Option<T>,
}

/// Run queue shared between the scheduler and channels, so a channel can
/// requeue a peer it has woken.
pub(crate) type RunQueue<T> = Rc<RefCell<VecDeque<Ready<T>>>>;

/// Slot a blocking task parks its own handle into. The task pushes the slot
/// where it wants to wait, yields, and the scheduler fills the slot with the
/// captured handle instead of requeueing it.
pub(crate) type ParkSlot<T> = Rc<RefCell<Option<Suspended<T>>>>;

pub(crate) struct SharedState<T> {
    /// Set by a task just before it yields to block; consumed by the
    /// scheduler when the yield surfaces.
    pub(crate) park_into: Option<ParkSlot<T>>,
    /// Number of tasks parked off the run queue.
    pub(crate) blocked: usize,
}

pub(crate) type SchedShared<T> = Rc<RefCell<SharedState<T>>>;

/// Scheduler errors.
#[derive(Debug)]
pub enum SchedError {
    /// The run queue drained while tasks were still parked on channels.
    Deadlock(usize),
    /// The engine reported a protocol error or a task fault.
    Engine(EngineError),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::Deadlock(blocked) => {
                write!(f, "deadlock: {} task(s) blocked with nothing runnable", blocked)
            }
            SchedError::Engine(error) => write!(f, "engine error: {}", error),
        }
    }
}

impl std::error::Error for SchedError {}

impl From<EngineError> for SchedError {
    fn from(error: EngineError) -> Self {
        SchedError::Engine(error)
    }
}

/// Round-robin driver for cooperative tasklets.
///
/// Tasks yield back here with [`Engine::yield_now`]: the yielder goes to the
/// back of the queue and the next runnable task resumes. A task that yields a
/// value gets that value handed back to itself on its next turn.
pub struct Scheduler<T> {
    engine: Engine<T>,
    ready: RunQueue<T>,
    shared: SchedShared<T>,
}

impl<T: 'static> Scheduler<T> {
    pub fn new() -> Self {
        Self::with_config(SentinelConfig::default())
    }

    pub fn with_config(config: SentinelConfig) -> Self {
        Scheduler {
            engine: Engine::with_config(config),
            ready: Rc::new(RefCell::new(VecDeque::new())),
            shared: Rc::new(RefCell::new(SharedState {
                park_into: None,
                blocked: 0,
            })),
        }
    }

    /// Bind a closure as a tasklet and put it on the run queue.
    pub fn spawn<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T> + 'static,
    {
        let task = self.engine.spawn(f);
        self.ready.borrow_mut().push_back(Ready { task, value: None });
    }

    /// Create a channel whose peers wake into this scheduler's run queue.
    pub fn channel(&self) -> crate::Channel<T> {
        crate::Channel::new(self.ready.clone(), self.shared.clone())
    }

    /// Drive tasks round-robin until every task has completed. Returns the
    /// completed values in completion order, or a deadlock error if the run
    /// queue drains while tasks are still parked.
    pub fn run(&mut self) -> Result<Vec<T>, SchedError> {
        let mut finished = Vec::new();
        loop {
            let next = self.ready.borrow_mut().pop_front();
            let Some(Ready { task, value }) = next else {
                break;
            };
            match self.engine.resume(task, value) {
                Ok(Outcome::Complete(value)) => {
                    trace!("task completed");
                    finished.push(value);
                }
                Ok(Outcome::Yielded(task, value)) => {
                    let park = self.shared.borrow_mut().park_into.take();
                    match park {
                        Some(slot) => {
                            trace!("task parked off the run queue");
                            *slot.borrow_mut() = Some(task);
                        }
                        None => self.ready.borrow_mut().push_back(Ready { task, value }),
                    }
                }
                Err(error) => return Err(SchedError::Engine(error)),
            }
        }
        let blocked = self.shared.borrow().blocked;
        if blocked > 0 {
            debug!("run queue drained with {} task(s) still parked", blocked);
            return Err(SchedError::Deadlock(blocked));
        }
        Ok(finished)
    }

    /// Tasks waiting on the run queue.
    pub fn runnable(&self) -> usize {
        self.ready.borrow().len()
    }

    /// Tasks parked on channels.
    pub fn blocked(&self) -> usize {
        self.shared.borrow().blocked
    }
}

impl<T: 'static> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
