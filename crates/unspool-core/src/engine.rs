//! The engine: unwind state, the generated-call contract, and cooperative
//! transfer primitives
//!
//! One `Engine<T>` owns everything a logical thread of execution needs: the
//! frame arena, the depth sentinel, and the in-progress chain being assembled
//! during an unwind. Independent engines compose; within one engine the
//! unwind state is non-reentrant and the trampoline may only be driven
//! iteratively.

use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use crate::errors::EngineError;
use crate::frame::{Frame, FrameArena, FrameId, Suspended};
use crate::sentinel::{DepthSentinel, SentinelConfig};
use crate::stats::DispatchStats;
use crate::step::{Resumed, Step, StepResult};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// A pending explicit control transfer, consumed by the trampoline at the
/// next safe point.
pub(crate) enum Transfer<T> {
    /// Symmetric transfer to a captured task, carrying a value.
    Switch { target: Suspended<T>, value: T },
    /// One-sided transfer outward to the entry point.
    Yield { value: Option<T> },
}

/// Execution engine for one cooperative thread of control.
pub struct Engine<T> {
    pub(crate) arena: FrameArena<T>,
    /// Head of the in-progress chain: the most deeply nested pending call.
    pub(crate) top: Option<FrameId>,
    /// Tail of the in-progress chain: the outermost pending call. New frames
    /// are appended here, so chain order matches logical call order.
    pub(crate) bottom: Option<FrameId>,
    /// Value handed from a just-completed step to the next one.
    pub(crate) handback: Resumed<T>,
    pub(crate) transfer: Option<Transfer<T>>,
    pub(crate) sentinel: DepthSentinel,
    pub(crate) stats: DispatchStats,
    pub(crate) driving: bool,
    pub(crate) id: u64,
}

impl<T: 'static> Engine<T> {
    pub fn new() -> Self {
        Self::with_config(SentinelConfig::default())
    }

    pub fn with_config(config: SentinelConfig) -> Self {
        Engine {
            arena: FrameArena::new(),
            top: None,
            bottom: None,
            handback: Resumed::Empty,
            transfer: None,
            sentinel: DepthSentinel::new(config),
            stats: DispatchStats::default(),
            driving: false,
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Counters for the most recent entry-point call.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn sentinel(&self) -> &DepthSentinel {
        &self.sentinel
    }

    /// Frames currently alive in the arena (pending chain plus captured
    /// tasks). Useful for leak checks in hosts and tests.
    pub fn live_frames(&self) -> usize {
        self.arena.live()
    }

    /// True when no unwind is in progress and no transfer is pending.
    pub fn is_idle(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.transfer.is_none() && !self.driving
    }

    // ---- generated-call contract ----

    /// Perform a logical call. This is what a compiled self-recursive call
    /// site lowers to: probe the sentinel, and either recurse natively or
    /// capture `f` as the deepest frame of a fresh unwind.
    pub fn call<F>(&mut self, f: F) -> StepResult<T>
    where
        F: FnOnce(&mut Engine<T>) -> StepResult<T> + 'static,
    {
        if self.sentinel.should_unwind() {
            trace!(
                "sentinel tripped at depth {}; capturing call and unwinding",
                self.sentinel.depth()
            );
            return Ok(self.suspend(move |engine, _| f(engine)));
        }
        self.sentinel.enter();
        let step = f(self);
        self.sentinel.leave();
        step
    }

    /// Perform a logical call and hand its result to `rest`.
    ///
    /// On the native fast path `rest` runs immediately; if the callee
    /// unwinds, `rest` is captured as this caller's frame and receives the
    /// callee's eventual result when the trampoline resumes it. A call in
    /// tail position can skip this and return [`Engine::call`] directly,
    /// letting the unwind signal pass through without a frame of its own.
    pub fn call_then<F, K>(&mut self, f: F, rest: K) -> StepResult<T>
    where
        F: FnOnce(&mut Engine<T>) -> StepResult<T> + 'static,
        K: FnOnce(&mut Engine<T>, T) -> StepResult<T> + 'static,
    {
        match self.call(f)? {
            Step::Done(value) => rest(self, value),
            Step::Unwound => Ok(self.suspend(move |engine, resumed| {
                let value = resumed.into_value()?;
                rest(engine, value)
            })),
        }
    }

    /// Capture `rest` as a frame appended below the current chain bottom and
    /// return the unwinding signal for the caller to propagate.
    pub fn suspend<K>(&mut self, rest: K) -> Step<T>
    where
        K: FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T> + 'static,
    {
        let id = self.arena.insert(Frame::new(Box::new(rest)));
        match self.bottom {
            Some(bottom) => self.arena.link(bottom, Some(id)),
            None => {
                debug_assert!(self.top.is_none(), "chain bottom lost");
                self.top = Some(id);
            }
        }
        self.bottom = Some(id);
        self.stats.unwinds += 1;
        trace!("captured frame {:?} below chain bottom", id);
        Step::Unwound
    }

    // ---- cooperative transfer ----

    /// Bind `f` as a fresh, not-yet-run task. It stays inert in the arena
    /// until resumed or switched to.
    pub fn spawn<F>(&mut self, f: F) -> Suspended<T>
    where
        F: FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T> + 'static,
    {
        let id = self.arena.insert(Frame::new(Box::new(f)));
        trace!("spawned task with root frame {:?}", id);
        Suspended::new(self.id, id)
    }

    /// Symmetric transfer: suspend the calling chain and hand control (and
    /// `value`) to `target`. The target's first resumed frame receives
    /// [`Resumed::Switched`] carrying the calling task's handle, so the two
    /// parties can keep switching back and forth. `rest` runs when something
    /// switches back here.
    ///
    /// Fails fast if `target` was not produced by this engine or no longer
    /// refers to a live chain.
    pub fn switch<K>(&mut self, target: Suspended<T>, value: T, rest: K) -> StepResult<T>
    where
        K: FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T> + 'static,
    {
        self.check_handle(&target)?;
        debug_assert!(self.transfer.is_none(), "transfer already pending");
        trace!("switching to task {:?}", target);
        self.transfer = Some(Transfer::Switch { target, value });
        self.stats.switches += 1;
        Ok(self.suspend(rest))
    }

    /// Yield control outward to the entry point with no value. The entry
    /// returns [`crate::Outcome::Yielded`]; `rest` runs when the host
    /// redrives the task.
    pub fn yield_now<K>(&mut self, rest: K) -> Step<T>
    where
        K: FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T> + 'static,
    {
        self.transfer = Some(Transfer::Yield { value: None });
        self.suspend(rest)
    }

    /// Yield control outward to the entry point, passing `value` to the host.
    pub fn yield_value<K>(&mut self, value: T, rest: K) -> Step<T>
    where
        K: FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T> + 'static,
    {
        self.transfer = Some(Transfer::Yield { value: Some(value) });
        self.suspend(rest)
    }

    /// Free a captured task's chain without running it.
    pub fn discard(&mut self, task: Suspended<T>) -> Result<(), EngineError> {
        self.check_handle(&task)?;
        let mut cursor = Some(task.into_top());
        while let Some(id) = cursor {
            let frame = self.arena.take(id)?;
            cursor = frame.next;
        }
        Ok(())
    }

    pub(crate) fn check_handle(&self, task: &Suspended<T>) -> Result<(), EngineError> {
        if task.engine_id() != self.id {
            return Err(EngineError::ForeignHandle);
        }
        if !self.arena.contains(task.top()) {
            return Err(EngineError::StaleHandle);
        }
        Ok(())
    }
}

impl<T: 'static> Default for Engine<T> {
    fn default() -> Self {
        Self::new()
    }
}
