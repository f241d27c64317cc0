//! Entry points and the dispatch loop that drives frame chains

use log::{debug, trace};
use std::mem;

use crate::engine::{Engine, Transfer};
use crate::errors::EngineError;
use crate::frame::{FrameId, Suspended};
use crate::stats::DispatchStats;
use crate::step::{Outcome, Resumed, Step, StepResult};

impl<T: 'static> Engine<T> {
    /// Start a logical call. If it completes without unwinding, its value is
    /// returned directly; otherwise the trampoline drives the captured chain
    /// to completion (or to a yield).
    ///
    /// Unwind state is empty both before and after this call; only captured
    /// tasks survive in the arena between entry calls.
    pub fn dispatch<F>(&mut self, f: F) -> Result<Outcome<T>, EngineError>
    where
        F: FnOnce(&mut Engine<T>) -> StepResult<T>,
    {
        self.begin_entry()?;
        let result = self.dispatch_inner(f);
        self.end_entry();
        result
    }

    /// Redrive a previously captured task, optionally delivering a value to
    /// the frame it suspended on.
    pub fn resume(&mut self, task: Suspended<T>, value: Option<T>) -> Result<Outcome<T>, EngineError> {
        self.check_handle(&task)?;
        self.begin_entry()?;
        self.top = Some(task.into_top());
        self.handback = match value {
            Some(value) => Resumed::Value(value),
            None => Resumed::Empty,
        };
        let result = self.drive();
        self.end_entry();
        result
    }

    fn dispatch_inner<F>(&mut self, f: F) -> Result<Outcome<T>, EngineError>
    where
        F: FnOnce(&mut Engine<T>) -> StepResult<T>,
    {
        match f(self)? {
            Step::Done(value) => {
                if self.top.is_some() {
                    return Err(EngineError::Protocol(
                        "entry call completed while leaving captured frames behind",
                    ));
                }
                debug!("entry call completed without unwinding");
                Ok(Outcome::Complete(value))
            }
            Step::Unwound => {
                if self.top.is_none() {
                    return Err(EngineError::NoPendingChain);
                }
                self.drive()
            }
        }
    }

    fn begin_entry(&mut self) -> Result<(), EngineError> {
        if self.driving {
            return Err(EngineError::NestedDispatch);
        }
        self.driving = true;
        self.top = None;
        self.bottom = None;
        self.handback = Resumed::Empty;
        self.transfer = None;
        self.sentinel.reset();
        self.stats = DispatchStats::default();
        Ok(())
    }

    /// Leave the unwind state empty. A chain abandoned by a failed dispatch
    /// is freed here; captured tasks are untouched.
    fn end_entry(&mut self) {
        let mut cursor = self.top.take();
        while let Some(id) = cursor {
            match self.arena.take(id) {
                Ok(frame) => cursor = frame.next,
                Err(_) => break,
            }
        }
        self.bottom = None;
        self.handback = Resumed::Empty;
        self.transfer = None;
        self.sentinel.reset();
        self.driving = false;
    }

    /// The trampoline. Pops frames off the chain top and re-invokes their
    /// continuations, splicing in fresh unwinds, until the chain is exhausted
    /// or control is explicitly transferred away.
    fn drive(&mut self) -> Result<Outcome<T>, EngineError> {
        // the entry call itself may have switched or yielded before any
        // frame was ever driven
        if let Some(transfer) = self.transfer.take() {
            if let Some(outcome) = self.apply_transfer(transfer, None)? {
                return Ok(outcome);
            }
        }
        'pass: loop {
            self.stats.passes += 1;
            let mut pending = match self.top.take() {
                Some(id) => id,
                None => return Err(EngineError::NoPendingChain),
            };
            self.bottom = None;
            loop {
                let frame = self.arena.take(pending)?;
                let saved_caller = frame.next;
                // the native stack is empty again: a safe point
                self.sentinel.reset();
                let handback = mem::replace(&mut self.handback, Resumed::Empty);
                self.stats.steps += 1;
                let step = match (frame.resume)(self, handback) {
                    Ok(step) => step,
                    Err(error) => {
                        // a task fault propagates to the entry boundary like
                        // any other result; leave the rest of the chain
                        // reachable so end_entry can free it
                        match self.bottom {
                            Some(bottom) => self.arena.link(bottom, saved_caller),
                            None => self.top = saved_caller,
                        }
                        return Err(error);
                    }
                };

                if let Some(transfer) = self.transfer.take() {
                    if !matches!(step, Step::Unwound) {
                        return Err(EngineError::Protocol(
                            "transfer requested but the unwind signal was swallowed",
                        ));
                    }
                    match self.apply_transfer(transfer, saved_caller)? {
                        Some(outcome) => return Ok(outcome),
                        None => continue 'pass,
                    }
                }

                match step {
                    Step::Unwound => {
                        // a fresh unwind began beneath this frame; splice the
                        // new chain's bottom onto the saved caller and drive
                        // the new chain from its own top
                        if self.top.is_none() {
                            return Err(EngineError::NoPendingChain);
                        }
                        if let Some(bottom) = self.bottom {
                            self.arena.link(bottom, saved_caller);
                            self.stats.splices += 1;
                            trace!("spliced fresh chain onto caller {:?}", saved_caller);
                        }
                        continue 'pass;
                    }
                    Step::Done(value) => {
                        if self.top.is_some() {
                            return Err(EngineError::Protocol(
                                "continuation completed while leaving captured frames behind",
                            ));
                        }
                        match saved_caller {
                            None => {
                                debug!("chain exhausted after {} steps", self.stats.steps);
                                return Ok(Outcome::Complete(value));
                            }
                            Some(caller) => {
                                self.handback = Resumed::Value(value);
                                pending = caller;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Detach the current chain as a suspended task and act on the pending
    /// transfer. Returns the final outcome for a yield, or `None` after
    /// installing a switch target as the new chain.
    fn apply_transfer(
        &mut self,
        transfer: Transfer<T>,
        saved_caller: Option<FrameId>,
    ) -> Result<Option<Outcome<T>>, EngineError> {
        let captured = self.detach_chain(saved_caller)?;
        match transfer {
            Transfer::Yield { value } => {
                debug!("task {:?} yielded to the entry point", captured);
                Ok(Some(Outcome::Yielded(captured, value)))
            }
            Transfer::Switch { target, value } => {
                trace!("switched away from {:?} into {:?}", captured, target);
                self.handback = Resumed::Switched {
                    from: captured,
                    value,
                };
                self.top = Some(target.into_top());
                Ok(None)
            }
        }
    }

    /// Capture the in-progress chain (spliced onto `saved_caller`, the part
    /// of the old chain that was below the transfer point) as an owned task.
    fn detach_chain(&mut self, saved_caller: Option<FrameId>) -> Result<Suspended<T>, EngineError> {
        let top = self.top.take().ok_or(EngineError::NoPendingChain)?;
        match self.bottom.take() {
            Some(bottom) => self.arena.link(bottom, saved_caller),
            None => debug_assert!(saved_caller.is_none(), "chain bottom lost during transfer"),
        }
        Ok(Suspended::new(self.id, top))
    }
}
