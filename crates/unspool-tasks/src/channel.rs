//! Rendezvous channels between tasklets
//!
//! Mirrors the classic tasklet channel contract: sending with a waiting
//! receiver hands the value over immediately (the receiver runs on, the
//! sender is requeued); sending with no receiver parks the sender together
//! with its payload. Receiving is symmetric.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;
use unspool_core::{Engine, EngineError, Resumed, StepResult, Suspended};

use crate::scheduler::{ParkSlot, Ready, RunQueue, SchedShared};

struct ChannelInner<T> {
    /// Parked senders with their payloads.
    senders: VecDeque<(ParkSlot<T>, T)>,
    /// Parked receivers.
    receivers: VecDeque<ParkSlot<T>>,
    /// Parked senders minus parked receivers, tasklet-channel style.
    balance: isize,
}

/// A rendezvous channel. Clones share the same queue.
pub struct Channel<T> {
    inner: Rc<RefCell<ChannelInner<T>>>,
    ready: RunQueue<T>,
    shared: SchedShared<T>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: self.inner.clone(),
            ready: self.ready.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T: 'static> Channel<T> {
    pub(crate) fn new(ready: RunQueue<T>, shared: SchedShared<T>) -> Self {
        Channel {
            inner: Rc::new(RefCell::new(ChannelInner {
                senders: VecDeque::new(),
                receivers: VecDeque::new(),
                balance: 0,
            })),
            ready,
            shared,
        }
    }

    /// Parked senders minus parked receivers.
    pub fn balance(&self) -> isize {
        self.inner.borrow().balance
    }

    /// Send `value` over the channel; `rest` runs once the value has been
    /// handed over and this task is scheduled again.
    ///
    /// With a receiver waiting, control switches straight to it and the
    /// receiver requeues this task. Otherwise the sender parks with its
    /// payload until a receiver takes it.
    pub fn send<K>(&self, engine: &mut Engine<T>, value: T, rest: K) -> StepResult<T>
    where
        K: FnOnce(&mut Engine<T>) -> StepResult<T> + 'static,
    {
        let receiver = self.take_parked_receiver();
        match receiver {
            Some(task) => {
                self.shared.borrow_mut().blocked -= 1;
                trace!("send: waking parked receiver by direct switch");
                engine.switch(task, value, move |e, _| rest(e))
            }
            None => {
                let slot: ParkSlot<T> = Rc::new(RefCell::new(None));
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.senders.push_back((slot.clone(), value));
                    inner.balance += 1;
                }
                self.park(slot);
                trace!("send: no receiver, parking with payload");
                Ok(engine.yield_now(move |e, resumed| match resumed {
                    // woken by a receiver that already took the payload
                    Resumed::Empty | Resumed::Value(_) => rest(e),
                    Resumed::Switched { .. } => Err(EngineError::UnexpectedResume(
                        "parked sender woken by a direct switch",
                    )),
                }))
            }
        }
    }

    /// Receive a value from the channel; `rest` runs with the value.
    ///
    /// With a sender parked, its payload is taken and the sender requeued.
    /// Otherwise the receiver parks until a sender arrives.
    pub fn recv<K>(&self, engine: &mut Engine<T>, rest: K) -> StepResult<T>
    where
        K: FnOnce(&mut Engine<T>, T) -> StepResult<T> + 'static,
    {
        let sender = {
            let mut inner = self.inner.borrow_mut();
            let sender = inner.senders.pop_front();
            if sender.is_some() {
                inner.balance -= 1;
            }
            sender
        };
        match sender {
            Some((slot, value)) => {
                if let Some(task) = slot.borrow_mut().take() {
                    self.shared.borrow_mut().blocked -= 1;
                    trace!("recv: took parked sender's payload, requeueing it");
                    self.ready.borrow_mut().push_back(Ready { task, value: None });
                }
                rest(engine, value)
            }
            None => {
                let slot: ParkSlot<T> = Rc::new(RefCell::new(None));
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.receivers.push_back(slot.clone());
                    inner.balance -= 1;
                }
                self.park(slot);
                trace!("recv: no sender, parking");
                let ready = self.ready.clone();
                Ok(engine.yield_now(move |e, resumed| match resumed {
                    Resumed::Value(value) => rest(e, value),
                    Resumed::Switched { from, value } => {
                        // a sender switched straight here; requeue it
                        ready.borrow_mut().push_back(Ready {
                            task: from,
                            value: None,
                        });
                        rest(e, value)
                    }
                    Resumed::Empty => Err(EngineError::UnexpectedResume(
                        "parked receiver woken without a value",
                    )),
                }))
            }
        }
    }

    /// Pop the next parked receiver that actually holds a captured task.
    fn take_parked_receiver(&self) -> Option<Suspended<T>> {
        let mut inner = self.inner.borrow_mut();
        while let Some(slot) = inner.receivers.pop_front() {
            inner.balance += 1;
            if let Some(task) = slot.borrow_mut().take() {
                return Some(task);
            }
        }
        None
    }

    /// Arrange for the scheduler to park this task's handle in `slot` when
    /// the imminent yield surfaces.
    fn park(&self, slot: ParkSlot<T>) {
        let mut shared = self.shared.borrow_mut();
        debug_assert!(shared.park_into.is_none(), "two parks in one yield");
        shared.park_into = Some(slot);
        shared.blocked += 1;
    }
}
