//! Frame records and the arena that owns them
//!
//! A [`Frame`] captures exactly what is needed to re-enter a suspended call:
//! a boxed continuation (which closes over the function to re-enter, its
//! resume point, and its saved locals) plus a link to the frame representing
//! the logical caller. Chains are strictly linear and mirror call order:
//! `next` always points from callee-frame toward caller-frame.
//!
//! Frames live in a [`FrameArena`]: a slab of slots with a free list and
//! per-slot generation counters, so chain operations are index rewrites and a
//! handle that outlives its frame is detected instead of resurrecting a slot.

use std::marker::PhantomData;

use crate::engine::Engine;
use crate::errors::EngineError;
use crate::step::{Resumed, StepResult};

/// Boxed continuation stored in a frame. Invoked at most once, with the
/// handback produced by the previous step.
pub(crate) type ResumeFn<T> = Box<dyn FnOnce(&mut Engine<T>, Resumed<T>) -> StepResult<T>>;

/// Handle to a frame slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    index: u32,
    generation: u32,
}

/// A reified pending call.
pub(crate) struct Frame<T> {
    pub(crate) resume: ResumeFn<T>,
    /// Link toward the logical caller ("what to do after this completes").
    pub(crate) next: Option<FrameId>,
}

impl<T> Frame<T> {
    pub(crate) fn new(resume: ResumeFn<T>) -> Self {
        Frame { resume, next: None }
    }
}

impl<T> std::fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

/// Owning handle to a captured task: a detached frame chain waiting to be
/// resumed, switched to, or discarded.
///
/// The handle is deliberately not clonable; it is consumed by
/// [`Engine::resume`], [`Engine::switch`], or [`Engine::discard`], so a chain
/// can never be driven twice.
pub struct Suspended<T> {
    engine: u64,
    top: FrameId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Suspended<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suspended")
            .field("engine", &self.engine)
            .field("top", &self.top)
            .finish()
    }
}

impl<T> Suspended<T> {
    pub(crate) fn new(engine: u64, top: FrameId) -> Self {
        Suspended {
            engine,
            top,
            _marker: PhantomData,
        }
    }

    pub(crate) fn engine_id(&self) -> u64 {
        self.engine
    }

    pub(crate) fn top(&self) -> FrameId {
        self.top
    }

    pub(crate) fn into_top(self) -> FrameId {
        self.top
    }
}

struct Slot<T> {
    generation: u32,
    frame: Option<Frame<T>>,
}

/// Slab of frame slots with a free list.
pub(crate) struct FrameArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> FrameArena<T> {
    pub(crate) fn new() -> Self {
        FrameArena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, frame: Frame<T>) -> FrameId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.frame = Some(frame);
            FrameId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                frame: Some(frame),
            });
            FrameId {
                index,
                generation: 0,
            }
        }
    }

    /// Remove a frame, consuming it. The slot's generation advances so any
    /// copy of the handle is invalidated.
    pub(crate) fn take(&mut self, id: FrameId) -> Result<Frame<T>, EngineError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .ok_or(EngineError::StaleHandle)?;
        if slot.generation != id.generation {
            return Err(EngineError::StaleHandle);
        }
        let frame = slot.frame.take().ok_or(EngineError::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(frame)
    }

    pub(crate) fn contains(&self, id: FrameId) -> bool {
        match self.slots.get(id.index as usize) {
            Some(slot) => slot.generation == id.generation && slot.frame.is_some(),
            None => false,
        }
    }

    /// Rewrite a live frame's caller link.
    pub(crate) fn link(&mut self, id: FrameId, next: Option<FrameId>) {
        debug_assert!(self.contains(id), "linking a dead frame");
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation {
                if let Some(frame) = slot.frame.as_mut() {
                    frame.next = next;
                }
            }
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }
}
