//! Counters describing one entry-point dispatch

use serde::{Deserialize, Serialize};

/// Counters collected while driving a single entry-point call. Reset at the
/// start of every [`crate::Engine::dispatch`] / [`crate::Engine::resume`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Continuation invocations performed by the trampoline.
    pub steps: u64,
    /// Frames captured by the unwind protocol.
    pub unwinds: u64,
    /// Nested-unwind chain segments spliced onto a saved caller.
    pub splices: u64,
    /// Explicit control transfers (switch).
    pub switches: u64,
    /// Outer trampoline passes.
    pub passes: u64,
}
