//! Cooperative multitasking over the unspool engine.
//!
//! Tasklets are suspended frame chains owned by a round-robin
//! [`Scheduler`]; they cooperate by yielding back to it and communicate over
//! rendezvous [`Channel`]s. A sender with a waiting receiver hands its value
//! over by switching straight to the receiver; without one it parks itself,
//! payload and all, until a receiver arrives.

pub mod channel;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use channel::Channel;
pub use scheduler::{SchedError, Scheduler};
