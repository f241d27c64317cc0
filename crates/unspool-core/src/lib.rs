//! Stack-virtualization trampoline.
//!
//! Lets a computation recurse to arbitrary logical depth on a native call
//! stack of bounded size. When the [`DepthSentinel`] decides the native stack
//! is running out, the in-progress call chain unwinds itself into an explicit
//! chain of [`frame::Frame`]s, and the trampoline inside [`Engine`] re-drives
//! those frames one at a time until the logical computation completes. The
//! same machinery supports symmetric control transfer between cooperative
//! tasks ([`Engine::switch`]) and yielding a task back to its host
//! ([`Engine::yield_now`]).

pub mod engine;
pub mod errors;
pub mod frame;
pub mod sentinel;
pub mod stats;
pub mod step;

mod trampoline;

// Re-export commonly used types for convenience
pub use engine::Engine;
pub use errors::EngineError;
pub use frame::{FrameId, Suspended};
pub use sentinel::{DepthSentinel, SentinelConfig};
pub use stats::DispatchStats;
pub use step::{Outcome, Resumed, Step, StepResult};
