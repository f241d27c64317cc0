//! Error types for the unwind/resume protocol

use std::fmt;

/// Errors reported by the engine.
///
/// Protocol violations (`NestedDispatch`, `ForeignHandle`, `StaleHandle`,
/// `UnexpectedResume`, `Protocol`) indicate a bug in the code driving the
/// engine and are never retried. `Fault` carries a logical failure raised by
/// the computation itself; it propagates through the trampoline to the entry
/// point like any other result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The trampoline was re-entered while already driving a chain.
    NestedDispatch,
    /// A dispatch was started, or an unwind signal observed, with no frame
    /// chain to drive.
    NoPendingChain,
    /// A suspended-task handle from a different engine was presented.
    ForeignHandle,
    /// A frame handle that no longer refers to a live frame was presented.
    StaleHandle,
    /// A continuation was resumed with a handback variant it cannot accept.
    UnexpectedResume(&'static str),
    /// A continuation broke the unwind contract (for example, returning a
    /// final value while leaving freshly captured frames behind).
    Protocol(&'static str),
    /// A failure raised by the wrapped computation.
    Fault(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NestedDispatch => {
                write!(f, "trampoline re-entered while already driving a chain")
            }
            EngineError::NoPendingChain => write!(f, "no pending frame chain to drive"),
            EngineError::ForeignHandle => {
                write!(f, "suspended task belongs to a different engine")
            }
            EngineError::StaleHandle => write!(f, "frame handle no longer refers to a live frame"),
            EngineError::UnexpectedResume(what) => write!(f, "unexpected resume value: {}", what),
            EngineError::Protocol(what) => write!(f, "unwind protocol violation: {}", what),
            EngineError::Fault(message) => write!(f, "task failed: {}", message),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Convenience constructor for logical task failures.
    pub fn fault(message: impl Into<String>) -> Self {
        EngineError::Fault(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            EngineError::NestedDispatch.to_string(),
            "trampoline re-entered while already driving a chain"
        );
        assert_eq!(
            EngineError::fault("boom").to_string(),
            "task failed: boom"
        );
        assert!(
            EngineError::UnexpectedResume("expected a plain value")
                .to_string()
                .contains("expected a plain value")
        );
    }
}
