//! Step results and handback values flowing between frames

use crate::errors::EngineError;
use crate::frame::Suspended;

/// What an unwind-aware call returns to its caller.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<T> {
    /// The call completed normally with a value.
    Done(T),
    /// The call suspended itself into the frame chain; the caller must
    /// propagate this signal (after capturing its own frame if it still has
    /// work to do).
    Unwound,
}

/// Result type used by every unwind-aware function and continuation.
pub type StepResult<T> = Result<Step<T>, EngineError>;

/// The handback delivered to a resumed continuation: the value produced by
/// the step that ran just before it.
#[derive(Debug)]
pub enum Resumed<T> {
    /// Nothing to deliver (first resumption of a sentinel-tripped frame, or a
    /// task redriven without a value).
    Empty,
    /// The completed callee's result.
    Value(T),
    /// Control was explicitly transferred here: `from` is the task that
    /// switched away, `value` is what it passed.
    Switched { from: Suspended<T>, value: T },
}

impl<T> Resumed<T> {
    /// Extract a plain callee result, failing fast on any other variant.
    pub fn into_value(self) -> Result<T, EngineError> {
        match self {
            Resumed::Value(value) => Ok(value),
            Resumed::Empty => Err(EngineError::UnexpectedResume("expected a value, got nothing")),
            Resumed::Switched { .. } => Err(EngineError::UnexpectedResume(
                "expected a value, got a switched-in task",
            )),
        }
    }

    /// Extract a switch handback, failing fast on any other variant.
    pub fn into_switched(self) -> Result<(Suspended<T>, T), EngineError> {
        match self {
            Resumed::Switched { from, value } => Ok((from, value)),
            _ => Err(EngineError::UnexpectedResume("expected a switched-in task")),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Resumed::Empty)
    }
}

/// Final outcome of an entry-point call.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The logical call ran to completion.
    Complete(T),
    /// The task yielded and is still in flight; redrive it later with
    /// [`crate::Engine::resume`].
    Yielded(Suspended<T>, Option<T>),
}

impl<T> Outcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    /// The completed value, if the call finished in this slice.
    pub fn into_complete(self) -> Option<T> {
        match self {
            Outcome::Complete(value) => Some(value),
            Outcome::Yielded(..) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_value_variants() {
        assert_eq!(Resumed::Value(7).into_value(), Ok(7));
        assert!(matches!(
            Resumed::<i64>::Empty.into_value(),
            Err(EngineError::UnexpectedResume(_))
        ));
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome = Outcome::Complete(3);
        assert!(outcome.is_complete());
        assert_eq!(outcome.into_complete(), Some(3));
    }
}
