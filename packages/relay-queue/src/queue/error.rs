// queue error types.

use thiserror::Error;


/// Error for trying to submit into a queue which has been closed
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("queue closed")]
pub struct ClosedError;

/// Error for attempting to receive without blocking, and no value being available immediately
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("operation would block")]
pub struct WouldBlockError;

/// Error for trying to submit into a queue
///
/// Gives back the value that could not be submitted.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("failed to submit value: {cause}")]
pub struct SubmitError<T> {
    /// The value that could not be submitted
    pub value: T,
    /// The reason the value could not be submitted
    pub cause: ClosedError,
}

impl<T> SubmitError<T> {
    pub(crate) fn closed(value: T) -> Self {
        SubmitError { value, cause: ClosedError }
    }

    /// Take back the value that could not be submitted
    pub fn into_value(self) -> T {
        self.value
    }
}
