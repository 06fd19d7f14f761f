//! Error types for replay and fan-out caches
//!
//! Every cache operation reports failures through [`ReplayError`]. The type is
//! generic over the producer's own error so that a failing producer reaches the
//! cursor that triggered the pull unchanged.

use std::convert::Infallible;

/// Main error type for cache and cursor operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError<E = Infallible> {
    /// A constructor argument was out of range (for example a zero capacity)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Every cursor slot of a bounded cache has already been handed out
    #[error("Cursor capacity exceeded: at most {capacity} cursors may be created")]
    CapacityExceeded { capacity: usize },
    /// The cursor has already read every value the producer emitted
    #[error("Cursor exhausted")]
    Exhausted,
    /// The wrapped producer failed while being pulled
    #[error("Producer failed: {0}")]
    Producer(#[source] E),
}

impl<E> ReplayError<E> {
    /// Returns true for the normal end-of-stream condition
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ReplayError::Exhausted)
    }

    /// Returns the producer's error, if that is what this error carries
    pub fn into_producer_error(self) -> Option<E> {
        match self {
            ReplayError::Producer(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for replay operations
pub type ReplayResult<T, E = Infallible> = Result<T, ReplayError<E>>;
