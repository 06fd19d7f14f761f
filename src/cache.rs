//! The capability set shared by every cache: create cursors, read cursors.
//!
//! [`ReplayCache`](crate::replay::ReplayCache) and
//! [`FanOutCache`](crate::fan_out::FanOutCache) are two concrete types behind
//! these traits; code that only needs to read can be written once against
//! [`Cursor`].

use crate::cache_metrics::CacheStats;
use crate::error::{ReplayError, ReplayResult};

/// An independent read position into a cache
pub trait Cursor {
    type Item;
    type Error;

    /// Read the next value, pulling the producer if nobody has produced it yet.
    /// Exhaustion is reported as `Ok(None)`.
    fn try_next(&mut self) -> Result<Option<Self::Item>, Self::Error>;

    /// Whether another value is available. May pull (and memoize) one value.
    fn has_next(&mut self) -> Result<bool, Self::Error>;

    /// Absolute position of the next value this cursor will read
    fn position(&self) -> usize;

    /// Like [`try_next`](Self::try_next), with exhaustion reported as
    /// [`ReplayError::Exhausted`].
    fn next_value(&mut self) -> ReplayResult<Self::Item, Self::Error> {
        self.try_next()
            .map_err(ReplayError::Producer)?
            .ok_or(ReplayError::Exhausted)
    }

    /// Iterate over `Result`s, stopping after the first producer error
    fn try_iter(self) -> TryIter<Self>
    where
        Self: Sized,
    {
        TryIter {
            cursor: self,
            done: false,
        }
    }
}

/// A shared buffer over one producer that hands out cursors
pub trait Cache {
    type Cursor: Cursor;

    /// Hand out a new cursor starting at position 0
    fn create_cursor(&self) -> ReplayResult<Self::Cursor, <Self::Cursor as Cursor>::Error>;

    /// Number of values currently retained
    fn buffered_len(&self) -> usize;

    fn stats(&self) -> CacheStats;
}

/// Iterator over a cursor of a fallible producer, see [`Cursor::try_iter`]
pub struct TryIter<C> {
    cursor: C,
    done: bool,
}

impl<C> TryIter<C> {
    pub fn into_inner(self) -> C {
        self.cursor
    }
}

impl<C: Cursor> Iterator for TryIter<C> {
    type Item = Result<C::Item, C::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.try_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<C: Cursor> std::iter::FusedIterator for TryIter<C> {}
