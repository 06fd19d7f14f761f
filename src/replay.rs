//! Unbounded replay cache
//!
//! [`ReplayCache`] lets any number of cursors, created at any time, read the
//! full history of a single-pass producer. The producer is pulled at most once
//! per position and never further ahead than the most advanced cursor needs.
//! Nothing is ever evicted: the whole produced history lives as long as the
//! cache or any of its cursors. For long or infinite producers read by a known
//! number of consumers, use [`FanOutCache`](crate::fan_out::FanOutCache).

use std::cell::RefCell;
use std::convert::Infallible;
use std::iter::FusedIterator;
use std::rc::Rc;

use crate::cache::{Cache, Cursor};
use crate::cache_metrics::CacheStats;
use crate::error::ReplayResult;
use crate::producer::Source;
use crate::stream_configuration::BufferConfig;
use crate::window::SharedBuffer;

struct ReplayState<S: Source> {
    buffer: SharedBuffer<S>,
    cursors_created: usize,
}

/// A re-iterable view over a single-pass producer
///
/// Cloning the cache is cheap; every clone shares the same buffer.
pub struct ReplayCache<S: Source> {
    state: Rc<RefCell<ReplayState<S>>>,
}

impl<S: Source> Clone for ReplayCache<S> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<S> ReplayCache<S>
where
    S: Source,
    S::Item: Clone,
{
    /// Wrap `source`. The source is not pulled until a cursor reads.
    pub fn new(source: S) -> Self {
        Self::with_config(source, BufferConfig::default())
    }

    pub fn with_config(source: S, config: BufferConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(ReplayState {
                buffer: SharedBuffer::new(source, &config),
                cursors_created: 0,
            })),
        }
    }

    /// A fresh cursor at position 0. Never touches the producer.
    pub fn cursor(&self) -> ReplayCursor<S> {
        self.state.borrow_mut().cursors_created += 1;
        ReplayCursor {
            state: Rc::clone(&self.state),
            pos: 0,
        }
    }

    /// Another handle on this cache, sharing its buffer and producer.
    ///
    /// Replaying a replay cache never wraps it a second time.
    pub fn replay(&self) -> Self {
        self.clone()
    }

    /// Returns the cache if the producer yields at least one value.
    ///
    /// Pulls at most the first value, which stays buffered for every cursor.
    pub fn if_not_empty(self) -> Result<Option<Self>, S::Error> {
        let has_first = self.state.borrow_mut().buffer.fetch(0)?.is_some();
        Ok(has_first.then_some(self))
    }

    pub fn buffered_len(&self) -> usize {
        self.state.borrow().buffer.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.borrow();
        state.buffer.stats(state.cursors_created)
    }
}

impl<S> Cache for ReplayCache<S>
where
    S: Source,
    S::Item: Clone,
{
    type Cursor = ReplayCursor<S>;

    fn create_cursor(&self) -> ReplayResult<ReplayCursor<S>, S::Error> {
        Ok(self.cursor())
    }

    fn buffered_len(&self) -> usize {
        ReplayCache::buffered_len(self)
    }

    fn stats(&self) -> CacheStats {
        ReplayCache::stats(self)
    }
}

impl<'a, S> IntoIterator for &'a ReplayCache<S>
where
    S: Source<Error = Infallible>,
    S::Item: Clone,
{
    type Item = S::Item;
    type IntoIter = ReplayCursor<S>;

    fn into_iter(self) -> Self::IntoIter {
        self.cursor()
    }
}

/// Replayable cursor over a [`ReplayCache`]
pub struct ReplayCursor<S: Source> {
    state: Rc<RefCell<ReplayState<S>>>,
    pos: usize,
}

impl<S> Cursor for ReplayCursor<S>
where
    S: Source,
    S::Item: Clone,
{
    type Item = S::Item;
    type Error = S::Error;

    fn try_next(&mut self) -> Result<Option<S::Item>, S::Error> {
        let mut state = self.state.borrow_mut();
        let item = match state.buffer.fetch(self.pos)? {
            Some(item) => item.clone(),
            None => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(item))
    }

    fn has_next(&mut self) -> Result<bool, S::Error> {
        Ok(self.state.borrow_mut().buffer.fetch(self.pos)?.is_some())
    }

    fn position(&self) -> usize {
        self.pos
    }
}

impl<S> Iterator for ReplayCursor<S>
where
    S: Source<Error = Infallible>,
    S::Item: Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        match self.try_next() {
            Ok(item) => item,
            Err(never) => match never {},
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let state = self.state.borrow();
        let ahead = state.buffer.end() - self.pos;
        if state.buffer.is_finished() {
            (ahead, Some(ahead))
        } else {
            (ahead, None)
        }
    }
}

impl<S> FusedIterator for ReplayCursor<S>
where
    S: Source<Error = Infallible>,
    S::Item: Clone,
{
}
