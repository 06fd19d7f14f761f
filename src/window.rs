//! Eviction window: buffered values addressed by absolute position

use std::collections::VecDeque;

use crate::cache_metrics::CacheStats;
use crate::producer::{Producer, Source};
use crate::stream_configuration::BufferConfig;

/// Values at absolute positions `[base, base + len)`.
///
/// Cursors address the window by position only; dropping a value from the
/// front never leaves a cursor holding a reference into the arena.
pub(crate) struct Window<T> {
    values: VecDeque<T>,
    base: usize,
    peak: usize,
}

impl<T> Window<T> {
    pub(crate) fn new(config: &BufferConfig) -> Self {
        Self {
            values: VecDeque::with_capacity(config.initial_capacity),
            base: 0,
            peak: 0,
        }
    }

    /// Smallest retained position (equals the number of evicted values)
    pub(crate) fn base(&self) -> usize {
        self.base
    }

    /// One past the highest position pushed so far
    pub(crate) fn end(&self) -> usize {
        self.base + self.values.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak
    }

    pub(crate) fn get(&self, pos: usize) -> Option<&T> {
        pos.checked_sub(self.base)
            .and_then(|offset| self.values.get(offset))
    }

    /// Append the value for position [`end`](Self::end)
    pub(crate) fn push(&mut self, value: T) {
        self.values.push_back(value);
        self.peak = self.peak.max(self.values.len());
    }

    /// Remove every value below `pos` and hand them back.
    ///
    /// A value's destructor may reach back into the owning cache, so callers
    /// drop the returned values only after releasing their borrow or lock.
    pub(crate) fn evict_before(&mut self, pos: usize) -> Vec<T> {
        let count = pos.min(self.end()).saturating_sub(self.base);
        let evicted: Vec<T> = self.values.drain(..count).collect();
        self.base += count;
        if count > 0 {
            log::trace!("Evicted {} values, window now [{}, {})", count, self.base, self.end());
        }
        evicted
    }
}

/// A producer together with the window its values are memoized into
pub(crate) struct SharedBuffer<S: Source> {
    producer: Producer<S>,
    window: Window<S::Item>,
}

impl<S: Source> SharedBuffer<S> {
    pub(crate) fn new(source: S, config: &BufferConfig) -> Self {
        Self {
            producer: Producer::new(source),
            window: Window::new(config),
        }
    }

    /// Make `pos` available, pulling the producer only if `pos` is the next
    /// unproduced position. `Ok(None)` means the producer has ended.
    ///
    /// Callers never ask for a position below the window base.
    pub(crate) fn fetch(&mut self, pos: usize) -> Result<Option<&S::Item>, S::Error> {
        debug_assert!(pos >= self.window.base(), "position {} already evicted", pos);
        if pos >= self.window.end() {
            match self.producer.pull()? {
                Some(item) => self.window.push(item),
                None => return Ok(None),
            }
        }
        Ok(self.window.get(pos))
    }

    pub(crate) fn end(&self) -> usize {
        self.window.end()
    }

    pub(crate) fn len(&self) -> usize {
        self.window.len()
    }

    pub(crate) fn evict_before(&mut self, pos: usize) -> Vec<S::Item> {
        self.window.evict_before(pos)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.producer.is_finished()
    }

    pub(crate) fn stats(&self, cursors_created: usize) -> CacheStats {
        CacheStats {
            produced: self.producer.pulls(),
            buffered: self.window.len(),
            evicted: self.window.base(),
            peak_buffered: self.window.peak(),
            cursors_created,
            producer_finished: self.producer.is_finished(),
        }
    }
}
