//! Bounded fan-out cache
//!
//! A [`FanOutCache`] serves exactly `K` one-shot cursors over one producer.
//! Each cursor moves forward independently; a buffered value is dropped in the
//! same call that moves the last cursor still needing it past its position, so
//! memory is bounded by the distance between the slowest and fastest cursor.
//!
//! Slots that have not been claimed yet count as sitting at position 0: a
//! cursor created late still sees the whole stream. Dropping a cursor releases
//! its slot, and dropping the cache handle releases every slot nobody claimed
//! (see [`FanOutConfig::release_unclaimed_on_drop`]).

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::iter::FusedIterator;
use std::ops::Range;
use std::rc::Rc;

use crate::cache::{Cache, Cursor};
use crate::cache_metrics::CacheStats;
use crate::error::{ReplayError, ReplayResult};
use crate::producer::Source;
use crate::stream_configuration::FanOutConfig;
use crate::window::SharedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Unclaimed,
    Active(usize),
    Released,
}

/// Read positions of the `K` cursor slots of a bounded cache
#[derive(Debug)]
pub(crate) struct SlotTable {
    slots: Vec<Slot>,
    claimed: usize,
    capacity: usize,
}

impl SlotTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Unclaimed; capacity],
            claimed: 0,
            capacity,
        }
    }

    /// Reserve the next slot, or report the capacity if none is left
    pub(crate) fn claim(&mut self) -> Result<usize, usize> {
        match self.slots.get(self.claimed) {
            Some(Slot::Unclaimed) => {
                let index = self.claimed;
                self.slots[index] = Slot::Active(0);
                self.claimed += 1;
                Ok(index)
            }
            _ => Err(self.capacity),
        }
    }

    /// Reserve every slot still available
    pub(crate) fn claim_all(&mut self) -> Range<usize> {
        let start = self.claimed;
        while self.claim().is_ok() {}
        start..self.claimed
    }

    pub(crate) fn advance(&mut self, index: usize, pos: usize) {
        self.slots[index] = Slot::Active(pos);
    }

    pub(crate) fn release(&mut self, index: usize) {
        self.slots[index] = Slot::Released;
    }

    /// Give up every slot nobody claimed. Returns how many were released.
    pub(crate) fn release_unclaimed(&mut self) -> usize {
        let mut released = 0;
        for slot in self.slots[self.claimed..].iter_mut() {
            if *slot == Slot::Unclaimed {
                *slot = Slot::Released;
                released += 1;
            }
        }
        self.capacity -= released;
        released
    }

    pub(crate) fn claimed(&self) -> usize {
        self.claimed
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn remaining(&self) -> usize {
        self.capacity - self.claimed
    }

    /// Smallest position any slot may still read, `None` once every slot is released
    pub(crate) fn low_water_mark(&self) -> Option<usize> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Unclaimed => Some(0),
                Slot::Active(pos) => Some(*pos),
                Slot::Released => None,
            })
            .min()
    }
}

struct FanOutState<S: Source> {
    buffer: SharedBuffer<S>,
    slots: SlotTable,
}

impl<S: Source> FanOutState<S> {
    fn evict(&mut self) -> Vec<S::Item> {
        let keep_from = self
            .slots
            .low_water_mark()
            .unwrap_or_else(|| self.buffer.end());
        self.buffer.evict_before(keep_from)
    }
}

/// A release requested while `state` was already borrowed
#[derive(Debug, Clone, Copy)]
enum Deferred {
    Slot(usize),
    Unclaimed,
}

struct FanOutShared<S: Source> {
    state: RefCell<FanOutState<S>>,
    // Applied on the next eviction
    deferred: Cell<Vec<Deferred>>,
}

impl<S: Source> FanOutShared<S> {
    fn new(state: FanOutState<S>) -> Self {
        Self {
            state: RefCell::new(state),
            deferred: Cell::new(Vec::new()),
        }
    }

    fn defer(&self, release: Deferred) {
        log::debug!("Cache busy, deferring {:?}", release);
        let mut deferred = self.deferred.take();
        deferred.push(release);
        self.deferred.set(deferred);
    }

    /// Apply deferred releases, then evict behind the slowest slot. The caller
    /// drops the returned values once `state` is no longer borrowed.
    fn evict(&self, state: &mut FanOutState<S>) -> Vec<S::Item> {
        for release in self.deferred.take() {
            match release {
                Deferred::Slot(slot) => state.slots.release(slot),
                Deferred::Unclaimed => {
                    state.slots.release_unclaimed();
                }
            }
        }
        state.evict()
    }
}

/// Shared buffer serving a fixed number of one-shot cursors
///
/// The handle itself is not cloneable: once it is dropped no further cursor
/// can be created.
pub struct FanOutCache<S: Source> {
    shared: Rc<FanOutShared<S>>,
    release_unclaimed_on_drop: bool,
}

impl<S> FanOutCache<S>
where
    S: Source,
    S::Item: Clone,
{
    /// Wrap `source` for `capacity` cursors. Fails if `capacity` is zero.
    pub fn new(source: S, capacity: usize) -> ReplayResult<Self, S::Error> {
        Self::with_config(source, FanOutConfig::new(capacity))
    }

    pub fn with_config(source: S, config: FanOutConfig) -> ReplayResult<Self, S::Error> {
        if config.consumers == 0 {
            return Err(ReplayError::InvalidArgument(
                "fan-out capacity must be positive, got 0".to_string(),
            ));
        }
        Ok(Self::new_unchecked(source, config))
    }

    pub(crate) fn new_unchecked(source: S, config: FanOutConfig) -> Self {
        log::debug!("Fan-out cache created with {} cursor slots", config.consumers);
        Self {
            shared: Rc::new(FanOutShared::new(FanOutState {
                buffer: SharedBuffer::new(source, &config.buffer),
                slots: SlotTable::new(config.consumers),
            })),
            release_unclaimed_on_drop: config.release_unclaimed_on_drop,
        }
    }

    /// Claim the next cursor slot. Fails once `capacity` cursors exist.
    pub fn cursor(&self) -> ReplayResult<FanOutCursor<S>, S::Error> {
        let slot = self
            .shared
            .state
            .borrow_mut()
            .slots
            .claim()
            .map_err(|capacity| ReplayError::CapacityExceeded { capacity })?;
        Ok(self.cursor_for(slot))
    }

    /// Claim every remaining slot at once
    pub fn into_cursors(self) -> Vec<FanOutCursor<S>> {
        let slots = self.shared.state.borrow_mut().slots.claim_all();
        slots.map(|slot| self.cursor_for(slot)).collect()
    }

    /// Two cursors over `source` with no slot left to claim
    pub(crate) fn pair(source: S) -> (FanOutCursor<S>, FanOutCursor<S>) {
        let cache = Self::new_unchecked(source, FanOutConfig::new(2));
        cache.shared.state.borrow_mut().slots.claim_all();
        (cache.cursor_for(0), cache.cursor_for(1))
    }

    fn cursor_for(&self, slot: usize) -> FanOutCursor<S> {
        FanOutCursor {
            shared: Rc::clone(&self.shared),
            slot,
            pos: 0,
        }
    }

    /// Shrink the capacity to the cursors created so far.
    ///
    /// Unclaimed slots stop pinning the window at position 0. Returns the number
    /// of slots given up.
    pub fn release_unclaimed(&self) -> usize {
        let (released, _evicted) = {
            let mut state = self.shared.state.borrow_mut();
            let released = state.slots.release_unclaimed();
            if released > 0 {
                log::debug!("Released {} unclaimed fan-out slots", released);
            }
            let evicted = self.shared.evict(&mut state);
            (released, evicted)
        };
        released
    }

    pub fn capacity(&self) -> usize {
        self.shared.state.borrow().slots.capacity()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.shared.state.borrow().slots.remaining()
    }

    pub fn buffered_len(&self) -> usize {
        self.shared.state.borrow().buffer.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.borrow();
        state.buffer.stats(state.slots.claimed())
    }
}

impl<S: Source> Drop for FanOutCache<S> {
    fn drop(&mut self) {
        if !self.release_unclaimed_on_drop {
            return;
        }
        let _evicted = match self.shared.state.try_borrow_mut() {
            Ok(mut state) => {
                state.slots.release_unclaimed();
                self.shared.evict(&mut state)
            }
            Err(_) => {
                self.shared.defer(Deferred::Unclaimed);
                Vec::new()
            }
        };
    }
}

impl<S> Cache for FanOutCache<S>
where
    S: Source,
    S::Item: Clone,
{
    type Cursor = FanOutCursor<S>;

    fn create_cursor(&self) -> ReplayResult<FanOutCursor<S>, S::Error> {
        self.cursor()
    }

    fn buffered_len(&self) -> usize {
        FanOutCache::buffered_len(self)
    }

    fn stats(&self) -> CacheStats {
        FanOutCache::stats(self)
    }
}

/// One-shot, forward-only cursor over a [`FanOutCache`]
///
/// Dropping the cursor releases its slot.
pub struct FanOutCursor<S: Source> {
    shared: Rc<FanOutShared<S>>,
    slot: usize,
    pos: usize,
}

impl<S> Cursor for FanOutCursor<S>
where
    S: Source,
    S::Item: Clone,
{
    type Item = S::Item;
    type Error = S::Error;

    fn try_next(&mut self) -> Result<Option<S::Item>, S::Error> {
        let (item, _evicted) = {
            let mut state = self.shared.state.borrow_mut();
            let item = match state.buffer.fetch(self.pos)? {
                Some(item) => item.clone(),
                None => return Ok(None),
            };
            self.pos += 1;
            state.slots.advance(self.slot, self.pos);
            let evicted = self.shared.evict(&mut state);
            (item, evicted)
        };
        Ok(Some(item))
    }

    fn has_next(&mut self) -> Result<bool, S::Error> {
        Ok(self.shared.state.borrow_mut().buffer.fetch(self.pos)?.is_some())
    }

    fn position(&self) -> usize {
        self.pos
    }
}

impl<S: Source> Drop for FanOutCursor<S> {
    fn drop(&mut self) {
        let _evicted = match self.shared.state.try_borrow_mut() {
            Ok(mut state) => {
                state.slots.release(self.slot);
                self.shared.evict(&mut state)
            }
            // Dropped from inside the producer
            Err(_) => {
                self.shared.defer(Deferred::Slot(self.slot));
                Vec::new()
            }
        };
    }
}

impl<S> Iterator for FanOutCursor<S>
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
        let state = self.shared.state.borrow();
        let ahead = state.buffer.end() - self.pos;
        if state.buffer.is_finished() {
            (ahead, Some(ahead))
        } else {
            (ahead, None)
        }
    }
}

impl<S> FusedIterator for FanOutCursor<S>
where
    S: Source<Error = Infallible>,
    S::Item: Clone,
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_table_counts_unclaimed_slots_at_zero() {
        let mut slots = SlotTable::new(3);
        let first = slots.claim().unwrap();
        slots.advance(first, 4);
        assert_eq!(slots.low_water_mark(), Some(0));

        assert_eq!(slots.release_unclaimed(), 2);
        assert_eq!(slots.low_water_mark(), Some(4));
        assert_eq!(slots.claim(), Err(1));

        slots.release(first);
        assert_eq!(slots.low_water_mark(), None);
    }
}
