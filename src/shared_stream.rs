//! Replay and fan-out caches over asynchronous producers
//!
//! [`SharedReplay`] and [`SharedFanOut`] are the [`Stream`] counterparts of
//! [`ReplayCache`](crate::replay::ReplayCache) and
//! [`FanOutCache`](crate::fan_out::FanOutCache). A cursor that needs a value
//! nobody has produced yet polls the producer itself. While the producer is
//! pending, every cursor waiting on it is parked; the next value (or the end of
//! the producer) wakes all of them, whichever cursor's poll produced it.
//!
//! The shared state sits behind a mutex that is held only for the duration of a
//! single poll, so cursors can be moved to other tasks.
//!
//! The producer is always polled with a waker that fans out to every parked
//! cursor, never with the waker of the cursor that happened to poll it. A
//! cursor whose task is dropped or whose `next()` future is cancelled therefore
//! cannot swallow the wakeup the others are waiting for.

use futures_core::Stream;
use futures_util::stream::{BoxStream, StreamExt};
use futures_util::task::{waker_ref, ArcWake};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::cache_metrics::CacheStats;
use crate::error::{ReplayError, ReplayResult};
use crate::fan_out::SlotTable;
use crate::stream_configuration::{BufferConfig, FanOutConfig};
use crate::window::Window;

/// A boxed, heap-allocated stream, as returned by the `*_rs2` combinators
pub type RS2Stream<O> = BoxStream<'static, O>;

/// Wakers of the cursors waiting on the producer
#[derive(Default)]
struct Parked {
    wakers: Mutex<Vec<Waker>>,
}

impl Parked {
    fn wakers(&self) -> MutexGuard<'_, Vec<Waker>> {
        self.wakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn park(&self, waker: &Waker) {
        let mut wakers = self.wakers();
        if !wakers.iter().any(|parked| parked.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    /// Wake every parked cursor except the one currently polling
    fn wake_others(&self, current: &Waker) {
        let wakers = std::mem::take(&mut *self.wakers());
        for waker in wakers {
            if !waker.will_wake(current) {
                waker.wake();
            }
        }
    }

    fn wake_all(&self) {
        let wakers = std::mem::take(&mut *self.wakers());
        for waker in wakers {
            waker.wake();
        }
    }
}

impl ArcWake for Parked {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.wake_all();
    }
}

struct SharedState<St: Stream> {
    // `None` once the producer has ended
    stream: Option<St>,
    window: Window<St::Item>,
    parked: Arc<Parked>,
    // `None` for a replay cache, which never evicts
    slots: Option<SlotTable>,
    cursors_created: usize,
}

impl<St> SharedState<St>
where
    St: Stream + Unpin,
    St::Item: Clone,
{
    fn new(stream: St, buffer: &BufferConfig, slots: Option<SlotTable>) -> Self {
        Self {
            stream: Some(stream),
            window: Window::new(buffer),
            parked: Arc::new(Parked::default()),
            slots,
            cursors_created: 0,
        }
    }

    fn poll_at(&mut self, pos: usize, cx: &mut Context<'_>) -> Poll<Option<St::Item>> {
        if let Some(item) = self.window.get(pos) {
            return Poll::Ready(Some(item.clone()));
        }
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Poll::Ready(None),
        };
        // Registered before polling: the producer may be woken from another
        // thread before `Pending` comes back.
        self.parked.park(cx.waker());
        let producer_waker = waker_ref(&self.parked);
        let mut producer_cx = Context::from_waker(&producer_waker);
        match stream.poll_next_unpin(&mut producer_cx) {
            Poll::Ready(Some(item)) => {
                self.window.push(item.clone());
                self.parked.wake_others(cx.waker());
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                log::debug!("Shared producer finished after {} values", self.window.end());
                self.stream = None;
                self.parked.wake_others(cx.waker());
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<St: Stream> SharedState<St> {
    /// Values no slot can read any more. Dropped by the caller after unlocking.
    fn evict(&mut self) -> Vec<St::Item> {
        match &self.slots {
            Some(slots) => {
                let keep_from = slots.low_water_mark().unwrap_or_else(|| self.window.end());
                self.window.evict_before(keep_from)
            }
            None => Vec::new(),
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            produced: self.window.end(),
            buffered: self.window.len(),
            evicted: self.window.base(),
            peak_buffered: self.window.peak(),
            cursors_created: self.cursors_created,
            producer_finished: self.stream.is_none(),
        }
    }
}

type Shared<St> = Arc<Mutex<SharedState<St>>>;

fn lock<St: Stream>(state: &Shared<St>) -> MutexGuard<'_, SharedState<St>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Re-iterable view over a single-pass [`Stream`]
///
/// Every cursor starts at the first value; the whole history is retained.
pub struct SharedReplay<St: Stream> {
    state: Shared<St>,
}

impl<St: Stream> Clone for SharedReplay<St> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<St> SharedReplay<St>
where
    St: Stream + Unpin,
    St::Item: Clone,
{
    pub fn new(stream: St) -> Self {
        Self::with_config(stream, BufferConfig::default())
    }

    pub fn with_config(stream: St, config: BufferConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState::new(stream, &config, None))),
        }
    }

    /// A fresh cursor at the first value. Never polls the producer.
    pub fn cursor(&self) -> SharedCursor<St> {
        lock(&self.state).cursors_created += 1;
        SharedCursor {
            state: Arc::clone(&self.state),
            slot: None,
            pos: 0,
        }
    }

    pub fn buffered_len(&self) -> usize {
        lock(&self.state).window.len()
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.state).stats()
    }
}

/// Stream shared between a fixed number of one-shot cursors
pub struct SharedFanOut<St: Stream> {
    state: Shared<St>,
    release_unclaimed_on_drop: bool,
}

impl<St> SharedFanOut<St>
where
    St: Stream + Unpin,
    St::Item: Clone,
{
    /// Share `stream` between `capacity` cursors. Fails if `capacity` is zero.
    pub fn new(stream: St, capacity: usize) -> ReplayResult<Self> {
        Self::with_config(stream, FanOutConfig::new(capacity))
    }

    pub fn with_config(stream: St, config: FanOutConfig) -> ReplayResult<Self> {
        if config.consumers == 0 {
            return Err(ReplayError::InvalidArgument(
                "fan-out capacity must be positive, got 0".to_string(),
            ));
        }
        log::debug!("Shared fan-out created with {} cursor slots", config.consumers);
        let slots = SlotTable::new(config.consumers);
        Ok(Self {
            state: Arc::new(Mutex::new(SharedState::new(stream, &config.buffer, Some(slots)))),
            release_unclaimed_on_drop: config.release_unclaimed_on_drop,
        })
    }

    /// Claim the next cursor slot. Fails once `capacity` cursors exist.
    pub fn cursor(&self) -> ReplayResult<SharedCursor<St>> {
        let mut state = lock(&self.state);
        let claimed = match state.slots.as_mut() {
            Some(slots) => slots.claim(),
            None => Err(0),
        };
        let slot = claimed.map_err(|capacity| ReplayError::CapacityExceeded { capacity })?;
        state.cursors_created += 1;
        Ok(SharedCursor {
            state: Arc::clone(&self.state),
            slot: Some(slot),
            pos: 0,
        })
    }

    /// Claim every remaining slot at once
    pub fn into_cursors(self) -> Vec<SharedCursor<St>> {
        let mut cursors = Vec::new();
        while let Ok(cursor) = self.cursor() {
            cursors.push(cursor);
        }
        cursors
    }

    /// Two cursors over `stream` with no slot left to claim
    pub(crate) fn pair(stream: St) -> (SharedCursor<St>, SharedCursor<St>) {
        let mut slots = SlotTable::new(2);
        slots.claim_all();
        let mut state = SharedState::new(stream, &BufferConfig::default(), Some(slots));
        state.cursors_created = 2;
        let state = Arc::new(Mutex::new(state));
        let cursor = |slot| SharedCursor {
            state: Arc::clone(&state),
            slot: Some(slot),
            pos: 0,
        };
        (cursor(0), cursor(1))
    }

    /// Shrink the capacity to the cursors created so far. Returns the number of
    /// slots given up.
    pub fn release_unclaimed(&self) -> usize {
        let (released, _evicted) = {
            let mut state = lock(&self.state);
            let released = state
                .slots
                .as_mut()
                .map_or(0, |slots| slots.release_unclaimed());
            if released > 0 {
                log::debug!("Released {} unclaimed shared fan-out slots", released);
            }
            let evicted = state.evict();
            (released, evicted)
        };
        released
    }

    /// Number of cursors this cache serves, after any release of unclaimed slots
    pub fn capacity(&self) -> usize {
        lock(&self.state).slots.as_ref().map_or(0, SlotTable::capacity)
    }

    pub fn remaining_capacity(&self) -> usize {
        lock(&self.state).slots.as_ref().map_or(0, SlotTable::remaining)
    }

    pub fn buffered_len(&self) -> usize {
        lock(&self.state).window.len()
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.state).stats()
    }
}

impl<St: Stream> Drop for SharedFanOut<St> {
    fn drop(&mut self) {
        if !self.release_unclaimed_on_drop {
            return;
        }
        let _evicted = {
            let mut state = lock(&self.state);
            if let Some(slots) = state.slots.as_mut() {
                slots.release_unclaimed();
            }
            state.evict()
        };
    }
}

/// Cursor over a [`SharedReplay`] or [`SharedFanOut`]
///
/// Implements [`Stream`]. A fan-out cursor releases its slot when dropped.
pub struct SharedCursor<St: Stream> {
    state: Shared<St>,
    slot: Option<usize>,
    pos: usize,
}

impl<St: Stream> SharedCursor<St> {
    /// Absolute position of the next value this cursor will yield
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<St> Stream for SharedCursor<St>
where
    St: Stream + Unpin,
    St::Item: Clone,
{
    type Item = St::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let mut state = lock(&this.state);
        match state.poll_at(this.pos, cx) {
            Poll::Ready(Some(item)) => {
                this.pos += 1;
                let mut evicted = Vec::new();
                if let Some(slot) = this.slot {
                    if let Some(slots) = state.slots.as_mut() {
                        slots.advance(slot, this.pos);
                    }
                    evicted = state.evict();
                }
                drop(state);
                drop(evicted);
                Poll::Ready(Some(item))
            }
            other => other,
        }
    }
}

impl<St: Stream> Drop for SharedCursor<St> {
    fn drop(&mut self) {
        let (parked, _evicted) = {
            let mut state = lock(&self.state);
            if let (Some(slot), Some(slots)) = (self.slot, state.slots.as_mut()) {
                slots.release(slot);
            }
            let evicted = state.evict();
            let parked = Arc::clone(&state.parked);
            (parked, evicted)
        };
        // Whoever was waiting alongside this cursor polls the producer again.
        parked.wake_all();
    }
}
