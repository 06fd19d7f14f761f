use crate::error::ReplayResult;
use crate::fan_out::{FanOutCache, FanOutCursor};
use crate::producer::{IterSource, TryIterSource};
use crate::replay::ReplayCache;
use crate::transform::{self, Firsts, Partition, Seconds};

/// Extension trait providing replay and fan-out combinators on iterators
pub trait ReplayIteratorExt: Iterator + Sized {
    /// Make this iterator re-iterable without iterating it more than once.
    ///
    /// The iterator is advanced lazily, only as far as the most advanced cursor
    /// of the returned cache has read.
    ///
    /// Called on a [`ReplayCursor`](crate::replay::ReplayCursor), this buffers the
    /// cursor's remaining values in a new cache. Use [`ReplayCache::replay`] to
    /// get another handle on an existing cache instead.
    fn replay(self) -> ReplayCache<IterSource<Self>>
    where
        Self::Item: Clone,
    {
        ReplayCache::new(IterSource::new(self))
    }

    /// Share this iterator between exactly `consumers` one-shot cursors
    fn fan_out(self, consumers: usize) -> ReplayResult<FanOutCache<IterSource<Self>>>
    where
        Self::Item: Clone,
    {
        FanOutCache::new(IterSource::new(self), consumers)
    }

    /// Like [`replay`](Self::replay) for an iterator of results
    fn try_replay<T, E>(self) -> ReplayCache<TryIterSource<Self>>
    where
        Self: Iterator<Item = Result<T, E>>,
        T: Clone,
    {
        ReplayCache::new(TryIterSource::new(self))
    }

    /// Like [`fan_out`](Self::fan_out) for an iterator of results
    fn try_fan_out<T, E>(self, consumers: usize) -> ReplayResult<FanOutCache<TryIterSource<Self>>, E>
    where
        Self: Iterator<Item = Result<T, E>>,
        T: Clone,
    {
        FanOutCache::new(TryIterSource::new(self), consumers)
    }

    /// Apply each transform to its own lazy view of this iterator.
    ///
    /// See [`transform::transform`].
    fn transform<F, R>(self, transforms: Vec<F>) -> Vec<R>
    where
        Self::Item: Clone,
        F: FnOnce(FanOutCursor<IterSource<Self>>) -> R,
    {
        transform::transform(IterSource::new(self), transforms)
    }

    /// Lazily split into the items matching `predicate` and the rest
    fn partition_intermediate<P>(
        self,
        predicate: P,
    ) -> (Partition<IterSource<Self>, P>, Partition<IterSource<Self>, P>)
    where
        Self::Item: Clone,
        P: FnMut(&Self::Item) -> bool,
    {
        transform::partition_intermediate(IterSource::new(self), predicate)
    }

    /// Lazily split an iterator of pairs into its components
    fn unzip_intermediate<A, B>(self) -> (Firsts<IterSource<Self>>, Seconds<IterSource<Self>>)
    where
        Self: Iterator<Item = (A, B)>,
        A: Clone,
        B: Clone,
    {
        transform::unzip_intermediate(IterSource::new(self))
    }
}

impl<I: Iterator> ReplayIteratorExt for I {}
