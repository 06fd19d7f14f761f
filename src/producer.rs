//! Producer adapter for single-pass sources
//!
//! A [`Source`] is anything that can be asked for its next value exactly once
//! per position: an iterator, a fallible iterator, or a plain closure. The
//! caches never talk to a source directly; they go through [`Producer`], which
//! fuses the source after it ends or fails so that it is never invoked again.

use std::convert::Infallible;

/// A single-pass, possibly fallible, possibly infinite source of values
pub trait Source {
    type Item;
    type Error;

    /// Pull the next value. `Ok(None)` marks the end of the source.
    fn pull(&mut self) -> Result<Option<Self::Item>, Self::Error>;
}

impl<S> Source for Box<S>
where
    S: Source + ?Sized,
{
    type Item = S::Item;
    type Error = S::Error;

    fn pull(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        (**self).pull()
    }
}

/// Source over an infallible iterator
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I: Iterator> Source for IterSource<I> {
    type Item = I::Item;
    type Error = Infallible;

    fn pull(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.iter.next())
    }
}

/// Source over an iterator of results; the first `Err` fails the source
#[derive(Debug, Clone)]
pub struct TryIterSource<I> {
    iter: I,
}

impl<I, T, E> TryIterSource<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I, T, E> Source for TryIterSource<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = T;
    type Error = E;

    fn pull(&mut self) -> Result<Option<T>, E> {
        self.iter.next().transpose()
    }
}

/// Source backed by a closure
pub struct FnSource<F> {
    f: F,
}

impl<F, T, E> Source for FnSource<F>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    type Item = T;
    type Error = E;

    fn pull(&mut self) -> Result<Option<T>, E> {
        (self.f)()
    }
}

/// Pairs every value with the verdict of a predicate, evaluated once per value
pub struct Classified<S, P> {
    source: S,
    predicate: P,
}

impl<S, P> Classified<S, P>
where
    S: Source,
    P: FnMut(&S::Item) -> bool,
{
    pub fn new(source: S, predicate: P) -> Self {
        Self { source, predicate }
    }
}

impl<S, P> Source for Classified<S, P>
where
    S: Source,
    P: FnMut(&S::Item) -> bool,
{
    type Item = (S::Item, bool);
    type Error = S::Error;

    fn pull(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.source.pull()?.map(|item| {
            let verdict = (self.predicate)(&item);
            (item, verdict)
        }))
    }
}

/// Create a source from any iterable
pub fn from_iter<I>(iter: I) -> IterSource<I::IntoIter>
where
    I: IntoIterator,
{
    IterSource::new(iter.into_iter())
}

/// Create a source from an iterable of results
pub fn try_from_iter<I, T, E>(iter: I) -> TryIterSource<I::IntoIter>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    TryIterSource::new(iter.into_iter())
}

/// Create a source from a closure returning `Ok(Some(_))` per value and `Ok(None)` at the end
pub fn from_fn<F, T, E>(f: F) -> FnSource<F>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    FnSource { f }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerState {
    Live,
    Ended,
    Failed,
}

/// Fused pull interface over a [`Source`]
///
/// Once the source has reported its end or an error it is never pulled again;
/// further calls report the end. After a failure the position counter stops
/// and the remaining behavior of the owning cache is unspecified.
pub struct Producer<S> {
    source: S,
    state: ProducerState,
    pulls: usize,
}

impl<S: Source> Producer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: ProducerState::Live,
            pulls: 0,
        }
    }

    /// Pull the value at absolute position [`pulls`](Self::pulls)
    pub fn pull(&mut self) -> Result<Option<S::Item>, S::Error> {
        if self.state != ProducerState::Live {
            return Ok(None);
        }
        match self.source.pull() {
            Ok(Some(item)) => {
                self.pulls += 1;
                Ok(Some(item))
            }
            Ok(None) => {
                self.state = ProducerState::Ended;
                log::debug!("Producer finished after {} values", self.pulls);
                Ok(None)
            }
            Err(err) => {
                self.state = ProducerState::Failed;
                Err(err)
            }
        }
    }

    /// Number of values pulled so far
    pub fn pulls(&self) -> usize {
        self.pulls
    }

    /// True once the source ended or failed
    pub fn is_finished(&self) -> bool {
        self.state != ProducerState::Live
    }

    pub fn has_failed(&self) -> bool {
        self.state == ProducerState::Failed
    }
}
