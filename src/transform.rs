//! Fan-out operators
//!
//! Each operator splits one single-pass source into several lazy sequences
//! backed by one [`FanOutCache`]. The derived sequences can be consumed in any
//! order or interleaving; the source is pulled at most once per value and never
//! further than the most advanced derived sequence requires.

use std::convert::Infallible;
use std::iter::FusedIterator;

use crate::cache::Cursor;
use crate::fan_out::{FanOutCache, FanOutCursor};
use crate::producer::{Classified, Source};
use crate::stream_configuration::FanOutConfig;

/// Run each transform on its own view of `source`.
///
/// Returns one result per transform, in order. Every transform owns its
/// cursor, so none of them can read the source twice. With no transforms the
/// source is dropped without being pulled.
pub fn transform<S, F, R>(source: S, transforms: Vec<F>) -> Vec<R>
where
    S: Source,
    S::Item: Clone,
    F: FnOnce(FanOutCursor<S>) -> R,
{
    if transforms.is_empty() {
        return Vec::new();
    }
    let cursors =
        FanOutCache::new_unchecked(source, FanOutConfig::new(transforms.len())).into_cursors();
    transforms
        .into_iter()
        .zip(cursors)
        .map(|(transform, cursor)| transform(cursor))
        .collect()
}

/// Split `source` into the values matching `predicate` and the rest.
///
/// The predicate runs once per value, when the value is pulled from the
/// source; both halves agree on the verdict.
pub fn partition_intermediate<S, P>(source: S, predicate: P) -> (Partition<S, P>, Partition<S, P>)
where
    S: Source,
    S::Item: Clone,
    P: FnMut(&S::Item) -> bool,
{
    let (matching, rest) = FanOutCache::pair(Classified::new(source, predicate));
    (
        Partition {
            cursor: matching,
            keep: true,
        },
        Partition {
            cursor: rest,
            keep: false,
        },
    )
}

/// Split a source of pairs into its first and second components
pub fn unzip_intermediate<S, A, B>(source: S) -> (Firsts<S>, Seconds<S>)
where
    S: Source<Item = (A, B)>,
    A: Clone,
    B: Clone,
{
    let (firsts, seconds) = FanOutCache::pair(source);
    (Firsts { cursor: firsts }, Seconds { cursor: seconds })
}

/// One half of [`partition_intermediate`]
pub struct Partition<S, P>
where
    S: Source,
    P: FnMut(&S::Item) -> bool,
{
    cursor: FanOutCursor<Classified<S, P>>,
    keep: bool,
}

impl<S, P> Partition<S, P>
where
    S: Source,
    S::Item: Clone,
    P: FnMut(&S::Item) -> bool,
{
    pub fn try_next(&mut self) -> Result<Option<S::Item>, S::Error> {
        while let Some((item, verdict)) = self.cursor.try_next()? {
            if verdict == self.keep {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
}

impl<S, P> Iterator for Partition<S, P>
where
    S: Source<Error = Infallible>,
    S::Item: Clone,
    P: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        match self.try_next() {
            Ok(item) => item,
            Err(never) => match never {},
        }
    }
}

impl<S, P> FusedIterator for Partition<S, P>
where
    S: Source<Error = Infallible>,
    S::Item: Clone,
    P: FnMut(&S::Item) -> bool,
{
}

/// First components of [`unzip_intermediate`]
pub struct Firsts<S: Source> {
    cursor: FanOutCursor<S>,
}

impl<S, A, B> Firsts<S>
where
    S: Source<Item = (A, B)>,
    A: Clone,
    B: Clone,
{
    pub fn try_next(&mut self) -> Result<Option<A>, S::Error> {
        Ok(self.cursor.try_next()?.map(|(first, _)| first))
    }
}

impl<S, A, B> Iterator for Firsts<S>
where
    S: Source<Item = (A, B), Error = Infallible>,
    A: Clone,
    B: Clone,
{
    type Item = A;

    fn next(&mut self) -> Option<A> {
        self.cursor.next().map(|(first, _)| first)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.cursor.size_hint()
    }
}

/// Second components of [`unzip_intermediate`]
pub struct Seconds<S: Source> {
    cursor: FanOutCursor<S>,
}

impl<S, A, B> Seconds<S>
where
    S: Source<Item = (A, B)>,
    A: Clone,
    B: Clone,
{
    pub fn try_next(&mut self) -> Result<Option<B>, S::Error> {
        Ok(self.cursor.try_next()?.map(|(_, second)| second))
    }
}

impl<S, A, B> Iterator for Seconds<S>
where
    S: Source<Item = (A, B), Error = Infallible>,
    A: Clone,
    B: Clone,
{
    type Item = B;

    fn next(&mut self) -> Option<B> {
        self.cursor.next().map(|(_, second)| second)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.cursor.size_hint()
    }
}
