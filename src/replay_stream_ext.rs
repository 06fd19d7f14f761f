use async_stream::stream;
use futures_core::Stream;
use futures_util::stream::StreamExt;

use crate::error::ReplayResult;
use crate::shared_stream::{RS2Stream, SharedCursor, SharedFanOut, SharedReplay};

/// Extension trait providing replay and fan-out combinators on Streams
pub trait ReplayStreamExt: Stream + Sized + Unpin + Send + 'static {
    /// Make this stream replayable: every cursor of the returned cache yields
    /// every item, while the stream itself is polled once per item.
    fn replay_rs2(self) -> SharedReplay<Self>
    where
        Self::Item: Clone + Send,
    {
        SharedReplay::new(self)
    }

    /// Split this stream into `consumers` streams that each yield every item.
    ///
    /// Items are buffered only until the slowest of the returned streams has
    /// read them. Dropping one of the streams stops it from holding items back.
    fn fan_out_rs2(self, consumers: usize) -> ReplayResult<Vec<RS2Stream<Self::Item>>>
    where
        Self::Item: Clone + Send + 'static,
    {
        let fan_out = SharedFanOut::new(self, consumers)?;
        Ok(fan_out
            .into_cursors()
            .into_iter()
            .map(|cursor| cursor.boxed())
            .collect())
    }

    /// Lazily split into the items matching `predicate` and the rest.
    ///
    /// The predicate runs once per item, when the item is polled from this stream.
    fn partition_intermediate_rs2<P>(
        self,
        mut predicate: P,
    ) -> (RS2Stream<Self::Item>, RS2Stream<Self::Item>)
    where
        Self::Item: Clone + Send + 'static,
        P: FnMut(&Self::Item) -> bool + Send + 'static,
    {
        let classified = self
            .map(move |item| {
                let verdict = predicate(&item);
                (item, verdict)
            })
            .boxed();
        let (matching, rest) = SharedFanOut::pair(classified);
        (keep_where(matching, true), keep_where(rest, false))
    }

    /// Lazily split a stream of pairs into its components
    fn unzip_intermediate_rs2<A, B>(self) -> (RS2Stream<A>, RS2Stream<B>)
    where
        Self: Stream<Item = (A, B)>,
        A: Clone + Send + 'static,
        B: Clone + Send + 'static,
    {
        let (firsts, seconds) = SharedFanOut::pair(self);
        (
            firsts.map(|(first, _)| first).boxed(),
            seconds.map(|(_, second)| second).boxed(),
        )
    }
}

impl<S> ReplayStreamExt for S where S: Stream + Sized + Unpin + Send + 'static {}

fn keep_where<T>(cursor: SharedCursor<RS2Stream<(T, bool)>>, keep: bool) -> RS2Stream<T>
where
    T: Clone + Send + 'static,
{
    stream! {
        let mut cursor = cursor;
        while let Some((item, verdict)) = cursor.next().await {
            if verdict == keep {
                yield item;
            }
        }
    }
    .boxed()
}
