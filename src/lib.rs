//! rs2-replay - shared replay and fan-out caches for single-pass producers
//!
//! Several consumers can read one producer (an iterator, a closure, or an async
//! stream) without the producer being re-run per consumer and without values
//! staying in memory longer than the slowest consumer needs them.
//!
//! - [`ReplayCache`]: any number of cursors, whole history retained.
//! - [`FanOutCache`]: exactly `K` one-shot cursors, values evicted as soon as
//!   every cursor has read them.
//! - [`transform()`], [`partition_intermediate`], [`unzip_intermediate`]: lazy
//!   fan-out operators built on [`FanOutCache`].
//! - [`SharedReplay`], [`SharedFanOut`] and [`ReplayStreamExt`]: the same
//!   caches over [`futures_core::Stream`] producers.
//!
//! ```
//! use rs2_replay::ReplayIteratorExt;
//!
//! let (evens, odds) = vec![1, 2, 4, 3, 7, 5, 6, 0]
//!     .into_iter()
//!     .partition_intermediate(|n| n % 2 == 0);
//!
//! assert_eq!(odds.collect::<Vec<_>>(), vec![1, 3, 7, 5]);
//! assert_eq!(evens.collect::<Vec<_>>(), vec![2, 4, 6, 0]);
//! ```

pub mod error;

pub mod cache_metrics;
pub mod stream_configuration;

pub mod cache;
pub mod producer;
mod window;

pub mod fan_out;
pub mod replay;
pub mod transform;

pub mod replay_iter_ext;
pub mod replay_stream_ext;
pub mod shared_stream;

pub use cache::{Cache, Cursor, TryIter};
pub use cache_metrics::CacheStats;
pub use error::{ReplayError, ReplayResult};
pub use fan_out::{FanOutCache, FanOutCursor};
pub use producer::{from_fn, from_iter, try_from_iter, Producer, Source};
pub use replay::{ReplayCache, ReplayCursor};
pub use replay_iter_ext::ReplayIteratorExt;
pub use replay_stream_ext::ReplayStreamExt;
pub use shared_stream::{RS2Stream, SharedCursor, SharedFanOut, SharedReplay};
pub use stream_configuration::{BufferConfig, FanOutConfig};
pub use transform::{partition_intermediate, transform, unzip_intermediate};
