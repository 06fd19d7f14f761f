//! Runtime metrics for replay and fan-out caches
//!
//! A [`CacheStats`] value is a point-in-time snapshot taken with `stats()` on
//! any cache. It is intended for diagnostics and for asserting the eviction
//! window in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Snapshot of a cache's buffer and cursor bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Values pulled from the producer so far
    pub produced: usize,
    /// Values currently held in the window
    pub buffered: usize,
    /// Values dropped from the window
    pub evicted: usize,
    /// Largest number of values ever held at once
    pub peak_buffered: usize,
    /// Cursors handed out so far
    pub cursors_created: usize,
    /// Whether the producer has ended or failed
    pub producer_finished: bool,
}

impl CacheStats {
    /// Absolute positions currently retained
    pub fn window(&self) -> Range<usize> {
        self.evicted..self.produced
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ produced: {}, buffered: {} (peak {}), evicted: {}, cursors: {}, finished: {} }}",
            self.produced,
            self.buffered,
            self.peak_buffered,
            self.evicted,
            self.cursors_created,
            self.producer_finished
        )
    }
}
