//! Configuration types for replay and fan-out caches

use serde::{Deserialize, Serialize};

/// Buffer configuration shared by every cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Number of values the window reserves room for up front
    pub initial_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
        }
    }
}

impl BufferConfig {
    pub fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }
}

/// Configuration for a bounded fan-out cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutConfig {
    /// Number of cursors the cache hands out over its lifetime (must be > 0)
    pub consumers: usize,
    pub buffer: BufferConfig,
    /// Release cursor slots nobody claimed once the cache handle is dropped.
    ///
    /// When disabled, an unclaimed slot pins the window at position 0 until
    /// [`FanOutCache::release_unclaimed`](crate::fan_out::FanOutCache::release_unclaimed)
    /// is called.
    pub release_unclaimed_on_drop: bool,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            consumers: 2,
            buffer: BufferConfig::default(),
            release_unclaimed_on_drop: true,
        }
    }
}

impl FanOutConfig {
    /// Create a configuration for the given number of consumers
    pub fn new(consumers: usize) -> Self {
        Self {
            consumers,
            ..Default::default()
        }
    }

    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_release_unclaimed_on_drop(mut self, release: bool) -> Self {
        self.release_unclaimed_on_drop = release;
        self
    }
}
