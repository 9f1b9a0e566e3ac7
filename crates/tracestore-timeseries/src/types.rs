//! Tracestore Time Series Types
//!
//! Value types exchanged between the chunk layer, the column store and its
//! readers.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use crate::aggregation::HiLo;
use std::fmt;
use std::time::Duration;
use tracestore_memory::PoolStats;

// =============================================================================
// Identifiers
// =============================================================================

/// Store-wide identifier of a chunk, used as the decompressed cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u64);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk-{}", self.0)
    }
}

// =============================================================================
// Chunk Phase
// =============================================================================

/// Storage phase of a chunk. Transitions only move forward, except that a
/// failed compression returns a chunk to `Hot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkPhase {
    Hot = 0,
    Sealing = 1,
    Compressed = 2,
}

impl ChunkPhase {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ChunkPhase::Sealing,
            2 => ChunkPhase::Compressed,
            _ => ChunkPhase::Hot,
        }
    }
}

// =============================================================================
// Interval Value
// =============================================================================

/// Samples found inside a time window: one sample, or the envelope of several.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalValue {
    Single(f32),
    Range(HiLo),
}

impl IntervalValue {
    /// Envelope of the value(s).
    pub fn as_hilo(&self) -> HiLo {
        match self {
            IntervalValue::Single(v) => HiLo::from_value(*v),
            IntervalValue::Range(hilo) => *hilo,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of a store's memory and compression state.
#[derive(Debug, Clone, Default)]
pub struct ContainerStats {
    pub rows: usize,
    pub columns: usize,
    pub hot_chunks: usize,
    pub sealing_chunks: usize,
    pub compressed_chunks: usize,
    pub deferred_chunks: usize,
    pub compressed_bytes: usize,
    pub hot_bytes: usize,
    pub cached_bytes: usize,
    pub average_compression_ratio: f64,
    pub total_compression_time: Duration,
    pub compression_failures: u64,
    pub time_segments: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub pools: PoolStats,
}

impl ContainerStats {
    pub fn total_chunks(&self) -> usize {
        self.hot_chunks + self.sealing_chunks + self.compressed_chunks
    }
}

// =============================================================================
// Tests
// =============================================================================
