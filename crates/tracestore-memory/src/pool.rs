//! Tracestore Pool - Size-Keyed Buffer Pools
//!
//! Recycles the large arrays the engine allocates per chunk. Buffers are
//! grouped by length, so a chunk of a given geometry always gets back an
//! array of exactly the size it asked for. Retention is bounded: when more
//! than `max_entries` buffers are parked, the whole pool is dropped and
//! rebuilt on demand.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracestore_common::{Result, TraceError};

// =============================================================================
// Constants
// =============================================================================

const DEFAULT_MAX_ENTRIES: usize = 50;

// =============================================================================
// Pool Statistics
// =============================================================================

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub clears: u64,
    pub pooled: usize,
}

impl PoolStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Sum of two snapshots.
    pub fn combine(&self, other: &PoolStats) -> PoolStats {
        PoolStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            clears: self.clears + other.clears,
            pooled: self.pooled + other.pooled,
        }
    }
}

// =============================================================================
// Buffer Pool
// =============================================================================

/// Thread-safe pool of reusable `Vec<T>` buffers keyed by length.
pub struct BufferPool<T> {
    name: &'static str,
    buffers: DashMap<usize, Vec<Vec<T>>>,
    max_entries: usize,
    entries: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    clears: AtomicU64,
}

impl<T: Copy + Default> BufferPool<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_max_entries(name, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(name: &'static str, max_entries: usize) -> Self {
        Self {
            name,
            buffers: DashMap::new(),
            max_entries,
            entries: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            clears: AtomicU64::new(0),
        }
    }

    /// Get a zero-filled buffer of exactly `len` elements.
    pub fn acquire(&self, len: usize) -> Vec<T> {
        match self.take(len) {
            Some(buf) => buf,
            None => vec![T::default(); len],
        }
    }

    /// Like `acquire`, but reports allocation failure instead of aborting.
    pub fn try_acquire(&self, len: usize) -> Result<Vec<T>> {
        if let Some(buf) = self.take(len) {
            return Ok(buf);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            TraceError::OutOfResources(format!(
                "{} pool: cannot reserve {} elements: {}",
                self.name, len, e
            ))
        })?;
        buf.resize(len, T::default());
        Ok(buf)
    }

    /// Return a buffer for reuse. Its current length is the pool key.
    pub fn release(&self, buf: Vec<T>) {
        if buf.is_empty() || self.max_entries == 0 {
            return;
        }

        let parked = self.entries.fetch_add(1, Ordering::AcqRel) + 1;
        if parked > self.max_entries {
            tracing::warn!(
                pool = self.name,
                parked,
                max = self.max_entries,
                "buffer pool over capacity, flushing"
            );
            self.clear();
            return;
        }

        self.buffers.entry(buf.len()).or_default().push(buf);
    }

    /// Drop every parked buffer.
    pub fn clear(&self) {
        self.buffers.clear();
        self.entries.store(0, Ordering::Release);
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            pooled: self.buffers.iter().map(|e| e.value().len()).sum(),
        }
    }

    fn take(&self, len: usize) -> Option<Vec<T>> {
        let popped = self.buffers.get_mut(&len).and_then(|mut list| list.pop());
        match popped {
            Some(mut buf) => {
                let _ = self
                    .entries
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf.fill(T::default());
                Some(buf)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

// =============================================================================
// Pool Set
// =============================================================================

/// The three pools shared by one store: hot sample arrays, integer codec
/// scratch and byte codec scratch.
pub struct BufferPools {
    pub floats: BufferPool<f32>,
    pub ints: BufferPool<i32>,
    pub bytes: BufferPool<u8>,
}

impl BufferPools {
    pub fn new(max_entries: usize) -> Self {
        Self {
            floats: BufferPool::with_max_entries("f32", max_entries),
            ints: BufferPool::with_max_entries("i32", max_entries),
            bytes: BufferPool::with_max_entries("u8", max_entries),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.floats
            .stats()
            .combine(&self.ints.stats())
            .combine(&self.bytes.stats())
    }
}

impl Default for BufferPools {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_release_reuses_buffer() {
        let pool: BufferPool<f32> = BufferPool::new("test");

        let mut buf = pool.acquire(64);
        assert_eq!(buf.len(), 64);
        buf[3] = 7.5;
        let ptr = buf.as_ptr();
        pool.release(buf);

        let again = pool.acquire(64);
        assert_eq!(again.as_ptr(), ptr);
        assert!(again.iter().all(|v| *v == 0.0));

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_keyed_by_length() {
        let pool: BufferPool<i32> = BufferPool::new("test");
        pool.release(vec![1; 16]);

        let other = pool.acquire(32);
        assert_eq!(other.len(), 32);
        assert_eq!(pool.stats().pooled, 1);

        let same = pool.acquire(16);
        assert_eq!(same, vec![0; 16]);
        assert_eq!(pool.stats().pooled, 0);
    }

    #[test]
    fn test_over_capacity_clears() {
        let pool: BufferPool<u8> = BufferPool::with_max_entries("test", 3);
        for _ in 0..3 {
            pool.release(vec![1u8; 8]);
        }
        assert_eq!(pool.stats().pooled, 3);

        pool.release(vec![1u8; 8]);
        let stats = pool.stats();
        assert_eq!(stats.pooled, 0);
        assert_eq!(stats.clears, 1);

        pool.release(vec![1u8; 8]);
        assert_eq!(pool.stats().pooled, 1);
    }

    #[test]
    fn test_try_acquire() {
        let pool: BufferPool<i32> = BufferPool::new("test");
        let buf = pool.try_acquire(128).unwrap();
        assert_eq!(buf.len(), 128);

        let err = pool.try_acquire(usize::MAX / 2).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_concurrent_use() {
        let pools = Arc::new(BufferPools::new(8));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pools = Arc::clone(&pools);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let buf = pools.floats.acquire(256);
                        assert_eq!(buf.len(), 256);
                        pools.floats.release(buf);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pools.stats();
        assert_eq!(stats.hits + stats.misses, 400);
        assert!(stats.pooled <= 8);
    }
}
