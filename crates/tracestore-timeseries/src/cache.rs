//! Tracestore Decompressed Cache
//!
//! LRU cache of decompressed chunk matrices, bounded by total bytes. Entries
//! are immutable shared slices; eviction only drops the cache's reference, so
//! a reader holding a copy keeps it alive until it is done.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use crate::types::ChunkId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// Cache Statistics
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub capacity_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

// =============================================================================
// Decompressed Cache
// =============================================================================

struct CacheInner {
    entries: HashMap<ChunkId, Arc<[f32]>>,
    lru: VecDeque<ChunkId>,
    bytes: usize,
}

impl CacheInner {
    fn touch(&mut self, id: ChunkId) {
        self.lru.retain(|&other| other != id);
        self.lru.push_back(id);
    }

    fn remove(&mut self, id: ChunkId) -> bool {
        match self.entries.remove(&id) {
            Some(data) => {
                self.bytes -= byte_size(&data);
                self.lru.retain(|&other| other != id);
                true
            }
            None => false,
        }
    }
}

/// Byte-bounded LRU of decompressed chunk copies.
pub struct DecompressedCache {
    inner: Mutex<CacheInner>,
    capacity_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl DecompressedCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                lru: VecDeque::new(),
                bytes: 0,
            }),
            capacity_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, id: ChunkId) -> Option<Arc<[f32]>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(&id).cloned() {
            Some(data) => {
                inner.touch(id);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(data)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a copy, evicting least recently used entries until it fits.
    /// The newest entry is always kept, even if it alone exceeds the capacity.
    pub fn insert(&self, id: ChunkId, data: Arc<[f32]>) {
        let size = byte_size(&data);
        let mut inner = self.inner.lock();
        inner.remove(id);

        while inner.bytes + size > self.capacity_bytes {
            let Some(victim) = inner.lru.pop_front() else {
                break;
            };
            if let Some(evicted) = inner.entries.remove(&victim) {
                inner.bytes -= byte_size(&evicted);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(chunk = %victim, "evicted decompressed copy");
            }
        }

        inner.entries.insert(id, data);
        inner.lru.push_back(id);
        inner.bytes += size;
    }

    pub fn remove(&self, id: ChunkId) -> bool {
        self.inner.lock().remove(id)
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.lru.clear();
        inner.bytes = 0;
    }

    pub fn size_in_bytes(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.bytes,
            capacity_bytes: self.capacity_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

fn byte_size(data: &[f32]) -> usize {
    std::mem::size_of_val(data)
}

// =============================================================================
// Tests
// =============================================================================
