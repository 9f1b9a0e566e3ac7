//! Tracestore Chunks
//!
//! A chunk holds `junk_size` consecutive columns of the sample matrix. It is
//! written while hot, sealed once full, compressed in the background and from
//! then on read through decompressed copies held by the shared LRU cache.
//! Min/max buckets are built from hot data just before compression; average
//! buckets are built lazily per row.
//!
//! Key Features:
//! - Hot storage in column-major order, one contiguous slice per column
//! - Compression under a read lock so readers continue, then a short swap
//! - Double-checked decompression under a per-chunk mutex
//! - Bucket caches that always agree with an exact scan
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use crate::aggregation::{linear_integral, HiLo, IntervalAverage};
use crate::cache::DecompressedCache;
use crate::compression::{BlockCodec, CompressedMatrix};
use crate::time_axis::TimeAxis;
use crate::types::{ChunkId, ChunkPhase};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracestore_common::{Result, TraceError};
use tracestore_memory::BufferPools;

// =============================================================================
// Chunk Context
// =============================================================================

/// Services shared by all chunks of one store.
pub struct ChunkContext {
    pub codec: BlockCodec,
    pub pools: Arc<BufferPools>,
    pub cache: Arc<DecompressedCache>,
    pub time_axis: Arc<TimeAxis>,
    failures: AtomicU64,
}

impl ChunkContext {
    pub fn new(
        codec: BlockCodec,
        pools: Arc<BufferPools>,
        cache: Arc<DecompressedCache>,
        time_axis: Arc<TimeAxis>,
    ) -> Self {
        Self {
            codec,
            pools,
            cache,
            time_axis,
            failures: AtomicU64::new(0),
        }
    }

    /// Compressions that failed and left their chunk hot.
    pub fn compression_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Chunk Internals
// =============================================================================

enum ChunkStorage {
    Hot(Vec<f32>),
    Compressed(Arc<CompressedMatrix>),
}

/// Per-row min/max buckets over the first `built_for` columns.
struct HiLoCache {
    built_for: usize,
    bucket_count: usize,
    buckets: Vec<HiLo>,
}

impl HiLoCache {
    fn bucket(&self, row: usize, bucket: usize) -> HiLo {
        self.buckets[row * self.bucket_count + bucket]
    }
}

/// Average buckets of one row over the first `built_for` columns.
struct AverageRow {
    built_for: usize,
    buckets: Vec<Option<IntervalAverage>>,
}

enum Piece {
    Cached(Option<IntervalAverage>),
    Exact {
        first: usize,
        times: Vec<f64>,
        lo: f64,
        hi: f64,
    },
}

// =============================================================================
// Chunk
// =============================================================================

pub struct Chunk {
    id: ChunkId,
    start: usize,
    rows: usize,
    width: usize,
    bucket_count: usize,
    bucket_width: usize,
    phase: AtomicU8,
    storage: RwLock<ChunkStorage>,
    written: AtomicUsize,
    invalid: Vec<AtomicBool>,
    hilo_cache: RwLock<Option<Arc<HiLoCache>>>,
    averages: Mutex<Vec<Option<Arc<AverageRow>>>>,
    integrals: RwLock<Vec<Option<Vec<f64>>>>,
    decompress_lock: Mutex<()>,
    ctx: Arc<ChunkContext>,
}

impl Chunk {
    /// Allocate a hot chunk for columns `start .. start + width`.
    pub fn new(
        id: ChunkId,
        start: usize,
        rows: usize,
        width: usize,
        bucket_count: usize,
        ctx: Arc<ChunkContext>,
    ) -> Result<Self> {
        if rows == 0 || width == 0 || bucket_count == 0 || width % bucket_count != 0 {
            return Err(TraceError::Configuration(format!(
                "invalid chunk geometry: {} rows, {} columns, {} buckets",
                rows, width, bucket_count
            )));
        }
        let data = ctx.pools.floats.try_acquire(rows * width)?;

        Ok(Self {
            id,
            start,
            rows,
            width,
            bucket_count,
            bucket_width: width / bucket_count,
            phase: AtomicU8::new(ChunkPhase::Hot as u8),
            storage: RwLock::new(ChunkStorage::Hot(data)),
            written: AtomicUsize::new(0),
            invalid: (0..rows).map(|_| AtomicBool::new(false)).collect(),
            hilo_cache: RwLock::new(None),
            averages: Mutex::new(vec![None; rows]),
            integrals: RwLock::new(vec![None; rows]),
            decompress_lock: Mutex::new(()),
            ctx,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Global index of the first column.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Global index one past the last column this chunk can hold.
    pub fn end(&self) -> usize {
        self.start + self.width
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Columns written so far.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.written() == self.width
    }

    pub fn phase(&self) -> ChunkPhase {
        ChunkPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn contains_invalid(&self, row: usize) -> bool {
        self.invalid
            .get(row)
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    /// Write one sample. Only valid while the chunk is hot.
    pub fn set_value(&self, value: f32, row: usize, column: usize) -> Result<()> {
        if row >= self.rows {
            return Err(self.reject_write(format!(
                "row {} out of range for {} rows",
                row, self.rows
            )));
        }
        let local = self.local_for_write(column)?;

        {
            let mut storage = self.storage.write();
            let ChunkStorage::Hot(data) = &mut *storage else {
                return Err(self.sealed_error());
            };
            data[local * self.rows + row] = value;
        }
        if !HiLo::is_valid_number(value) {
            self.invalid[row].store(true, Ordering::Relaxed);
        }
        self.written.fetch_max(local + 1, Ordering::Release);
        Ok(())
    }

    /// Write a complete column.
    pub fn set_values(&self, values: &[f32], column: usize) -> Result<()> {
        if values.len() != self.rows {
            return Err(self.reject_write(format!(
                "got {} values for {} rows",
                values.len(),
                self.rows
            )));
        }
        let local = self.local_for_write(column)?;

        {
            let mut storage = self.storage.write();
            let ChunkStorage::Hot(data) = &mut *storage else {
                return Err(self.sealed_error());
            };
            data[local * self.rows..(local + 1) * self.rows].copy_from_slice(values);
        }
        for (row, value) in values.iter().enumerate() {
            if !HiLo::is_valid_number(*value) {
                self.invalid[row].store(true, Ordering::Relaxed);
            }
        }
        self.written.fetch_max(local + 1, Ordering::Release);
        Ok(())
    }

    fn local_for_write(&self, column: usize) -> Result<usize> {
        if self.phase() != ChunkPhase::Hot {
            return Err(self.sealed_error());
        }
        if column < self.start || column >= self.end() {
            return Err(self.reject_write(format!(
                "column {} outside chunk {} ({}..{})",
                column,
                self.id,
                self.start,
                self.end()
            )));
        }
        Ok(column - self.start)
    }

    fn sealed_error(&self) -> TraceError {
        self.reject_write(format!("{} is sealed", self.id))
    }

    /// Inconsistent writes panic in debug builds. Release builds reject them
    /// without touching the sample buffer.
    fn reject_write(&self, message: String) -> TraceError {
        if cfg!(debug_assertions) {
            panic!("inconsistent write: {}", message);
        }
        TraceError::InconsistentWrite(message)
    }

    // -------------------------------------------------------------------------
    // Integrals
    // -------------------------------------------------------------------------

    /// Start tracking the running integral of `row`.
    pub fn enable_integral(&self, row: usize) {
        let mut integrals = self.integrals.write();
        if let Some(slot) = integrals.get_mut(row) {
            if slot.is_none() {
                *slot = Some(vec![f64::NAN; self.width]);
            }
        }
    }

    pub fn set_integral_value(&self, row: usize, column: usize, value: f64) -> Result<()> {
        if column < self.start || column >= self.end() {
            return Err(TraceError::IndexOutOfRange {
                index: column,
                len: self.end(),
            });
        }
        let mut integrals = self.integrals.write();
        match integrals.get_mut(row) {
            Some(Some(values)) => {
                values[column - self.start] = value;
                Ok(())
            }
            _ => Err(TraceError::AverageNotDefined(row)),
        }
    }

    /// Cumulative integral of `row` up to `column`, if tracked and written.
    pub fn get_integral_value(&self, row: usize, column: usize) -> Option<f64> {
        if column < self.start || column >= self.end() {
            return None;
        }
        let integrals = self.integrals.read();
        let value = integrals.get(row)?.as_ref()?[column - self.start];
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    pub fn get_value(&self, row: usize, column: usize) -> Result<f32> {
        let local = self.local_for_read(row, column)?;
        let rows = self.rows;
        self.with_columns(|data| data[local * rows + row])
    }

    /// Min/max of `row` over the inclusive column range, clamped to the
    /// written columns. Equal to [`Chunk::get_hi_lo_exact`].
    pub fn get_hi_lo(&self, row: usize, col_start: usize, col_stop: usize) -> Result<HiLo> {
        let Some((a, b)) = self.clamp(row, col_start, col_stop)? else {
            return Ok(HiLo::EMPTY);
        };

        let cache = self.hilo_cache.read().clone();
        let bw = self.bucket_width;
        let Some(cache) = cache.filter(|_| b - a + 1 >= bw) else {
            return self.scan_hi_lo(row, a, b);
        };

        let first_full = (a + bw - 1) / bw;
        let end_full = ((b + 1) / bw).min(cache.built_for / bw);
        if first_full >= end_full {
            return self.scan_hi_lo(row, a, b);
        }

        let mut result = HiLo::merge_many(
            &(first_full..end_full)
                .map(|k| cache.bucket(row, k))
                .collect::<Vec<_>>(),
        );
        let head = (a < first_full * bw).then(|| (a, first_full * bw - 1));
        let tail = (end_full * bw <= b).then(|| (end_full * bw, b));
        if head.is_some() || tail.is_some() {
            let rows = self.rows;
            let edges = self.with_columns(|data| {
                [head, tail]
                    .into_iter()
                    .flatten()
                    .fold(HiLo::EMPTY, |acc, (from, to)| {
                        HiLo::merge(acc, scan_row(data, rows, row, from, to))
                    })
            })?;
            result = HiLo::merge(result, edges);
        }
        Ok(result)
    }

    /// Min/max by scanning every sample in range.
    pub fn get_hi_lo_exact(&self, row: usize, col_start: usize, col_stop: usize) -> Result<HiLo> {
        match self.clamp(row, col_start, col_stop)? {
            Some((a, b)) => self.scan_hi_lo(row, a, b),
            None => Ok(HiLo::EMPTY),
        }
    }

    /// Min/max of every written sample of `row`.
    pub fn row_hi_lo(&self, row: usize) -> Result<HiLo> {
        self.get_hi_lo(row, self.start, self.end() - 1)
    }

    /// Time-weighted average of `row` over `[t_min, t_max]`, restricted to the
    /// inclusive column range. `None` when the overlap has zero length.
    pub fn get_average(
        &self,
        row: usize,
        col_start: usize,
        col_stop: usize,
        t_min: f64,
        t_max: f64,
    ) -> Result<Option<IntervalAverage>> {
        let Some((a, b)) = self.clamp(row, col_start, col_stop)? else {
            return Ok(None);
        };
        if a == b {
            return Ok(None);
        }
        let axis = &self.ctx.time_axis;
        let lo = t_min.max(axis.value(self.start + a)?);
        let hi = t_max.min(axis.value(self.start + b)?);
        if hi <= lo {
            return Ok(None);
        }

        let written = self.written();
        let cached = self.average_row(row, written)?;
        let bw = self.bucket_width;

        let mut pieces = Vec::new();
        for k in a / bw..=b / bw {
            let c0 = (k * bw).max(a);
            let c1 = ((k + 1) * bw).min(written - 1).min(b);
            if c1 <= c0 {
                continue;
            }
            let times = axis.values(self.start + c0..self.start + c1 + 1)?;
            let (bs, be) = (times[0], times[times.len() - 1]);
            let (x0, x1) = (lo.max(bs), hi.min(be));
            if x1 <= x0 {
                continue;
            }
            let whole_bucket = c0 == k * bw && c1 == ((k + 1) * bw).min(written - 1);
            if whole_bucket && x0 == bs && x1 == be {
                pieces.push(Piece::Cached(cached.buckets[k]));
            } else {
                pieces.push(Piece::Exact {
                    first: c0,
                    times,
                    lo: x0,
                    hi: x1,
                });
            }
        }

        let needs_data = pieces.iter().any(|p| matches!(p, Piece::Exact { .. }));
        let rows = self.rows;
        let evaluate = |data: Option<&[f32]>| {
            pieces.iter().fold(None, |acc, piece| {
                let next = match (piece, data) {
                    (Piece::Cached(avg), _) => *avg,
                    (Piece::Exact { first, times, lo, hi }, Some(data)) => {
                        IntervalAverage::from_integral(
                            integrate_row(data, rows, row, *first, times, *lo, *hi),
                            *lo,
                            *hi,
                        )
                    }
                    (Piece::Exact { .. }, None) => None,
                };
                IntervalAverage::merge(acc, next)
            })
        };

        if needs_data {
            self.with_columns(|data| evaluate(Some(data)))
        } else {
            Ok(evaluate(None))
        }
    }

    fn local_for_read(&self, row: usize, column: usize) -> Result<usize> {
        if row >= self.rows {
            return Err(TraceError::IndexOutOfRange {
                index: row,
                len: self.rows,
            });
        }
        let written = self.written();
        if column < self.start || column >= self.start + written {
            return Err(TraceError::IndexOutOfRange {
                index: column,
                len: self.start + written,
            });
        }
        Ok(column - self.start)
    }

    /// Local inclusive column range after clamping, `None` when empty.
    fn clamp(&self, row: usize, col_start: usize, col_stop: usize) -> Result<Option<(usize, usize)>> {
        if row >= self.rows {
            return Err(TraceError::IndexOutOfRange {
                index: row,
                len: self.rows,
            });
        }
        let written = self.written();
        if written == 0 || col_stop < self.start || col_start > col_stop {
            return Ok(None);
        }
        let a = col_start.saturating_sub(self.start);
        let b = (col_stop - self.start).min(written - 1);
        if a > b {
            return Ok(None);
        }
        Ok(Some((a, b)))
    }

    fn scan_hi_lo(&self, row: usize, a: usize, b: usize) -> Result<HiLo> {
        let rows = self.rows;
        self.with_columns(|data| scan_row(data, rows, row, a, b))
    }

    /// Run `f` over the column-major samples, decompressing if needed.
    fn with_columns<R>(&self, f: impl FnOnce(&[f32]) -> R) -> Result<R> {
        let matrix = {
            let storage = self.storage.read();
            match &*storage {
                ChunkStorage::Hot(data) => return Ok(f(data)),
                ChunkStorage::Compressed(matrix) => Arc::clone(matrix),
            }
        };
        let copy = self.decompressed(&matrix)?;
        Ok(f(&copy))
    }

    fn decompressed(&self, matrix: &CompressedMatrix) -> Result<Arc<[f32]>> {
        if let Some(copy) = self.ctx.cache.get(self.id) {
            return Ok(copy);
        }
        let _guard = self.decompress_lock.lock();
        if let Some(copy) = self.ctx.cache.get(self.id) {
            return Ok(copy);
        }

        let data = self.ctx.codec.decompress_columns(matrix).map_err(|e| {
            tracing::error!(chunk = %self.id, error = %e, "decompression failed");
            e
        })?;
        let copy: Arc<[f32]> = Arc::from(&data[..]);
        self.ctx.pools.floats.release(data);
        self.ctx.cache.insert(self.id, Arc::clone(&copy));
        tracing::debug!(chunk = %self.id, "regenerated decompressed copy");
        Ok(copy)
    }

    fn average_row(&self, row: usize, written: usize) -> Result<Arc<AverageRow>> {
        let existing = self.averages.lock()[row].clone();
        if let Some(existing) = existing.filter(|r| r.built_for == written) {
            return Ok(existing);
        }

        let built = Arc::new(self.build_average_row(row, written)?);
        let mut averages = self.averages.lock();
        let keep = match &averages[row] {
            Some(current) => current.built_for < written,
            None => true,
        };
        if keep {
            averages[row] = Some(Arc::clone(&built));
        }
        Ok(built)
    }

    fn build_average_row(&self, row: usize, written: usize) -> Result<AverageRow> {
        let times = self
            .ctx
            .time_axis
            .values(self.start..self.start + written)?;
        let (rows, bw) = (self.rows, self.bucket_width);

        let buckets = self.with_columns(|data| {
            (0..self.bucket_count)
                .map(|k| {
                    let c0 = k * bw;
                    if c0 + 1 >= written {
                        return None;
                    }
                    let c1 = ((k + 1) * bw).min(written - 1);
                    let slice = &times[c0..=c1];
                    let integral =
                        integrate_row(data, rows, row, c0, slice, slice[0], slice[slice.len() - 1]);
                    IntervalAverage::from_integral(integral, times[c0], times[c1])
                })
                .collect()
        })?;

        Ok(AverageRow {
            built_for: written,
            buckets,
        })
    }

    // -------------------------------------------------------------------------
    // Sealing and Compression
    // -------------------------------------------------------------------------

    /// Stop accepting writes. Returns false if the chunk was not hot.
    pub fn seal(&self) -> bool {
        self.phase
            .compare_exchange(
                ChunkPhase::Hot as u8,
                ChunkPhase::Sealing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn seal_and_compress(&self) -> Result<()> {
        if !self.seal() {
            return Err(TraceError::InvalidState(format!(
                "{} is already {:?}",
                self.id,
                self.phase()
            )));
        }
        self.compress()
    }

    /// Build the min/max cache and compress a sealed chunk.
    ///
    /// On failure the chunk returns to `Hot` and stays readable.
    pub fn compress(&self) -> Result<()> {
        if self.phase() != ChunkPhase::Sealing {
            return Err(TraceError::InvalidState(format!(
                "{} must be sealed before compression",
                self.id
            )));
        }

        let compressed = {
            let storage = self.storage.read();
            match &*storage {
                ChunkStorage::Hot(data) => {
                    let written = self.written();
                    let codec = &self.ctx.codec;
                    let cache = build_hilo_cache(
                        data,
                        self.rows,
                        self.bucket_width,
                        self.bucket_count,
                        written,
                        |v| codec.quantize(v),
                    );
                    *self.hilo_cache.write() = Some(Arc::new(cache));
                    self.ctx
                        .codec
                        .compress_columns(&data[..written * self.rows], self.rows, written)
                }
                ChunkStorage::Compressed(_) => Err(TraceError::InvalidState(format!(
                    "{} is already compressed",
                    self.id
                ))),
            }
        };

        match compressed {
            Ok(matrix) => {
                tracing::debug!(
                    chunk = %self.id,
                    ratio = matrix.compression_ratio(),
                    blocks = matrix.block_count(),
                    elapsed_us = matrix.compression_time().as_micros() as u64,
                    "chunk compressed"
                );
                let previous = {
                    let mut storage = self.storage.write();
                    std::mem::replace(&mut *storage, ChunkStorage::Compressed(Arc::new(matrix)))
                };
                self.phase
                    .store(ChunkPhase::Compressed as u8, Ordering::Release);
                if let ChunkStorage::Hot(data) = previous {
                    self.ctx.pools.floats.release(data);
                }
                // Average buckets were built from unquantized samples.
                self.averages.lock().iter_mut().for_each(|r| *r = None);
                Ok(())
            }
            Err(e) => {
                // The buckets hold quantized values but the samples stay raw.
                *self.hilo_cache.write() = None;
                self.phase.store(ChunkPhase::Hot as u8, Ordering::Release);
                self.ctx.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(chunk = %self.id, error = %e, "chunk compression failed, keeping it hot");
                Err(e)
            }
        }
    }

    /// Make sure the min/max cache covers every written column.
    pub fn ensure_hilo_cache(&self) -> Result<()> {
        let written = self.written();
        let current = self
            .hilo_cache
            .read()
            .as_ref()
            .map_or(0, |cache| cache.built_for);
        if written == 0 || current >= written {
            return Ok(());
        }

        let (rows, bw, buckets) = (self.rows, self.bucket_width, self.bucket_count);
        let cache =
            self.with_columns(|data| build_hilo_cache(data, rows, bw, buckets, written, |v| v))?;
        let mut slot = self.hilo_cache.write();
        if slot.as_ref().map_or(true, |c| c.built_for < written) {
            *slot = Some(Arc::new(cache));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Bytes held by the sample storage.
    pub fn size_in_bytes(&self) -> usize {
        match &*self.storage.read() {
            ChunkStorage::Hot(data) => std::mem::size_of_val(data.as_slice()),
            ChunkStorage::Compressed(matrix) => matrix.stored_bytes(),
        }
    }

    /// Bytes held by min/max, average and integral caches.
    pub fn cache_size_in_bytes(&self) -> usize {
        let hilo = self
            .hilo_cache
            .read()
            .as_ref()
            .map_or(0, |c| c.buckets.len() * std::mem::size_of::<HiLo>());
        let averages: usize = self
            .averages
            .lock()
            .iter()
            .flatten()
            .map(|r| r.buckets.len() * std::mem::size_of::<Option<IntervalAverage>>())
            .sum();
        let integrals: usize = self
            .integrals
            .read()
            .iter()
            .flatten()
            .map(|v| v.len() * std::mem::size_of::<f64>())
            .sum();
        hilo + averages + integrals
    }

    pub fn compression_ratio(&self) -> Option<f64> {
        match &*self.storage.read() {
            ChunkStorage::Compressed(matrix) => Some(matrix.compression_ratio()),
            ChunkStorage::Hot(_) => None,
        }
    }

    pub fn compression_time(&self) -> Option<Duration> {
        match &*self.storage.read() {
            ChunkStorage::Compressed(matrix) => Some(matrix.compression_time()),
            ChunkStorage::Hot(_) => None,
        }
    }

    pub fn has_hilo_cache(&self) -> bool {
        self.hilo_cache.read().is_some()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.id)
            .field("start", &self.start)
            .field("rows", &self.rows)
            .field("width", &self.width)
            .field("written", &self.written())
            .field("phase", &self.phase())
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn scan_row(data: &[f32], rows: usize, row: usize, from: usize, to: usize) -> HiLo {
    (from..=to).fold(HiLo::EMPTY, |acc, col| {
        HiLo::merge_value(Some(acc), data[col * rows + row])
    })
}

/// Min/max buckets of the first `written` columns, as read back through `stored`.
fn build_hilo_cache(
    data: &[f32],
    rows: usize,
    bucket_width: usize,
    bucket_count: usize,
    written: usize,
    stored: impl Fn(f32) -> f32,
) -> HiLoCache {
    let mut buckets = vec![HiLo::EMPTY; rows * bucket_count];
    for col in 0..written {
        let bucket = col / bucket_width;
        let column = &data[col * rows..(col + 1) * rows];
        for (row, value) in column.iter().enumerate() {
            let slot = &mut buckets[row * bucket_count + bucket];
            *slot = HiLo::merge_value(Some(*slot), stored(*value));
        }
    }
    HiLoCache {
        built_for: written,
        bucket_count,
        buckets,
    }
}

/// Trapezoid integral of `row` over `[lo, hi]`, where `times` holds the
/// times of local columns `first ..`.
fn integrate_row(
    data: &[f32],
    rows: usize,
    row: usize,
    first: usize,
    times: &[f64],
    lo: f64,
    hi: f64,
) -> f64 {
    let mut sum = 0.0;
    for (j, pair) in times.windows(2).enumerate() {
        if pair[1] <= lo {
            continue;
        }
        if pair[0] >= hi {
            break;
        }
        let col = first + j;
        let v0 = data[col * rows + row] as f64;
        let v1 = data[(col + 1) * rows + row] as f64;
        sum += linear_integral(pair[0], pair[1], v0, v1, lo, hi);
    }
    sum
}

// =============================================================================
// Tests
// =============================================================================
