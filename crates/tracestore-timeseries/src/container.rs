//! Tracestore Data Container
//!
//! The column store written by a running simulation and read by plotting and
//! analysis code. One writer appends a column of `rows` samples per time
//! step; any number of readers query values, min/max envelopes and averages
//! concurrently. Full chunks are sealed and handed to the compression pool
//! without ever blocking the writer.
//!
//! Key Features:
//! - Append-only columns with strictly increasing time
//! - Background compression through a bounded queue with a deferred list
//! - Min/max queries served from bucket caches across chunk boundaries
//! - O(1) interval averages from running integrals, plus a bucket-cache path
//! - Lifecycle control with a final min/max sweep on pause and finish
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use crate::aggregation::{linear_integral, HiLo, IntervalAverage};
use crate::cache::DecompressedCache;
use crate::chunk::{Chunk, ChunkContext};
use crate::compression::BlockCodec;
use crate::time_axis::TimeAxis;
use crate::types::{ChunkId, ChunkPhase, ContainerStats, IntervalValue};
use crate::worker::CompressionPool;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracestore_common::utils::bytes_to_mb;
use tracestore_common::{ContainerStatus, Result, StoreConfig, TraceError};
use tracestore_memory::BufferPools;

// =============================================================================
// Internal State
// =============================================================================

/// State owned by the single writer.
struct WriterState {
    last_time: Option<f64>,
    last_values: Vec<f32>,
    integrals: Vec<f64>,
}

/// Per-row min/max over all chunks folded so far.
struct AbsoluteMinMax {
    folded: usize,
    per_row: Vec<HiLo>,
}

// =============================================================================
// Data Container
// =============================================================================

/// Append-only columnar store of simulation samples.
pub struct DataContainer {
    rows: usize,
    config: StoreConfig,
    signal_names: Vec<String>,
    signal_paths: RwLock<Vec<Option<String>>>,
    x_axis_name: String,
    status: RwLock<ContainerStatus>,
    ctx: Arc<ChunkContext>,
    chunks: RwLock<Vec<Arc<Chunk>>>,
    len: AtomicUsize,
    writer: Mutex<WriterState>,
    averaged: RwLock<Vec<bool>>,
    absolute: Mutex<AbsoluteMinMax>,
    deferred: Mutex<VecDeque<Arc<Chunk>>>,
    next_chunk_id: AtomicU64,
    workers: CompressionPool<Arc<Chunk>>,
}

impl DataContainer {
    /// Create a running store for `rows` signals.
    pub fn new(
        rows: usize,
        signal_names: Vec<String>,
        x_axis_name: impl Into<String>,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        if rows == 0 {
            return Err(TraceError::Configuration(
                "a container needs at least one row".into(),
            ));
        }
        if signal_names.len() != rows {
            return Err(TraceError::Configuration(format!(
                "{} signal names for {} rows",
                signal_names.len(),
                rows
            )));
        }

        let pools = Arc::new(BufferPools::new(config.pool_max_entries));
        let codec = BlockCodec::from_config(&config, Arc::clone(&pools));
        let cache = Arc::new(DecompressedCache::new(config.decompressed_cache_bytes));
        let ctx = Arc::new(ChunkContext::new(
            codec,
            pools,
            cache,
            Arc::new(TimeAxis::new()),
        ));
        let workers = CompressionPool::new(
            "tracestore-compress",
            config.compression_workers,
            config.compression_queue,
            |chunk: Arc<Chunk>| {
                // Failures are logged and counted by the chunk itself.
                let _ = chunk.compress();
            },
        )?;

        tracing::info!(
            rows,
            junk_size = config.junk_size,
            precision = ?config.precision,
            compression = ?config.compression,
            "data container initialized"
        );

        Ok(Self {
            rows,
            signal_names,
            signal_paths: RwLock::new(vec![None; rows]),
            x_axis_name: x_axis_name.into(),
            status: RwLock::new(ContainerStatus::Running),
            ctx,
            chunks: RwLock::new(Vec::new()),
            len: AtomicUsize::new(0),
            writer: Mutex::new(WriterState {
                last_time: None,
                last_values: vec![0.0; rows],
                integrals: vec![0.0; rows],
            }),
            averaged: RwLock::new(vec![false; rows]),
            absolute: Mutex::new(AbsoluteMinMax {
                folded: 0,
                per_row: vec![HiLo::EMPTY; rows],
            }),
            deferred: Mutex::new(VecDeque::new()),
            next_chunk_id: AtomicU64::new(0),
            workers,
            config,
        })
    }

    // -------------------------------------------------------------------------
    // Producer Interface
    // -------------------------------------------------------------------------

    /// Append one column sampled at `time`. Returns the column index.
    pub fn insert_values_at_end(&self, values: &[f32], time: f64) -> Result<usize> {
        let status = self.status();
        if !status.accepts_writes() {
            return Err(TraceError::InvalidState(format!(
                "cannot append while {}",
                status
            )));
        }
        if values.len() != self.rows {
            return Err(TraceError::InconsistentWrite(format!(
                "got {} values for {} rows",
                values.len(),
                self.rows
            )));
        }

        let mut writer = self.writer.lock();
        let previous = writer.last_time.unwrap_or(f64::NEG_INFINITY);
        if !time.is_finite() || time <= previous {
            return Err(TraceError::NonMonotonicTime {
                previous,
                given: time,
            });
        }

        let column = self.len.load(Ordering::Acquire);
        let chunk = self.chunk_for_write(column)?;
        self.ctx.time_axis.append(time)?;
        chunk.set_values(values, column)?;

        let averaged = self.averaged.read();
        for row in (0..self.rows).filter(|r| averaged[*r]) {
            if let Some(prev) = writer.last_time {
                let v0 = writer.last_values[row] as f64;
                writer.integrals[row] +=
                    linear_integral(prev, time, v0, values[row] as f64, prev, time);
            }
            chunk.set_integral_value(row, column, writer.integrals[row])?;
        }
        drop(averaged);

        writer.last_values.copy_from_slice(values);
        writer.last_time = Some(time);
        self.len.store(column + 1, Ordering::Release);
        drop(writer);

        if chunk.is_full() {
            self.submit_for_compression(chunk);
        } else if !self.deferred.lock().is_empty() {
            self.flush_deferred();
        }
        Ok(column)
    }

    /// Register rows for running-integral tracking, back-filling written columns.
    pub fn define_avg_calculation(&self, rows: &[usize]) -> Result<()> {
        if let Some(&bad) = rows.iter().find(|r| **r >= self.rows) {
            return Err(TraceError::IndexOutOfRange {
                index: bad,
                len: self.rows,
            });
        }

        let mut writer = self.writer.lock();
        let mut newly: Vec<usize> = {
            let averaged = self.averaged.read();
            rows.iter().copied().filter(|r| !averaged[*r]).collect()
        };
        newly.sort_unstable();
        newly.dedup();
        if newly.is_empty() {
            return Ok(());
        }

        let chunks = self.chunks.read().clone();
        for chunk in &chunks {
            for row in &newly {
                chunk.enable_integral(*row);
            }
        }

        let len = self.len();
        if len > 0 {
            let times = self.ctx.time_axis.values(0..len)?;
            for &row in &newly {
                let mut integral = 0.0;
                let mut prev: Option<f32> = None;
                for col in 0..len {
                    let chunk = &chunks[col / self.config.junk_size];
                    let value = chunk.get_value(row, col)?;
                    if let Some(p) = prev {
                        let (t0, t1) = (times[col - 1], times[col]);
                        integral += linear_integral(t0, t1, p as f64, value as f64, t0, t1);
                    }
                    chunk.set_integral_value(row, col, integral)?;
                    prev = Some(value);
                }
                writer.integrals[row] = integral;
            }
        }

        let mut averaged = self.averaged.write();
        for &row in &newly {
            averaged[row] = true;
        }
        tracing::info!(rows = ?newly, backfilled = len, "average calculation defined");
        Ok(())
    }

    /// Change the lifecycle status.
    ///
    /// `Paused` and `Finished` wait for in-flight compression and build the
    /// min/max caches of the remaining hot data. `Deleted` drops all chunks.
    pub fn set_status(&self, status: ContainerStatus) -> Result<()> {
        let current = self.status();
        if current == status {
            return Ok(());
        }
        let allowed = match (current, status) {
            (from, _) if from.is_terminal() => false,
            (_, ContainerStatus::NotInitialized) => false,
            (ContainerStatus::Finished, ContainerStatus::Running | ContainerStatus::Paused) => false,
            _ => true,
        };
        if !allowed {
            return Err(TraceError::InvalidState(format!(
                "cannot change status from {} to {}",
                current, status
            )));
        }

        if status.requires_sweep() {
            self.drain_compression();
            self.final_sweep()?;
            *self.status.write() = status;
        } else if status.is_terminal() {
            *self.status.write() = status;
            self.delete_all();
        } else {
            *self.status.write() = status;
        }

        tracing::info!(from = %current, to = %status, columns = self.len(), "container status changed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Consumer Interface
    // -------------------------------------------------------------------------

    pub fn get_value(&self, row: usize, column: usize) -> Result<f32> {
        self.check_row(row)?;
        let chunk = self.chunk_for_read(column)?;
        chunk.get_value(row, column)
    }

    pub fn get_time_value(&self, column: usize) -> Result<f64> {
        let len = self.len();
        if column >= len {
            return Err(TraceError::IndexOutOfRange { index: column, len });
        }
        self.ctx.time_axis.value(column)
    }

    /// Index of the last column at or before `time`, clamped to the written range.
    pub fn find_time_index(&self, time: f64) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }
        self.ctx.time_axis.find_time_index(time).min(len - 1)
    }

    /// Min/max of `row` over the inclusive column range.
    pub fn get_hi_lo_value(&self, row: usize, col_min: usize, col_max: usize) -> Result<HiLo> {
        self.check_row(row)?;
        let len = self.len();
        if len == 0 || col_min > col_max || col_min >= len {
            return Ok(HiLo::EMPTY);
        }
        let col_max = col_max.min(len - 1);

        let mut result = HiLo::EMPTY;
        for chunk in self.chunks_in(col_min, col_max) {
            let from = col_min.max(chunk.start());
            let to = col_max.min(chunk.end() - 1);
            result = HiLo::merge(result, chunk.get_hi_lo(row, from, to)?);
        }
        Ok(result)
    }

    /// Min/max of every sample of `row`. Fails if the row has no finite sample.
    pub fn get_absolute_min_max_value(&self, row: usize) -> Result<HiLo> {
        self.check_row(row)?;
        let len = self.len();
        let chunks = self.chunks.read().clone();

        let mut absolute = self.absolute.lock();
        // Only compressed chunks are final; others are scanned per call.
        while absolute.folded < chunks.len() {
            let chunk = &chunks[absolute.folded];
            if chunk.phase() != ChunkPhase::Compressed || chunk.end() > len {
                break;
            }
            for r in 0..self.rows {
                absolute.per_row[r] = HiLo::merge(absolute.per_row[r], chunk.row_hi_lo(r)?);
            }
            absolute.folded += 1;
        }
        let folded = absolute.folded;
        let mut result = absolute.per_row[row];
        drop(absolute);

        for chunk in chunks.iter().skip(folded) {
            if chunk.start() >= len {
                break;
            }
            let to = (chunk.end() - 1).min(len - 1);
            result = HiLo::merge(result, chunk.get_hi_lo(row, chunk.start(), to)?);
        }

        if result.is_empty() {
            return Err(TraceError::EmptyRange(format!(
                "row {} ({}) has no finite samples",
                row, self.signal_names[row]
            )));
        }
        Ok(result)
    }

    /// Samples of `row` with time in `[t0, t1]`: `None`, one value, or their envelope.
    pub fn get_data_value_in_interval(
        &self,
        t0: f64,
        t1: f64,
        row: usize,
    ) -> Result<Option<IntervalValue>> {
        self.check_row(row)?;
        if self.len() == 0 {
            return Ok(None);
        }

        let start = self.find_time_index(t0);
        let stop = self.find_time_index(t1);

        if start == 0 && stop == 0 {
            let first = self.get_time_value(0)?;
            if t0 <= first && t1 >= first {
                return Ok(Some(IntervalValue::Single(self.get_value(row, 0)?)));
            }
        }
        if stop <= start {
            return Ok(None);
        }
        if start + 1 == stop {
            let time = self.get_time_value(stop)?;
            if time > t1 || time < t0 {
                return Ok(None);
            }
            return Ok(Some(IntervalValue::Single(self.get_value(row, stop)?)));
        }
        Ok(Some(IntervalValue::Range(
            self.get_hi_lo_value(row, start + 1, stop)?,
        )))
    }

    /// Time-weighted average of `row` over `[t0, t1]` from the running integral.
    ///
    /// The window is clamped to the written time range.
    pub fn get_avg_value_in_interval(&self, t0: f64, t1: f64, row: usize) -> Result<f64> {
        self.check_row(row)?;
        if !self.averaged.read()[row] {
            return Err(TraceError::AverageNotDefined(row));
        }
        let (lo, hi) = self
            .clamped_window(t0, t1)?
            .ok_or_else(|| TraceError::EmptyRange(format!("window [{}, {}] holds no span", t0, t1)))?;

        let integral = self.integral_at(row, hi)? - self.integral_at(row, lo)?;
        Ok(integral / (hi - lo))
    }

    /// Time-weighted average of `row` over `[t0, t1]` from the bucket caches.
    pub fn get_average_in_interval(
        &self,
        t0: f64,
        t1: f64,
        row: usize,
    ) -> Result<Option<IntervalAverage>> {
        self.check_row(row)?;
        let Some((lo, hi)) = self.clamped_window(t0, t1)? else {
            return Ok(None);
        };
        let len = self.len();
        let a = self.find_time_index(lo);
        let b = (self.find_time_index(hi) + 1).min(len - 1);

        let chunks = self.chunks_in(a, b);
        let mut acc = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let from = a.max(chunk.start());
            let to = b.min(chunk.end() - 1);
            acc = IntervalAverage::merge(acc, chunk.get_average(row, from, to, lo, hi)?);

            let Some(next) = chunks.get(i + 1) else {
                break;
            };
            let seam = chunk.end() - 1;
            if seam < a || seam + 1 > b {
                continue;
            }
            let (ts, tn) = (self.get_time_value(seam)?, self.get_time_value(seam + 1)?);
            let (x0, x1) = (lo.max(ts), hi.min(tn));
            if x1 > x0 {
                let v0 = chunk.get_value(row, seam)? as f64;
                let v1 = next.get_value(row, seam + 1)? as f64;
                let integral = linear_integral(ts, tn, v0, v1, x0, x1);
                acc = IntervalAverage::merge(acc, IntervalAverage::from_integral(integral, x0, x1));
            }
        }
        Ok(acc)
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    pub fn signal_name(&self, row: usize) -> Result<&str> {
        self.check_row(row)?;
        Ok(&self.signal_names[row])
    }

    pub fn x_axis_name(&self) -> &str {
        &self.x_axis_name
    }

    pub fn signal_path(&self, row: usize) -> Option<String> {
        self.signal_paths.read().get(row).cloned().flatten()
    }

    pub fn set_signal_path(&self, row: usize, path: impl Into<String>) -> Result<()> {
        self.check_row(row)?;
        self.signal_paths.write()[row] = Some(path.into());
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of published columns.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the last published column.
    pub fn max_time_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    /// True if `row` ever received a NaN or infinite sample.
    pub fn is_invalid_numbers(&self, row: usize) -> bool {
        self.chunks
            .read()
            .iter()
            .any(|chunk| chunk.contains_invalid(row))
    }

    pub fn status(&self) -> ContainerStatus {
        *self.status.read()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// True if `row` is registered for integral tracking.
    pub fn is_avg_defined(&self, row: usize) -> bool {
        self.averaged.read().get(row).copied().unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Bytes held by chunk storage, chunk caches and the time axis.
    pub fn used_ram_bytes(&self) -> usize {
        let chunks: usize = self
            .chunks
            .read()
            .iter()
            .map(|c| c.size_in_bytes() + c.cache_size_in_bytes())
            .sum();
        chunks + self.ctx.time_axis.size_in_bytes()
    }

    /// Bytes held by decompressed chunk copies.
    pub fn cached_ram_bytes(&self) -> usize {
        self.ctx.cache.size_in_bytes()
    }

    pub fn used_ram_mb(&self) -> usize {
        bytes_to_mb(self.used_ram_bytes())
    }

    pub fn cached_ram_mb(&self) -> usize {
        bytes_to_mb(self.cached_ram_bytes())
    }

    pub fn stats(&self) -> ContainerStats {
        let mut stats = ContainerStats {
            rows: self.rows,
            columns: self.len(),
            deferred_chunks: self.deferred.lock().len(),
            cached_bytes: self.cached_ram_bytes(),
            compression_failures: self.ctx.compression_failures(),
            time_segments: self.ctx.time_axis.segment_count(),
            pools: self.ctx.pools.stats(),
            ..Default::default()
        };

        let mut ratio_sum = 0.0;
        let mut total_time = Duration::ZERO;
        for chunk in self.chunks.read().iter() {
            match chunk.phase() {
                ChunkPhase::Hot => {
                    stats.hot_chunks += 1;
                    stats.hot_bytes += chunk.size_in_bytes();
                }
                ChunkPhase::Sealing => {
                    stats.sealing_chunks += 1;
                    stats.hot_bytes += chunk.size_in_bytes();
                }
                ChunkPhase::Compressed => {
                    stats.compressed_chunks += 1;
                    stats.compressed_bytes += chunk.size_in_bytes();
                    ratio_sum += chunk.compression_ratio().unwrap_or(1.0);
                    total_time += chunk.compression_time().unwrap_or_default();
                }
            }
        }
        if stats.compressed_chunks > 0 {
            stats.average_compression_ratio = ratio_sum / stats.compressed_chunks as f64;
        }
        stats.total_compression_time = total_time;

        let cache = self.ctx.cache.stats();
        stats.cache_hits = cache.hits;
        stats.cache_misses = cache.misses;
        stats.cache_evictions = cache.evictions;
        stats
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows {
            return Err(TraceError::IndexOutOfRange {
                index: row,
                len: self.rows,
            });
        }
        Ok(())
    }

    fn chunk_for_read(&self, column: usize) -> Result<Arc<Chunk>> {
        let len = self.len();
        if column >= len {
            return Err(TraceError::IndexOutOfRange { index: column, len });
        }
        self.chunks
            .read()
            .get(column / self.config.junk_size)
            .cloned()
            .ok_or(TraceError::IndexOutOfRange { index: column, len })
    }

    /// Chunks overlapping the inclusive column range.
    fn chunks_in(&self, first: usize, last: usize) -> Vec<Arc<Chunk>> {
        let chunks = self.chunks.read();
        let from = first / self.config.junk_size;
        let to = (last / self.config.junk_size + 1).min(chunks.len());
        if from >= to {
            return Vec::new();
        }
        chunks[from..to].to_vec()
    }

    fn chunk_for_write(&self, column: usize) -> Result<Arc<Chunk>> {
        let index = column / self.config.junk_size;
        if let Some(chunk) = self.chunks.read().get(index) {
            return Ok(Arc::clone(chunk));
        }

        let id = ChunkId(self.next_chunk_id.fetch_add(1, Ordering::Relaxed));
        let chunk = Arc::new(Chunk::new(
            id,
            index * self.config.junk_size,
            self.rows,
            self.config.junk_size,
            self.config.value_cache_size,
            Arc::clone(&self.ctx),
        )?);
        for (row, enabled) in self.averaged.read().iter().enumerate() {
            if *enabled {
                chunk.enable_integral(row);
            }
        }
        self.chunks.write().push(Arc::clone(&chunk));
        tracing::debug!(chunk = %id, start = chunk.start(), "allocated chunk");
        Ok(chunk)
    }

    fn submit_for_compression(&self, chunk: Arc<Chunk>) {
        if !chunk.seal() {
            return;
        }
        tracing::debug!(chunk = %chunk.id(), "chunk sealed");

        let mut deferred = self.deferred.lock();
        self.resubmit(&mut deferred);
        if !deferred.is_empty() {
            deferred.push_back(chunk);
            return;
        }
        if let Err(chunk) = self.workers.try_submit(chunk) {
            tracing::warn!(
                chunk = %chunk.id(),
                pending = self.workers.pending(),
                "compression queue full, deferring chunk"
            );
            deferred.push_back(chunk);
        }
    }

    fn flush_deferred(&self) {
        let mut deferred = self.deferred.lock();
        self.resubmit(&mut deferred);
    }

    fn resubmit(&self, deferred: &mut VecDeque<Arc<Chunk>>) {
        while let Some(chunk) = deferred.pop_front() {
            if let Err(chunk) = self.workers.try_submit(chunk) {
                deferred.push_front(chunk);
                break;
            }
        }
    }

    /// Submit every deferred chunk and wait for the workers to finish.
    fn drain_compression(&self) {
        loop {
            {
                let mut deferred = self.deferred.lock();
                self.resubmit(&mut deferred);
                if deferred.is_empty() {
                    break;
                }
            }
            self.workers.wait_idle();
        }
        self.workers.wait_idle();
    }

    fn final_sweep(&self) -> Result<()> {
        let chunks = self.chunks.read().clone();
        for chunk in &chunks {
            chunk.ensure_hilo_cache()?;
        }
        if self.len() > 0 {
            for row in 0..self.rows {
                // Folds completed chunks; empty rows are not an error here.
                match self.get_absolute_min_max_value(row) {
                    Ok(_) | Err(TraceError::EmptyRange(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        tracing::debug!(chunks = chunks.len(), "final min/max sweep complete");
        Ok(())
    }

    fn delete_all(&self) {
        let mut writer = self.writer.lock();
        self.deferred.lock().clear();
        self.workers.wait_idle();

        let chunks = std::mem::take(&mut *self.chunks.write());
        self.len.store(0, Ordering::Release);
        self.ctx.time_axis.clear();
        writer.last_time = None;
        writer.last_values.iter_mut().for_each(|v| *v = 0.0);
        writer.integrals.iter_mut().for_each(|i| *i = 0.0);
        for chunk in &chunks {
            self.ctx.cache.remove(chunk.id());
        }
        let mut absolute = self.absolute.lock();
        absolute.folded = 0;
        absolute.per_row.iter_mut().for_each(|h| *h = HiLo::EMPTY);
        tracing::debug!(chunks = chunks.len(), "dropped all chunks");
    }

    /// Window `[t0, t1]` clamped to the written time range, if it has a span.
    fn clamped_window(&self, t0: f64, t1: f64) -> Result<Option<(f64, f64)>> {
        let len = self.len();
        if len < 2 {
            return Ok(None);
        }
        let lo = t0.max(self.get_time_value(0)?);
        let hi = t1.min(self.get_time_value(len - 1)?);
        if hi > lo {
            Ok(Some((lo, hi)))
        } else {
            Ok(None)
        }
    }

    /// Running integral of `row` from the first column to `time`.
    fn integral_at(&self, row: usize, time: f64) -> Result<f64> {
        let len = self.len();
        let k = self.find_time_index(time);
        let chunk = self.chunk_for_read(k)?;
        let mut integral = chunk
            .get_integral_value(row, k)
            .ok_or(TraceError::AverageNotDefined(row))?;

        let tk = self.get_time_value(k)?;
        if time > tk && k + 1 < len {
            let tn = self.get_time_value(k + 1)?;
            let v0 = self.get_value(row, k)? as f64;
            let v1 = self.get_value(row, k + 1)? as f64;
            integral += linear_integral(tk, tn, v0, v1, tk, time);
        }
        Ok(integral)
    }
}

impl std::fmt::Debug for DataContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContainer")
            .field("rows", &self.rows)
            .field("columns", &self.len())
            .field("status", &self.status())
            .field("x_axis_name", &self.x_axis_name)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tracestore_common::Precision;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("signal{}", i)).collect()
    }

    fn small_config() -> StoreConfig {
        StoreConfig::lossless().with_junk_size(16, 4)
    }

    fn container(rows: usize) -> DataContainer {
        DataContainer::new(rows, names(rows), "Time", small_config()).unwrap()
    }

    #[test]
    fn test_new_validates() {
        assert!(DataContainer::new(2, names(3), "t", StoreConfig::default()).is_err());
        assert!(DataContainer::new(0, names(0), "t", StoreConfig::default()).is_err());
        let bad = StoreConfig::default().with_junk_size(100, 7);
        assert!(DataContainer::new(1, names(1), "t", bad).is_err());

        let c = container(2);
        assert_eq!(c.status(), ContainerStatus::Running);
        assert_eq!(c.row_count(), 2);
        assert_eq!(c.signal_name(1).unwrap(), "signal1");
        assert!(c.signal_name(2).is_err());
        assert_eq!(c.x_axis_name(), "Time");
        assert!(c.is_empty());
        assert_eq!(c.max_time_index(), None);
    }

    #[test]
    fn test_insert_and_read() {
        let c = container(2);
        for i in 0..40 {
            assert_eq!(c.insert_values_at_end(&[i as f32, -(i as f32)], i as f64).unwrap(), i);
        }
        assert_eq!(c.len(), 40);
        assert_eq!(c.max_time_index(), Some(39));
        assert_eq!(c.get_value(0, 17).unwrap(), 17.0);
        assert_eq!(c.get_value(1, 39).unwrap(), -39.0);
        assert_eq!(c.get_time_value(22).unwrap(), 22.0);
        assert!(c.get_value(0, 40).is_err());
        assert!(c.get_value(2, 0).is_err());
    }

    #[test]
    fn test_insert_rejects_bad_input() {
        let c = container(2);
        assert!(matches!(
            c.insert_values_at_end(&[1.0], 0.0),
            Err(TraceError::InconsistentWrite(_))
        ));
        c.insert_values_at_end(&[1.0, 2.0], 1.0).unwrap();
        assert!(matches!(
            c.insert_values_at_end(&[1.0, 2.0], 1.0),
            Err(TraceError::NonMonotonicTime { .. })
        ));
        assert!(c.insert_values_at_end(&[1.0, 2.0], f64::NAN).is_err());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_data_value_in_interval() {
        let c = container(1);
        for i in 0..10 {
            c.insert_values_at_end(&[i as f32 * 10.0], i as f64).unwrap();
        }
        assert_eq!(
            c.get_data_value_in_interval(-1.0, 0.5, 0).unwrap(),
            Some(IntervalValue::Single(0.0))
        );
        assert_eq!(c.get_data_value_in_interval(2.2, 2.8, 0).unwrap(), None);
        assert_eq!(
            c.get_data_value_in_interval(2.5, 3.5, 0).unwrap(),
            Some(IntervalValue::Single(30.0))
        );
        assert_eq!(
            c.get_data_value_in_interval(2.5, 6.0, 0).unwrap(),
            Some(IntervalValue::Range(HiLo::new(30.0, 60.0)))
        );
    }

    #[test]
    fn test_data_value_single_sample_cases() {
        let c = container(1);
        c.insert_values_at_end(&[10.0], 1.0).unwrap();
        assert_eq!(c.get_data_value_in_interval(0.0, 0.5, 0).unwrap(), None);
        assert_eq!(
            c.get_data_value_in_interval(0.0, 2.0, 0).unwrap(),
            Some(IntervalValue::Single(10.0))
        );

        let c = container(1);
        c.insert_values_at_end(&[10.0], 0.0).unwrap();
        c.insert_values_at_end(&[20.0], 2.0).unwrap();
        assert_eq!(c.get_data_value_in_interval(0.5, 1.5, 0).unwrap(), None);
    }

    #[test]
    fn test_avg_requires_definition() {
        let c = container(2);
        for i in 0..5 {
            c.insert_values_at_end(&[1.0, 2.0], i as f64).unwrap();
        }
        assert!(matches!(
            c.get_avg_value_in_interval(0.0, 4.0, 0),
            Err(TraceError::AverageNotDefined(0))
        ));
        c.define_avg_calculation(&[0]).unwrap();
        assert!(c.is_avg_defined(0));
        assert!(!c.is_avg_defined(1));
        assert!((c.get_avg_value_in_interval(0.0, 4.0, 0).unwrap() - 1.0).abs() < 1e-9);
        assert!(matches!(
            c.get_avg_value_in_interval(10.0, 20.0, 0),
            Err(TraceError::EmptyRange(_))
        ));
        assert!(c.define_avg_calculation(&[5]).is_err());
    }

    #[test]
    fn test_status_transitions() {
        let c = container(1);
        c.insert_values_at_end(&[1.0], 0.0).unwrap();
        c.set_status(ContainerStatus::Paused).unwrap();
        c.insert_values_at_end(&[2.0], 1.0).unwrap();
        c.set_status(ContainerStatus::Running).unwrap();
        c.set_status(ContainerStatus::Finished).unwrap();
        assert!(matches!(
            c.insert_values_at_end(&[3.0], 2.0),
            Err(TraceError::InvalidState(_))
        ));
        assert!(c.set_status(ContainerStatus::Running).is_err());
        assert!(c.set_status(ContainerStatus::NotInitialized).is_err());

        c.set_status(ContainerStatus::Deleted).unwrap();
        assert!(c.is_empty());
        assert!(c.get_value(0, 0).is_err());
        assert!(c.get_time_value(0).is_err());
        assert!(c.max_time_index().is_none());
        assert_eq!(c.stats().time_segments, 0);
        assert!(c.writer.lock().last_time.is_none());
        assert!(c.set_status(ContainerStatus::Running).is_err());
    }

    #[test]
    fn test_signal_paths() {
        let c = container(2);
        assert_eq!(c.signal_path(0), None);
        c.set_signal_path(0, "circuit/R1.i").unwrap();
        assert_eq!(c.signal_path(0).as_deref(), Some("circuit/R1.i"));
        assert!(c.set_signal_path(3, "x").is_err());
        assert_eq!(c.signal_path(3), None);
    }

    #[test]
    fn test_invalid_numbers() {
        let c = container(2);
        c.insert_values_at_end(&[1.0, f32::INFINITY], 0.0).unwrap();
        assert!(!c.is_invalid_numbers(0));
        assert!(c.is_invalid_numbers(1));
        assert!(matches!(
            c.get_absolute_min_max_value(1),
            Err(TraceError::EmptyRange(_))
        ));
    }

    #[test]
    fn test_failed_compression_keeps_chunks_readable() {
        let config = small_config().with_precision(Precision::Coarse);
        let c = DataContainer::new(1, names(1), "t", config).unwrap();
        c.ctx.codec.set_fail_compression(true);

        let raw: Vec<f32> = (0..40)
            .map(|i| 130.1 + (i as f32 * 0.7).sin() * 0.05)
            .collect();
        for (i, v) in raw.iter().enumerate() {
            c.insert_values_at_end(&[*v], i as f64).unwrap();
        }
        c.set_status(ContainerStatus::Paused).unwrap();

        let stats = c.stats();
        assert_eq!(stats.compression_failures, 2);
        assert_eq!(stats.hot_chunks, 3);
        assert_eq!(stats.compressed_chunks, 0);
        assert_eq!(stats.sealing_chunks, 0);

        for (i, v) in raw.iter().enumerate() {
            assert_eq!(c.get_value(0, i).unwrap(), *v);
        }
        for (from, to) in [(0, 39), (3, 17), (15, 16), (16, 31), (20, 39)] {
            assert_eq!(
                c.get_hi_lo_value(0, from, to).unwrap(),
                HiLo::of_slice(&raw[from..=to])
            );
        }
        assert_eq!(
            c.get_absolute_min_max_value(0).unwrap(),
            HiLo::of_slice(&raw)
        );
    }

    #[test]
    fn test_stats_after_finish() {
        let config = StoreConfig::default()
            .with_junk_size(32, 4)
            .with_precision(Precision::Fine);
        let c = DataContainer::new(1, names(1), "t", config).unwrap();
        for i in 0..100 {
            c.insert_values_at_end(&[(i as f32 * 0.1).sin()], i as f64 * 1e-3).unwrap();
        }
        c.set_status(ContainerStatus::Finished).unwrap();

        let stats = c.stats();
        assert_eq!(stats.columns, 100);
        assert_eq!(stats.total_chunks(), 4);
        assert_eq!(stats.compressed_chunks, 3);
        assert_eq!(stats.hot_chunks, 1);
        assert_eq!(stats.deferred_chunks, 0);
        assert_eq!(stats.compression_failures, 0);
        assert!(stats.average_compression_ratio > 0.0);
        assert_eq!(stats.time_segments, 1);
        assert!(c.used_ram_bytes() > 0);
    }
}
