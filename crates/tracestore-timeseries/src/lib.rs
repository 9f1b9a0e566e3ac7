//! Tracestore Time Series - Simulation Result Store
//!
//! In-memory store for the output of a running simulation. Each time step
//! appends one column of samples; plotting and analysis code reads values,
//! min/max envelopes and time-weighted averages while the run continues.
//!
//! Key Features:
//! - Fixed-width chunks compressed in the background once full
//! - Lossless or bit-masked lossy storage with zstd, LZ4 or Snappy blocks
//! - Bucket caches for min/max and average queries
//! - Segmented time axis with exact index lookups across step changes
//! - Bounded LRU cache of decompressed chunks
//!
//! @version 0.1.0
//! @author Tracestore Development Team

pub mod aggregation;
pub mod cache;
pub mod chunk;
pub mod compression;
pub mod container;
pub mod time_axis;
pub mod types;
pub mod worker;

pub use aggregation::{linear_integral, HiLo, IntervalAverage};
pub use cache::{CacheStats, DecompressedCache};
pub use chunk::{Chunk, ChunkContext};
pub use compression::{BlockCodec, CompressedMatrix, BLOCK_SIZE};
pub use container::DataContainer;
pub use time_axis::{TimeAxis, TimeSegment};
pub use types::{ChunkId, ChunkPhase, ContainerStats, IntervalValue};
pub use worker::CompressionPool;

pub use tracestore_common::{
    CompressionType, ContainerStatus, Precision, Result, StoreConfig, TraceError,
};
