//! Tracestore Memory - Buffer Recycling
//!
//! Memory management for the storage engine. Large per-chunk arrays (hot
//! sample matrices, codec scratch space) are recycled through size-keyed
//! pools instead of being returned to the allocator after every chunk.
//!
//! Key Features:
//! - Size-keyed buffer pools shared across threads
//! - Fallible acquisition reporting allocation failure as an error
//! - Bounded retention with a full flush when the cap is exceeded
//! - Hit/miss counters for diagnostics
//!
//! @version 0.1.0
//! @author Tracestore Development Team

pub mod pool;

pub use pool::{BufferPool, BufferPools, PoolStats};
