//! Tracestore Types - Shared Enumerations
//!
//! Small value types shared across the workspace: the container lifecycle,
//! the quantization precision levels used by the block codec, and the
//! general-purpose compression backends.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Container Status
// =============================================================================

/// Lifecycle status of a column store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContainerStatus {
    #[default]
    NotInitialized,
    Running,
    Paused,
    Finished,
    Deleted,
}

impl ContainerStatus {
    /// Returns true if the writer may append columns in this status.
    pub fn accepts_writes(&self) -> bool {
        matches!(self, ContainerStatus::Running | ContainerStatus::Paused)
    }

    /// Returns true if entering this status requires the final min/max sweep.
    pub fn requires_sweep(&self) -> bool {
        matches!(self, ContainerStatus::Paused | ContainerStatus::Finished)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerStatus::Deleted)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerStatus::NotInitialized => "not-initialized",
            ContainerStatus::Running => "running",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Finished => "finished",
            ContainerStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Precision
// =============================================================================

/// Quantization level applied to float bit patterns before compression.
///
/// Each level clears a fixed number of low-order mantissa bits; `Lossless`
/// keeps every bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Precision {
    Lossless,
    Fine,
    #[default]
    Medium,
    Coarse,
}

impl Precision {
    pub const ALL: [Precision; 4] = [
        Precision::Lossless,
        Precision::Fine,
        Precision::Medium,
        Precision::Coarse,
    ];

    /// Bit mask ANDed with `f32::to_bits()` (as `i32`).
    pub const fn mask(&self) -> i32 {
        match self {
            Precision::Lossless => -1,
            Precision::Fine => -128,
            Precision::Medium => -512,
            Precision::Coarse => -2048,
        }
    }

    /// Number of mantissa bits discarded.
    pub const fn dropped_bits(&self) -> u32 {
        self.mask().trailing_zeros()
    }

    /// Look up a level by its index (0 = lossless .. 3 = coarse).
    pub fn from_level(level: usize) -> Option<Self> {
        Self::ALL.get(level).copied()
    }
}

// =============================================================================
// Compression Type
// =============================================================================

/// General-purpose compressor applied after differencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CompressionType {
    None,
    Lz4,
    #[default]
    Zstd,
    Snappy,
}

// =============================================================================
// Tests
// =============================================================================
