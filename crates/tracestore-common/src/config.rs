//! Tracestore Config - Engine Configuration
//!
//! Tuning knobs for the column store: chunk geometry, cache granularity,
//! codec settings, background compression and memory bounds. Loadable from
//! TOML or built programmatically from presets.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use crate::error::{Result, TraceError};
use crate::types::{CompressionType, Precision};
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Store Configuration
// =============================================================================

/// Configuration for a `DataContainer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Columns per chunk.
    pub junk_size: usize,
    /// Min/max and average buckets per chunk row. Must divide `junk_size`.
    pub value_cache_size: usize,
    pub precision: Precision,
    pub compression: CompressionType,
    pub compression_level: i32,
    pub compression_workers: usize,
    /// Sealed chunks that may wait for a worker before being deferred.
    pub compression_queue: usize,
    /// Byte budget for decompressed chunk copies.
    pub decompressed_cache_bytes: usize,
    /// Recycled buffers kept per pool before the pool is flushed.
    pub pool_max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            junk_size: 4096,
            value_cache_size: 32,
            precision: Precision::Medium,
            compression: CompressionType::Zstd,
            compression_level: 5,
            compression_workers: 2,
            compression_queue: 64,
            decompressed_cache_bytes: 64 * 1024 * 1024, // 64 MB
            pool_max_entries: 50,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| TraceError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TraceError::Configuration(e.to_string()))
    }

    /// Configuration that stores every sample bit-exact.
    pub fn lossless() -> Self {
        Self {
            precision: Precision::Lossless,
            ..Default::default()
        }
    }

    /// Smaller chunks, coarser quantization and a small decompression cache.
    pub fn low_memory() -> Self {
        Self {
            junk_size: 1024,
            value_cache_size: 16,
            precision: Precision::Coarse,
            compression_level: 9,
            compression_workers: 1,
            decompressed_cache_bytes: 8 * 1024 * 1024, // 8 MB
            pool_max_entries: 16,
            ..Default::default()
        }
    }

    pub fn with_junk_size(mut self, junk_size: usize, value_cache_size: usize) -> Self {
        self.junk_size = junk_size;
        self.value_cache_size = value_cache_size;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_compression(mut self, compression: CompressionType, level: i32) -> Self {
        self.compression = compression;
        self.compression_level = level;
        self
    }

    pub fn with_workers(mut self, workers: usize, queue: usize) -> Self {
        self.compression_workers = workers;
        self.compression_queue = queue;
        self
    }

    pub fn with_cache_bytes(mut self, bytes: usize) -> Self {
        self.decompressed_cache_bytes = bytes;
        self
    }

    /// Columns covered by one cache bucket.
    pub fn bucket_width(&self) -> usize {
        self.junk_size / self.value_cache_size.max(1)
    }

    /// Check that the configuration describes a usable store.
    pub fn validate(&self) -> Result<()> {
        if self.junk_size == 0 {
            return Err(TraceError::Configuration("junk_size must be positive".into()));
        }
        if self.value_cache_size == 0 || self.value_cache_size > self.junk_size {
            return Err(TraceError::Configuration(format!(
                "value_cache_size {} must be in 1..={}",
                self.value_cache_size, self.junk_size
            )));
        }
        if self.junk_size % self.value_cache_size != 0 {
            return Err(TraceError::Configuration(format!(
                "value_cache_size {} does not divide junk_size {}",
                self.value_cache_size, self.junk_size
            )));
        }
        if self.compression_workers == 0 {
            return Err(TraceError::Configuration(
                "at least one compression worker is required".into(),
            ));
        }
        if self.compression_queue == 0 {
            return Err(TraceError::Configuration("compression_queue must be positive".into()));
        }
        if self.compression == CompressionType::Zstd && !(1..=22).contains(&self.compression_level)
        {
            return Err(TraceError::Configuration(format!(
                "zstd level {} outside 1..=22",
                self.compression_level
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bucket_width(), 128);
        assert!(StoreConfig::lossless().validate().is_ok());
        assert!(StoreConfig::low_memory().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let config = StoreConfig::default().with_junk_size(100, 32);
        assert!(matches!(config.validate(), Err(TraceError::Configuration(_))));

        let config = StoreConfig::default().with_junk_size(0, 1);
        assert!(config.validate().is_err());

        let config = StoreConfig::default().with_workers(0, 4);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "junk_size = 1024\nvalue_cache_size = 8\nprecision = \"Lossless\"\ncompression = \"Lz4\""
        )
        .unwrap();

        let config = StoreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.junk_size, 1024);
        assert_eq!(config.value_cache_size, 8);
        assert_eq!(config.precision, Precision::Lossless);
        assert_eq!(config.compression, CompressionType::Lz4);
        assert_eq!(config.compression_workers, 2);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "junk_size = 1000\nvalue_cache_size = 7").unwrap();
        assert!(matches!(
            StoreConfig::from_file(file.path()),
            Err(TraceError::Configuration(_))
        ));

        assert!(matches!(
            StoreConfig::from_file("/nonexistent/tracestore.toml"),
            Err(TraceError::Io(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = StoreConfig::low_memory();
        let text = config.to_toml().unwrap();
        let parsed: StoreConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
