//! Tracestore Utils - Utility Functions
//!
//! Checksums for compressed chunk streams and size helpers used by the
//! memory diagnostics and the command line driver.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

// =============================================================================
// Checksums
// =============================================================================

/// CRC32 over a sequence of blocks, as if they were one contiguous stream.
pub fn crc32_blocks<'a, I>(blocks: I) -> u32
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = crc32fast::Hasher::new();
    for block in blocks {
        hasher.update(block);
    }
    hasher.finalize()
}

// =============================================================================
// Sizes
// =============================================================================

/// Bytes per megabyte used by the RAM diagnostics.
pub const MEGA_BYTES: usize = 1024 * 1024;

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Convert a byte count into megabytes, rounding down.
#[inline]
pub fn bytes_to_mb(bytes: usize) -> usize {
    bytes / MEGA_BYTES
}

/// Format a byte size as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, SIZE_UNITS[0])
    } else {
        format!("{:.2} {}", size, SIZE_UNITS[unit])
    }
}

/// Parse sizes such as `"64MB"`, `"512 KB"` or `"4096"`.
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();

    let (digits, scale) = match SIZE_UNITS
        .iter()
        .enumerate()
        .rev()
        .find(|(_, unit)| s.ends_with(**unit))
    {
        Some((power, unit)) => (&s[..s.len() - unit.len()], 1024_u64.pow(power as u32)),
        None => (s.as_str(), 1),
    };

    let value = digits.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * scale as f64) as u64)
}

// =============================================================================
// Tests
// =============================================================================
