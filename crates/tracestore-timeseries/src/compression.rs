//! Tracestore Block Codec
//!
//! Compression of sealed chunk matrices. Float bit patterns are quantized by
//! clearing low mantissa bits, each row is differenced twice so smooth
//! signals turn into runs of small integers, and the big-endian byte stream
//! is passed through a general-purpose compressor into fixed-size blocks.
//!
//! Key Features:
//! - Four precision levels from bit-exact to 11 dropped mantissa bits
//! - Second-order differencing with wrapping arithmetic
//! - Zstd, LZ4 and Snappy backends, or no general compression
//! - CRC32 and length verification on decompression
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracestore_common::{utils, CompressionType, Precision, Result, StoreConfig, TraceError};
use tracestore_memory::BufferPools;

// =============================================================================
// Constants
// =============================================================================

/// Size of one stored block in bytes. The last block of a matrix may be shorter.
pub const BLOCK_SIZE: usize = 1024;

const BYTES_PER_VALUE: usize = 4;

// =============================================================================
// Compressed Matrix
// =============================================================================

/// An immutable compressed R×C matrix.
pub struct CompressedMatrix {
    rows: usize,
    cols: usize,
    precision: Precision,
    compression: CompressionType,
    blocks: Vec<Bytes>,
    compressed_len: usize,
    checksum: u32,
    compression_time: Duration,
}

impl CompressedMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Length of the compressed stream.
    pub fn compressed_bytes(&self) -> usize {
        self.compressed_len
    }

    /// Bytes reserved by the stored blocks.
    pub fn stored_bytes(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }

    pub fn uncompressed_bytes(&self) -> usize {
        self.rows * self.cols * BYTES_PER_VALUE
    }

    /// Uncompressed bytes divided by stored block bytes.
    pub fn compression_ratio(&self) -> f64 {
        let stored = self.stored_bytes();
        if stored == 0 {
            return 1.0;
        }
        self.uncompressed_bytes() as f64 / stored as f64
    }

    pub fn compression_time(&self) -> Duration {
        self.compression_time
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    fn verify(&self) -> Result<()> {
        let len: usize = self.blocks.iter().map(|b| b.len()).sum();
        if len != self.compressed_len {
            return Err(TraceError::Corruption(format!(
                "compressed stream is {} bytes, expected {}",
                len, self.compressed_len
            )));
        }
        let checksum = utils::crc32_blocks(self.blocks.iter().map(|b| b.as_ref()));
        if checksum != self.checksum {
            return Err(TraceError::Corruption(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                self.checksum, checksum
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Bytes> {
        &mut self.blocks
    }
}

impl fmt::Debug for CompressedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("precision", &self.precision)
            .field("compression", &self.compression)
            .field("blocks", &self.blocks.len())
            .field("compressed_len", &self.compressed_len)
            .field("checksum", &self.checksum)
            .finish()
    }
}

// =============================================================================
// Block Streams
// =============================================================================

/// Sink that cuts the compressed stream into fixed-size blocks.
struct BlockWriter {
    blocks: Vec<Bytes>,
    current: BytesMut,
    hasher: crc32fast::Hasher,
    written: usize,
}

impl BlockWriter {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current: BytesMut::with_capacity(BLOCK_SIZE),
            hasher: crc32fast::Hasher::new(),
            written: 0,
        }
    }

    fn finish(mut self) -> (Vec<Bytes>, usize, u32) {
        if !self.current.is_empty() {
            self.blocks.push(self.current.freeze());
        }
        (self.blocks, self.written, self.hasher.finalize())
    }
}

impl Write for BlockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let n = (BLOCK_SIZE - self.current.len()).min(rest.len());
            self.current.extend_from_slice(&rest[..n]);
            if self.current.len() == BLOCK_SIZE {
                let full = std::mem::replace(&mut self.current, BytesMut::with_capacity(BLOCK_SIZE));
                self.blocks.push(full.freeze());
            }
            rest = &rest[n..];
        }
        self.hasher.update(buf);
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reads a block list back as one contiguous stream.
struct BlockReader<'a> {
    blocks: &'a [Bytes],
    index: usize,
    offset: usize,
}

impl<'a> BlockReader<'a> {
    fn new(blocks: &'a [Bytes]) -> Self {
        Self {
            blocks,
            index: 0,
            offset: 0,
        }
    }
}

impl Read for BlockReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(block) = self.blocks.get(self.index) {
            let remaining = &block[self.offset..];
            if remaining.is_empty() {
                self.index += 1;
                self.offset = 0;
                continue;
            }
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.offset += n;
            return Ok(n);
        }
        Ok(0)
    }
}

// =============================================================================
// Differencing
// =============================================================================

fn difference_row(row: &mut [i32]) {
    for j in (1..row.len()).rev() {
        row[j] = row[j].wrapping_sub(row[j - 1]);
    }
    for j in (2..row.len()).rev() {
        row[j] = row[j].wrapping_sub(row[j - 1]);
    }
}

fn integrate_row(row: &mut [i32]) {
    for j in 2..row.len() {
        row[j] = row[j].wrapping_add(row[j - 1]);
    }
    for j in 1..row.len() {
        row[j] = row[j].wrapping_add(row[j - 1]);
    }
}

// =============================================================================
// Block Codec
// =============================================================================

/// Matrix codec bound to one precision, backend and set of scratch pools.
#[derive(Clone)]
pub struct BlockCodec {
    precision: Precision,
    compression: CompressionType,
    level: i32,
    pools: Arc<BufferPools>,
    #[cfg(test)]
    fail_compression: Arc<std::sync::atomic::AtomicBool>,
}

impl BlockCodec {
    pub fn new(
        precision: Precision,
        compression: CompressionType,
        level: i32,
        pools: Arc<BufferPools>,
    ) -> Self {
        Self {
            precision,
            compression,
            level,
            pools,
            #[cfg(test)]
            fail_compression: Arc::default(),
        }
    }

    /// Make every later `compress` call on this codec and its clones fail.
    #[cfg(test)]
    pub(crate) fn set_fail_compression(&self, fail: bool) {
        self.fail_compression
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn from_config(config: &StoreConfig, pools: Arc<BufferPools>) -> Self {
        Self::new(
            config.precision,
            config.compression,
            config.compression_level,
            pools,
        )
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// The value a sample reads back as after compression.
    #[inline]
    pub fn quantize(&self, value: f32) -> f32 {
        quantize_with(self.precision, value)
    }

    /// Compress a row-major matrix of float bit patterns.
    pub fn compress(&self, matrix: &[i32], rows: usize, cols: usize) -> Result<CompressedMatrix> {
        check_shape(matrix.len(), rows, cols)?;
        let mask = self.precision.mask();
        let mut scratch = self.pools.ints.try_acquire(matrix.len())?;
        for (dst, src) in scratch.iter_mut().zip(matrix) {
            *dst = src & mask;
        }
        let result = self.encode(&mut scratch, rows, cols);
        self.pools.ints.release(scratch);
        result
    }

    /// Compress a column-major `f32` matrix as stored by hot chunks.
    pub fn compress_columns(&self, data: &[f32], rows: usize, cols: usize) -> Result<CompressedMatrix> {
        check_shape(data.len(), rows, cols)?;
        let mask = self.precision.mask();
        let mut scratch = self.pools.ints.try_acquire(data.len())?;
        for col in 0..cols {
            let column = &data[col * rows..(col + 1) * rows];
            for (row, value) in column.iter().enumerate() {
                scratch[row * cols + col] = (value.to_bits() as i32) & mask;
            }
        }
        let result = self.encode(&mut scratch, rows, cols);
        self.pools.ints.release(scratch);
        result
    }

    /// Restore the row-major bit patterns of a compressed matrix.
    pub fn decompress(&self, matrix: &CompressedMatrix) -> Result<Vec<i32>> {
        let mut out = vec![0i32; matrix.rows * matrix.cols];
        self.decode_into(matrix, &mut out)?;
        Ok(out)
    }

    /// Restore a column-major `f32` matrix. The buffer comes from the float pool.
    pub fn decompress_columns(&self, matrix: &CompressedMatrix) -> Result<Vec<f32>> {
        let (rows, cols) = (matrix.rows, matrix.cols);
        let mut ints = self.pools.ints.try_acquire(rows * cols)?;
        if let Err(e) = self.decode_into(matrix, &mut ints) {
            self.pools.ints.release(ints);
            return Err(e);
        }

        let mut out = match self.pools.floats.try_acquire(rows * cols) {
            Ok(out) => out,
            Err(e) => {
                self.pools.ints.release(ints);
                return Err(e);
            }
        };
        for row in 0..rows {
            let bits = &ints[row * cols..(row + 1) * cols];
            for (col, b) in bits.iter().enumerate() {
                out[col * rows + row] = f32::from_bits(*b as u32);
            }
        }
        self.pools.ints.release(ints);
        Ok(out)
    }

    fn encode(&self, scratch: &mut [i32], rows: usize, cols: usize) -> Result<CompressedMatrix> {
        #[cfg(test)]
        if self.fail_compression.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TraceError::Compression("compression disabled by test".into()));
        }
        let started = Instant::now();

        if cols > 0 {
            for row in scratch.chunks_exact_mut(cols) {
                difference_row(row);
            }
        }

        let mut bytes = self.pools.bytes.try_acquire(scratch.len() * BYTES_PER_VALUE)?;
        for (dst, value) in bytes.chunks_exact_mut(BYTES_PER_VALUE).zip(scratch.iter()) {
            dst.copy_from_slice(&value.to_be_bytes());
        }
        let written = self.write_stream(&bytes);
        self.pools.bytes.release(bytes);
        let (blocks, compressed_len, checksum) = written?;

        Ok(CompressedMatrix {
            rows,
            cols,
            precision: self.precision,
            compression: self.compression,
            blocks,
            compressed_len,
            checksum,
            compression_time: started.elapsed(),
        })
    }

    fn write_stream(&self, bytes: &[u8]) -> Result<(Vec<Bytes>, usize, u32)> {
        let sink = BlockWriter::new();
        let sink = match self.compression {
            CompressionType::None => {
                let mut sink = sink;
                sink.write_all(bytes)?;
                sink
            }
            CompressionType::Zstd => {
                let mut encoder = zstd::stream::write::Encoder::new(sink, self.level)
                    .map_err(|e| TraceError::Compression(e.to_string()))?;
                encoder
                    .write_all(bytes)
                    .map_err(|e| TraceError::Compression(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| TraceError::Compression(e.to_string()))?
            }
            CompressionType::Lz4 => {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(sink);
                encoder
                    .write_all(bytes)
                    .map_err(|e| TraceError::Compression(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| TraceError::Compression(e.to_string()))?
            }
            CompressionType::Snappy => {
                let mut encoder = snap::write::FrameEncoder::new(sink);
                encoder
                    .write_all(bytes)
                    .map_err(|e| TraceError::Compression(e.to_string()))?;
                encoder
                    .into_inner()
                    .map_err(|e| TraceError::Compression(e.error().to_string()))?
            }
        };
        Ok(sink.finish())
    }

    fn decode_into(&self, matrix: &CompressedMatrix, out: &mut [i32]) -> Result<()> {
        check_shape(out.len(), matrix.rows, matrix.cols)?;
        matrix.verify()?;

        let mut bytes = self.pools.bytes.try_acquire(out.len() * BYTES_PER_VALUE)?;
        let read = read_stream(matrix, &mut bytes);
        if read.is_ok() {
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(BYTES_PER_VALUE)) {
                *dst = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
            }
        }
        self.pools.bytes.release(bytes);
        read?;

        if matrix.cols > 0 {
            for row in out.chunks_exact_mut(matrix.cols) {
                integrate_row(row);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BlockCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCodec")
            .field("precision", &self.precision)
            .field("compression", &self.compression)
            .field("level", &self.level)
            .finish()
    }
}

/// Clear the low mantissa bits dropped by `precision`.
#[inline]
pub fn quantize_with(precision: Precision, value: f32) -> f32 {
    f32::from_bits(((value.to_bits() as i32) & precision.mask()) as u32)
}

fn check_shape(len: usize, rows: usize, cols: usize) -> Result<()> {
    match rows.checked_mul(cols) {
        Some(expected) if expected == len => Ok(()),
        _ => Err(TraceError::InconsistentWrite(format!(
            "matrix of {} values does not have shape {}x{}",
            len, rows, cols
        ))),
    }
}

fn read_stream(matrix: &CompressedMatrix, out: &mut [u8]) -> Result<()> {
    let reader = BlockReader::new(&matrix.blocks);
    match matrix.compression {
        CompressionType::None => read_exactly(reader, out),
        CompressionType::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| TraceError::Compression(e.to_string()))?;
            read_exactly(decoder, out)
        }
        CompressionType::Lz4 => read_exactly(lz4_flex::frame::FrameDecoder::new(reader), out),
        CompressionType::Snappy => read_exactly(snap::read::FrameDecoder::new(reader), out),
    }
}

fn read_exactly<R: Read>(mut reader: R, out: &mut [u8]) -> Result<()> {
    reader.read_exact(out).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            TraceError::Corruption(format!("stream ended before {} bytes", out.len()))
        }
        _ => TraceError::Compression(e.to_string()),
    })?;

    let mut probe = [0u8; 1];
    match reader.read(&mut probe) {
        Ok(0) => Ok(()),
        Ok(_) => Err(TraceError::Corruption(format!(
            "stream longer than {} bytes",
            out.len()
        ))),
        Err(e) => Err(TraceError::Compression(e.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec(precision: Precision, compression: CompressionType) -> BlockCodec {
        BlockCodec::new(precision, compression, 3, Arc::new(BufferPools::default()))
    }

    fn sine_columns(rows: usize, cols: usize) -> Vec<f32> {
        let mut data = vec![0.0; rows * cols];
        for col in 0..cols {
            for row in 0..rows {
                data[col * rows + row] = ((col as f32) * 0.01 + row as f32).sin() * 100.0;
            }
        }
        data
    }

    #[test]
    fn test_differencing_inverse() {
        let original = vec![5, -3, i32::MAX, i32::MIN, 0, 17, 17, 17];
        let mut row = original.clone();
        difference_row(&mut row);
        integrate_row(&mut row);
        assert_eq!(row, original);
    }

    #[test]
    fn test_differencing_ramp() {
        let mut row: Vec<i32> = (0..10).map(|i| 100 + 3 * i).collect();
        difference_row(&mut row);
        assert_eq!(&row[..2], &[100, 3]);
        assert!(row[2..].iter().all(|d| *d == 0));
    }

    #[test]
    fn test_lossless_roundtrip_all_backends() {
        let data = sine_columns(3, 2000);
        for compression in [
            CompressionType::None,
            CompressionType::Lz4,
            CompressionType::Zstd,
            CompressionType::Snappy,
        ] {
            let codec = codec(Precision::Lossless, compression);
            let compressed = codec.compress_columns(&data, 3, 2000).unwrap();
            let restored = codec.decompress_columns(&compressed).unwrap();
            assert_eq!(restored.len(), data.len());
            for (a, b) in restored.iter().zip(&data) {
                assert_eq!(a.to_bits(), b.to_bits(), "{:?}", compression);
            }
        }
    }

    #[test]
    fn test_blocks_and_ratio() {
        let codec = codec(Precision::Medium, CompressionType::Zstd);
        let data = sine_columns(4, 4096);
        let compressed = codec.compress_columns(&data, 4, 4096).unwrap();

        assert!(compressed.block_count() >= 1);
        assert_eq!(compressed.stored_bytes(), compressed.block_count() * BLOCK_SIZE);
        assert!(compressed.compressed_bytes() <= compressed.stored_bytes());
        assert!(compressed.compressed_bytes() > compressed.stored_bytes() - BLOCK_SIZE);
        assert_eq!(compressed.uncompressed_bytes(), 4 * 4096 * 4);
        assert!(compressed.compression_ratio() > 1.0);
    }

    #[test]
    fn test_uncompressed_backend_block_layout() {
        let codec = codec(Precision::Lossless, CompressionType::None);
        let compressed = codec.compress(&vec![1; 300], 1, 300).unwrap();
        assert_eq!(compressed.compressed_bytes(), 1200);
        assert_eq!(compressed.block_count(), 2);
        assert!((compressed.compression_ratio() - 1200.0 / 2048.0).abs() < 1e-12);
    }

    #[test]
    fn test_corruption_detected() {
        let codec = codec(Precision::Lossless, CompressionType::Lz4);
        let mut compressed = codec.compress_columns(&sine_columns(2, 512), 2, 512).unwrap();

        let first = compressed.blocks_mut()[0].clone();
        let mut damaged = first.to_vec();
        damaged[first.len() / 2] ^= 0xFF;
        compressed.blocks_mut()[0] = Bytes::from(damaged);
        assert!(matches!(
            codec.decompress_columns(&compressed),
            Err(TraceError::Corruption(_))
        ));

        compressed.blocks_mut()[0] = first;
        compressed.blocks_mut().pop();
        assert!(matches!(
            codec.decompress_columns(&compressed),
            Err(TraceError::Corruption(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let codec = codec(Precision::Lossless, CompressionType::Zstd);
        assert!(codec.compress(&[1, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn test_quantize() {
        let codec = codec(Precision::Coarse, CompressionType::Zstd);
        let v = 1.234_567_8_f32;
        let q = codec.quantize(v);
        assert_eq!(q.to_bits() & 0x7FF, 0);
        assert!((q - v).abs() <= v.abs() * 2.0f32.powi(-12));
        assert_eq!(quantize_with(Precision::Lossless, v), v);
        assert!(codec.quantize(f32::NAN).is_nan());
    }

    #[test]
    fn test_empty_matrix() {
        let codec = codec(Precision::Medium, CompressionType::Snappy);
        let compressed = codec.compress(&[], 0, 0).unwrap();
        assert!(codec.decompress(&compressed).unwrap().is_empty());
    }

    fn precision() -> impl Strategy<Value = Precision> {
        prop_oneof![
            Just(Precision::Lossless),
            Just(Precision::Fine),
            Just(Precision::Medium),
            Just(Precision::Coarse),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip_equals_quantized(
            rows in 1usize..5,
            cols in 1usize..300,
            seed in prop::collection::vec(any::<i32>(), 1500),
            precision in precision(),
        ) {
            let matrix: Vec<i32> = seed.iter().cycle().take(rows * cols).copied().collect();
            let codec = codec(precision, CompressionType::Zstd);
            let compressed = codec.compress(&matrix, rows, cols).unwrap();
            let restored = codec.decompress(&compressed).unwrap();
            let expected: Vec<i32> = matrix.iter().map(|v| v & precision.mask()).collect();
            prop_assert_eq!(restored, expected);
        }
    }
}
