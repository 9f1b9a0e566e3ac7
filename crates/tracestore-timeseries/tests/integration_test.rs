//! End-to-end behaviour of the data container across chunk boundaries,
//! background compression and lifecycle changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracestore_timeseries::{
    CompressionType, ContainerStatus, DataContainer, HiLo, IntervalValue, Precision, StoreConfig,
    TraceError,
};

fn names(rows: usize) -> Vec<String> {
    (0..rows).map(|r| format!("row{}", r)).collect()
}

fn lossless(junk: usize, buckets: usize) -> StoreConfig {
    StoreConfig::lossless().with_junk_size(junk, buckets)
}

fn fill(container: &DataContainer, columns: usize, dt: f64, f: impl Fn(usize, usize) -> f32) {
    let rows = container.row_count();
    let start = container.len();
    for col in start..start + columns {
        let values: Vec<f32> = (0..rows).map(|r| f(r, col)).collect();
        container.insert_values_at_end(&values, col as f64 * dt).unwrap();
    }
}

fn naive_hi_lo(values: impl Iterator<Item = f32>) -> HiLo {
    HiLo::of_slice(&values.collect::<Vec<_>>())
}

#[test]
fn test_junk_boundary_queries() {
    let c = DataContainer::new(2, names(2), "time", lossless(16, 4)).unwrap();
    let wave = |r: usize, col: usize| ((col as f32) * 0.7 + r as f32).sin() * 100.0;
    fill(&c, 50, 1.0, wave);

    assert_eq!(c.get_value(0, 15).unwrap(), wave(0, 15));
    assert_eq!(c.get_value(0, 16).unwrap(), wave(0, 16));
    assert_eq!(c.get_value(1, 49).unwrap(), wave(1, 49));

    for (a, b) in [(10, 40), (0, 49), (15, 16), (16, 31), (3, 3), (30, 200)] {
        let expected = naive_hi_lo((a..=b.min(49)).map(|col| wave(1, col)));
        assert_eq!(c.get_hi_lo_value(1, a, b).unwrap(), expected, "range {}..={}", a, b);
    }

    c.set_status(ContainerStatus::Paused).unwrap();
    let stats = c.stats();
    assert_eq!(stats.compressed_chunks, 3);
    assert_eq!(stats.hot_chunks, 1);

    for (a, b) in [(10, 40), (0, 49), (17, 46)] {
        let expected = naive_hi_lo((a..=b).map(|col| wave(0, col)));
        assert_eq!(c.get_hi_lo_value(0, a, b).unwrap(), expected);
    }
    assert_eq!(c.get_hi_lo_value(0, 60, 70).unwrap(), HiLo::EMPTY);
}

#[test]
fn test_concurrent_readers_during_compression() {
    let config = lossless(64, 8).with_workers(2, 4);
    let c = Arc::new(DataContainer::new(1, names(1), "time", config).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let c = Arc::clone(&c);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0usize;
                while !done.load(Ordering::Acquire) || checks == 0 {
                    let len = c.len();
                    if len == 0 {
                        thread::yield_now();
                        continue;
                    }
                    let envelope = c.get_hi_lo_value(0, 0, len - 1).unwrap();
                    assert_eq!(envelope, HiLo::new(0.0, (len - 1) as f32));
                    let mid = len / 2;
                    assert_eq!(c.get_value(0, mid).unwrap(), mid as f32);
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    for col in 0..4000 {
        c.insert_values_at_end(&[col as f32], col as f64 * 1e-3).unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    c.set_status(ContainerStatus::Finished).unwrap();
    let stats = c.stats();
    assert_eq!(stats.compressed_chunks, 62);
    assert_eq!(stats.compression_failures, 0);
    assert_eq!(c.get_absolute_min_max_value(0).unwrap(), HiLo::new(0.0, 3999.0));
}

#[test]
fn test_ramp_average_both_paths() {
    let c = DataContainer::new(2, names(2), "time", lossless(64, 8)).unwrap();
    c.define_avg_calculation(&[0]).unwrap();
    fill(&c, 1000, 1e-3, |r, col| if r == 0 { col as f32 * 1e-3 } else { 1.0 });

    let check = |c: &DataContainer| {
        let integral = c.get_avg_value_in_interval(0.1, 0.5, 0).unwrap();
        assert!((integral - 0.3).abs() < 1e-5, "integral path {}", integral);

        let buckets = c.get_average_in_interval(0.1, 0.5, 0).unwrap().unwrap();
        assert!((buckets.mean() - 0.3).abs() < 1e-5, "bucket path {}", buckets.mean());
        assert!((buckets.start() - 0.1).abs() < 1e-12);
        assert!((buckets.stop() - 0.5).abs() < 1e-12);

        let partial = c.get_avg_value_in_interval(0.1005, 0.2345, 0).unwrap();
        assert!((partial - 0.1675).abs() < 1e-5, "off-grid window {}", partial);
    };
    check(&c);
    c.set_status(ContainerStatus::Paused).unwrap();
    check(&c);

    // Registering later back-fills the integral.
    c.define_avg_calculation(&[1]).unwrap();
    let flat = c.get_avg_value_in_interval(0.0, 0.999, 1).unwrap();
    assert!((flat - 1.0).abs() < 1e-9);
    let whole = c.get_avg_value_in_interval(-5.0, 5.0, 0).unwrap();
    assert!((whole - 0.4995).abs() < 1e-5);
}

#[test]
fn test_step_change_lookup() {
    let c = DataContainer::new(1, names(1), "time", lossless(32, 4)).unwrap();
    for i in 0..100 {
        c.insert_values_at_end(&[i as f32], i as f64 * 0.01).unwrap();
    }
    for i in 1..=50 {
        c.insert_values_at_end(&[(100 + i) as f32], 0.99 + i as f64 * 0.02).unwrap();
    }

    assert_eq!(c.len(), 150);
    assert_eq!(c.stats().time_segments, 2);
    assert_eq!(c.find_time_index(0.50), 50);
    assert_eq!(c.find_time_index(1.02), 100);
    assert_eq!(c.find_time_index(1.03), 101);
    assert_eq!(c.find_time_index(100.0), 149);
    assert!((c.get_time_value(149).unwrap() - 1.99).abs() < 1e-9);
    assert_eq!(
        c.get_data_value_in_interval(1.015, 1.035, 0).unwrap(),
        Some(IntervalValue::Single(101.0))
    );
}

#[test]
fn test_empty_row_and_invalid_numbers() {
    let c = DataContainer::new(2, names(2), "time", lossless(16, 4)).unwrap();
    fill(&c, 40, 1.0, |r, col| if r == 0 { col as f32 } else { f32::NAN });

    assert!(c.is_invalid_numbers(1));
    assert!(!c.is_invalid_numbers(0));
    assert!(matches!(
        c.get_absolute_min_max_value(1),
        Err(TraceError::EmptyRange(_))
    ));
    assert_eq!(c.get_hi_lo_value(1, 0, 39).unwrap(), HiLo::EMPTY);
    assert_eq!(c.get_absolute_min_max_value(0).unwrap(), HiLo::new(0.0, 39.0));

    c.set_status(ContainerStatus::Finished).unwrap();
    assert!(matches!(
        c.get_absolute_min_max_value(1),
        Err(TraceError::EmptyRange(_))
    ));
}

#[test]
fn test_non_monotonic_append_is_rejected() {
    let c = DataContainer::new(1, names(1), "time", lossless(16, 4)).unwrap();
    fill(&c, 20, 1.0, |_, col| col as f32);
    let err = c.insert_values_at_end(&[0.0], 5.0).unwrap_err();
    assert!(matches!(err, TraceError::NonMonotonicTime { previous, given } if previous == 19.0 && given == 5.0));
    assert_eq!(c.len(), 20);
    assert_eq!(c.insert_values_at_end(&[1.0], 20.0).unwrap(), 20);
}

#[test]
fn test_pause_sweeps_and_resume() {
    let config = lossless(32, 8).with_workers(1, 1);
    let c = DataContainer::new(3, names(3), "time", config).unwrap();
    fill(&c, 330, 0.5, |r, col| (col * (r + 1)) as f32);

    c.set_status(ContainerStatus::Paused).unwrap();
    let stats = c.stats();
    assert_eq!(stats.deferred_chunks, 0);
    assert_eq!(stats.compressed_chunks, 10);
    assert_eq!(stats.hot_chunks, 1);
    assert!(stats.average_compression_ratio > 0.0);
    assert_eq!(c.get_absolute_min_max_value(2).unwrap(), HiLo::new(0.0, 987.0));

    fill(&c, 30, 0.5, |r, col| (col * (r + 1)) as f32);
    c.set_status(ContainerStatus::Running).unwrap();
    fill(&c, 10, 0.5, |r, col| (col * (r + 1)) as f32);
    assert_eq!(c.len(), 370);
    assert_eq!(c.get_absolute_min_max_value(0).unwrap(), HiLo::new(0.0, 369.0));
    assert_eq!(c.get_hi_lo_value(1, 300, 369).unwrap(), HiLo::new(600.0, 738.0));
}

#[test]
fn test_decompressed_cache_eviction() {
    let config = lossless(64, 8).with_cache_bytes(2 * 4 * 64 * 4);
    let c = DataContainer::new(4, names(4), "time", config).unwrap();
    fill(&c, 64 * 6, 1.0, |r, col| (col + r) as f32);
    c.set_status(ContainerStatus::Paused).unwrap();

    for _ in 0..2 {
        for col in (0..64 * 6).step_by(64) {
            assert_eq!(c.get_value(3, col).unwrap(), (col + 3) as f32);
        }
    }
    let stats = c.stats();
    assert!(stats.cache_evictions > 0);
    assert!(stats.cache_misses >= 6);
    assert!(c.cached_ram_bytes() <= 2 * 4 * 64 * 4);

    // An evicted chunk is decompressed again on demand.
    assert_eq!(c.get_value(0, 5).unwrap(), 5.0);
    assert_eq!(c.get_value(0, 5).unwrap(), 5.0);
    assert!(c.stats().cache_hits > 0);
}

#[test]
fn test_lossy_precision_bounds() {
    let config = StoreConfig::default()
        .with_junk_size(32, 4)
        .with_precision(Precision::Coarse);
    let c = DataContainer::new(1, names(1), "time", config).unwrap();
    let signal = |col: usize| 1.0 + (col as f32 * 0.01).cos() * 250.0;
    fill(&c, 128, 1e-3, |_, col| signal(col));
    c.set_status(ContainerStatus::Finished).unwrap();

    let tolerance = (Precision::Coarse.dropped_bits() as f32).exp2() * f32::EPSILON;
    for col in 0..128 {
        let stored = c.get_value(0, col).unwrap();
        let raw = signal(col);
        assert!((stored - raw).abs() <= raw.abs() * tolerance, "column {}", col);
    }

    let exact = naive_hi_lo((0..128).map(|col| c.get_value(0, col).unwrap()));
    assert_eq!(c.get_hi_lo_value(0, 0, 127).unwrap(), exact);
}

#[test]
fn test_absolute_envelope_while_compressing_lossy() {
    let config = StoreConfig::default()
        .with_junk_size(4096, 64)
        .with_precision(Precision::Coarse)
        .with_compression(CompressionType::Zstd, 22)
        .with_workers(1, 1);
    let c = DataContainer::new(1, names(1), "time", config).unwrap();
    let signal = |_: usize, col: usize| 130.1 + (col as f32 * 0.013).sin() * 0.05;
    fill(&c, 3 * 4096 + 100, 1e-4, signal);

    // Queried while full chunks are still queued or being compressed.
    let early = c.get_absolute_min_max_value(0).unwrap();
    assert!(!early.is_empty());

    c.set_status(ContainerStatus::Paused).unwrap();
    let stored = naive_hi_lo((0..c.len()).map(|col| c.get_value(0, col).unwrap()));
    assert_eq!(c.get_absolute_min_max_value(0).unwrap(), stored);
    assert_eq!(c.get_hi_lo_value(0, 0, c.len() - 1).unwrap(), stored);

    fill(&c, 4096, 1e-4, signal);
    c.set_status(ContainerStatus::Paused).unwrap();
    let stored = naive_hi_lo((0..c.len()).map(|col| c.get_value(0, col).unwrap()));
    assert_eq!(c.get_absolute_min_max_value(0).unwrap(), stored);
}

#[test]
fn test_exact_junk_boundary_phases() {
    let c = DataContainer::new(1, names(1), "time", lossless(64, 8).with_workers(1, 1)).unwrap();
    fill(&c, 64, 1.0, |_, col| col as f32);

    let stats = c.stats();
    assert_eq!(stats.total_chunks(), 1);
    assert_eq!(stats.hot_chunks, 0);
    assert_eq!(stats.sealing_chunks + stats.compressed_chunks, 1);

    fill(&c, 1, 1.0, |_, col| col as f32);
    let stats = c.stats();
    assert_eq!(stats.total_chunks(), 2);
    assert_eq!(stats.hot_chunks, 1);
    assert_eq!(stats.sealing_chunks + stats.compressed_chunks, 1);

    assert_eq!(c.get_value(0, 63).unwrap(), 63.0);
    assert_eq!(c.get_value(0, 64).unwrap(), 64.0);
    assert_eq!(c.get_hi_lo_value(0, 60, 64).unwrap(), HiLo::new(60.0, 64.0));
    assert_eq!(c.get_absolute_min_max_value(0).unwrap(), HiLo::new(0.0, 64.0));
}

#[test]
fn test_data_value_across_chunks() {
    let c = DataContainer::new(1, names(1), "time", lossless(16, 4)).unwrap();
    fill(&c, 64, 0.1, |_, col| (col as f32 - 32.0).abs());
    c.set_status(ContainerStatus::Paused).unwrap();

    assert_eq!(
        c.get_data_value_in_interval(1.0, 5.0, 0).unwrap(),
        Some(IntervalValue::Range(HiLo::new(0.0, 21.0)))
    );
    assert_eq!(c.get_data_value_in_interval(10.0, 20.0, 0).unwrap(), None);
}

#[test]
fn test_deleted_container_rejects_everything() {
    let c = DataContainer::new(1, names(1), "time", lossless(16, 4)).unwrap();
    fill(&c, 40, 1.0, |_, col| col as f32);
    c.set_status(ContainerStatus::Deleted).unwrap();

    assert!(c.is_empty());
    assert_eq!(c.stats().total_chunks(), 0);
    assert!(matches!(
        c.insert_values_at_end(&[1.0], 100.0),
        Err(TraceError::InvalidState(_))
    ));
    assert!(c.get_data_value_in_interval(0.0, 10.0, 0).unwrap().is_none());
}
