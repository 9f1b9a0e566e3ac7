//! Tracestore CLI - Command Line Interface
//!
//! Drives a data container with synthetic simulation output and reports
//! ingestion throughput, compression, memory use and query latency. Also
//! prints and checks store configuration files.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracestore_common::utils::{format_size, parse_size};
use tracestore_common::{CompressionType, Precision, Result, StoreConfig, TraceError};
use tracestore_timeseries::{ContainerStatus, DataContainer};
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "tracestore")]
#[command(author = "Tracestore Development Team")]
#[command(version = "0.1.0")]
#[command(about = "Simulation result store toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a store with synthetic signals and report statistics
    Simulate {
        /// Store configuration file
        #[arg(short, long)]
        config: Option<String>,
        /// Number of signals
        #[arg(short, long, default_value_t = 64)]
        rows: usize,
        /// Number of time steps
        #[arg(short = 'n', long, default_value_t = 100_000)]
        steps: usize,
        /// Simulation step size in seconds
        #[arg(long, default_value_t = 1e-4)]
        dt: f64,
        /// Precision level, 0 (lossless) to 3 (coarse)
        #[arg(short, long)]
        precision: Option<usize>,
        /// Backend: none, lz4, zstd or snappy
        #[arg(long)]
        compression: Option<String>,
        /// Decompressed cache size, e.g. "64MB"
        #[arg(long)]
        cache: Option<String>,
    },
    /// Print the default configuration as TOML
    DefaultConfig {
        /// Print the low-memory profile instead
        #[arg(long)]
        low_memory: bool,
    },
    /// Validate a configuration file
    CheckConfig { path: String },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Simulate {
            config,
            rows,
            steps,
            dt,
            precision,
            compression,
            cache,
        } => build_config(config, precision, compression, cache)
            .and_then(|config| simulate(config, rows, steps, dt)),
        Commands::DefaultConfig { low_memory } => {
            let config = if low_memory {
                StoreConfig::low_memory()
            } else {
                StoreConfig::default()
            };
            config.to_toml().map(|toml| print!("{}", toml))
        }
        Commands::CheckConfig { path } => StoreConfig::from_file(&path).map(|config| {
            println!("{} is valid", path);
            println!(
                "  chunk: {} columns, {} buckets",
                config.junk_size, config.value_cache_size
            );
            println!(
                "  storage: {:?} precision, {:?} compression",
                config.precision, config.compression
            );
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn build_config(
    path: Option<String>,
    precision: Option<usize>,
    compression: Option<String>,
    cache: Option<String>,
) -> Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(level) = precision {
        config.precision = Precision::from_level(level).ok_or_else(|| {
            TraceError::Configuration(format!("precision level {} outside 0..=3", level))
        })?;
    }
    if let Some(name) = compression {
        config.compression = match name.to_lowercase().as_str() {
            "none" => CompressionType::None,
            "lz4" => CompressionType::Lz4,
            "zstd" => CompressionType::Zstd,
            "snappy" => CompressionType::Snappy,
            other => {
                return Err(TraceError::Configuration(format!(
                    "unknown compression backend {}",
                    other
                )))
            }
        };
    }
    if let Some(size) = cache {
        let bytes = parse_size(&size)
            .ok_or_else(|| TraceError::Configuration(format!("invalid cache size {}", size)))?;
        config.decompressed_cache_bytes = bytes as usize;
    }
    config.validate()?;
    Ok(config)
}

/// Damped oscillators with distinct frequencies, one per row.
fn sample(row: usize, time: f64) -> f32 {
    let freq = 5.0 + row as f64 * 1.5;
    let damping = (-0.2 * time).exp();
    (damping * (std::f64::consts::TAU * freq * time).sin() * (row + 1) as f64) as f32
}

fn simulate(config: StoreConfig, rows: usize, steps: usize, dt: f64) -> Result<()> {
    let names = (0..rows).map(|r| format!("osc{}.x", r)).collect();
    let store = DataContainer::new(rows, names, "time", config)?;
    store.define_avg_calculation(&[0])?;

    tracing::info!(rows, steps, dt, "starting synthetic run");
    let mut column = vec![0.0f32; rows];
    let started = Instant::now();
    for step in 0..steps {
        let time = step as f64 * dt;
        for (row, value) in column.iter_mut().enumerate() {
            *value = sample(row, time);
        }
        store.insert_values_at_end(&column, time)?;
    }
    let ingest = started.elapsed();

    let finished = Instant::now();
    store.set_status(ContainerStatus::Finished)?;
    let drain = finished.elapsed();

    let end = store
        .max_time_index()
        .map(|i| store.get_time_value(i))
        .transpose()?
        .unwrap_or(0.0);

    let query = Instant::now();
    let envelope = store.get_absolute_min_max_value(rows - 1)?;
    let window = store.get_hi_lo_value(0, 0, store.len().saturating_sub(1))?;
    let average = if store.len() > 1 {
        Some(store.get_avg_value_in_interval(0.0, end, 0)?)
    } else {
        None
    };
    let query_time = query.elapsed();

    let stats = store.stats();
    let samples = (rows * steps) as f64;
    println!("Ingested {} columns x {} rows in {:?}", steps, rows, ingest);
    println!("  throughput:        {:.0} samples/s", samples / secs(ingest));
    println!("  drain on finish:   {:?}", drain);
    println!(
        "  chunks:            {} compressed, {} hot, {} failed",
        stats.compressed_chunks, stats.hot_chunks, stats.compression_failures
    );
    println!("  compression ratio: {:.2}", stats.average_compression_ratio);
    println!("  compression time:  {:?}", stats.total_compression_time);
    println!(
        "  stored:            {} ({} compressed, {} hot)",
        format_size(store.used_ram_bytes() as u64),
        format_size(stats.compressed_bytes as u64),
        format_size(stats.hot_bytes as u64)
    );
    println!("  decompressed:      {}", format_size(stats.cached_bytes as u64));
    println!("  time segments:     {}", stats.time_segments);
    println!("  pool hit ratio:    {:.2}", stats.pools.hit_ratio());
    println!("Queries in {:?}", query_time);
    println!("  {} envelope:  {}", store.signal_name(rows - 1)?, envelope);
    println!("  {} envelope:  {}", store.signal_name(0)?, window);
    if let Some(avg) = average {
        println!("  {} average:   {:.6}", store.signal_name(0)?, avg);
    }
    Ok(())
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64().max(1e-9)
}
