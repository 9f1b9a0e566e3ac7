//! Tracestore Common - Shared Types and Utilities
//!
//! Foundational types, error handling, and utilities used by every tracestore
//! crate. Provides the error taxonomy reported by the storage engine, the
//! engine configuration, and the small enumerations shared between the
//! codec, the chunk layer and the column store.
//!
//! Key Features:
//! - Unified error type with resource/user error classification
//! - Store configuration loadable from TOML with validation
//! - Precision levels and compression backends for the block codec
//! - Checksum and size formatting helpers
//!
//! @version 0.1.0
//! @author Tracestore Development Team

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::StoreConfig;
pub use error::{Result, TraceError};
pub use types::*;
