#![forbid(unsafe_code)]

//! Core persistence and aggregation engine for the Lightweight exercise log.
//!
//! This crate provides:
//! - Entity model (exercises, results, per-discipline measurements)
//! - Transactional store with cascade delete
//! - Query layer (name search, composite result ordering)
//! - Best-result aggregation
//! - Unit conversion and display formatting
//! - JSON/CSV export and JSON import

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod units;
pub mod store;
pub mod query;
pub mod aggregate;
pub mod export;
pub mod seed;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use units::WeightUnit;
pub use store::{JsonFileBackend, MemoryBackend, Store, StoreBackend, Transaction};
pub use query::FetchDescriptor;
pub use aggregate::{best_result, format_best_result};
pub use export::ExportFormat;
pub use seed::{Seed, StarterSeed};
