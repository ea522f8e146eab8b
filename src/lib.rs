//! # viewdb
//!
//! An embedded, single-writer record store for viewing records with:
//! - Columnar segment files (Apache Parquet) written append-then-finish
//! - A durable key index (checksummed log + snapshot) mapping each record's
//!   derived key to its row
//! - Copy-on-write rewrites for upsert and delete
//! - Crash recovery that reconciles segment files with the index
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CLI (query / import / get / delete)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │     put / get / delete / query / write_out (&mut self)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────┐
//!   │  KeyIndex   │          │     Segment      │
//!   │ log+snapshot│          │ data_store /     │
//!   │ key → row   │          │ swap_store       │
//!   └─────────────┘          └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod query;
pub mod index;
pub mod segment;
pub mod engine;
pub mod importer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{Config, IndexSyncStrategy};
pub use engine::{ConsistencyReport, Engine};
pub use importer::{ImportSummary, Importer};
pub use index::KeyIndex;
pub use query::Query;
pub use record::{Column, FieldValue, Record};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of viewdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
