//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`CatalogStore::load`] (from [`loader`]) which:
//!
//! - resolves a file, glob pattern or directory into an ordered list of delimited files
//! - validates each row against the store's [`crate::schema::SchemaRegistry`], skipping bad rows up
//!   to [`LoadOptions::max_bad_records`]
//! - atomically replaces (or appends to) the store snapshot and returns exact loaded/skipped counts
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Reader-level functions are available under [`csv`].

pub mod csv;
pub mod loader;
pub mod observability;

pub use self::csv::RejectedRow;
pub use loader::{CatalogStore, LoadMode, LoadOptions, LoadReport, LoadSource};
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    TracingObserver,
};
