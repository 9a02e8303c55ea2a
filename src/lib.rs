//! `catalog-analytics` is a small library for loading a product-catalog export into an in-memory
//! [`types::DataSet`] and answering grouped-count questions about it.
//!
//! The primary entrypoint is [`ingestion::CatalogStore::load`], which validates each row against a
//! [`schema::SchemaRegistry`] and swaps in a new immutable snapshot only when the whole source was
//! read within the bad-record budget.
//!
//! ## What a load accepts
//!
//! - A single delimited file, a glob pattern, or a directory of `.csv` files ([`ingestion::LoadSource`])
//! - A mandatory header row; columns may be reordered and extra columns are ignored
//! - Empty cells become [`types::Value::Null`], and are rejected for non-nullable columns
//!
//! Rows that fail validation are skipped and counted. When more than
//! [`ingestion::LoadOptions::max_bad_records`] rows are skipped the load fails with
//! [`IngestionError::LoadAborted`] and the store keeps its previous contents.
//!
//! ```no_run
//! use catalog_analytics::ingestion::{CatalogStore, LoadOptions, LoadSource};
//! use catalog_analytics::processing::{group_by, GroupQuery};
//! use catalog_analytics::report::{render, OutputFormat, ReportKind};
//! use catalog_analytics::schema::SchemaRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = CatalogStore::new(SchemaRegistry::products());
//! let report = store.load(&LoadSource::infer("data/*.csv"), &LoadOptions::default())?;
//! println!("loaded={} skipped={}", report.records_loaded, report.records_skipped);
//!
//! let by_category = group_by(store.dataset(), &GroupQuery::new(["masterCategory"]))?;
//! print!("{}", render(&by_category, ReportKind::Distribution, OutputFormat::Text)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: the catalog store, CSV reading and load observers
//! - [`schema`]: column specs and per-row validation
//! - [`types`]: schema + in-memory dataset types
//! - [`processing`]: filters, classification, `group_by` and `rank`
//! - [`partition`]: year-bucketed views with range pruning
//! - [`report`]: text / JSON / CSV rendering of result sets
//! - [`analysis`]: the standard catalog analyses
//! - [`execution`]: parallel counting and analysis batches
//! - [`config`]: layered pipeline configuration
//! - [`error`]: error types used across the crate
//!
//! ### Percentages and ranks
//!
//! Percentages are `100 * count / population`, rounded half-up to two decimals in integer
//! arithmetic. Ranks follow SQL `RANK()`: tied counts share a rank and the next rank skips.

pub mod analysis;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod partition;
pub mod processing;
pub mod report;
pub mod schema;
pub mod types;

pub use error::{
    ConfigError, IngestionError, IngestionResult, ProcessingError, ProcessingResult, ReportError, SchemaError,
};
