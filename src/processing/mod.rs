//! Aggregation engine over the in-memory store.
//!
//! The processing layer operates on [`crate::types::DataSet`] snapshots produced by ingestion.
//! Every function here is read-only; several queries may run against the same snapshot at once.
//!
//! Currently implemented:
//!
//! - [`filter()`] / [`filter_by()`]: row filtering by closure or declarative [`Filter`]
//! - [`classify()`]: derive a bucket column (e.g. price segment) before grouping
//! - [`group_by()`]: counts and percentage-of-total per distinct key
//! - [`rank()`]: `RANK()` of grouped counts within partitions
//!
//! ## Example: classify → group
//!
//! ```rust
//! use catalog_analytics::processing::{group_by, Classification, GroupQuery, PriceClassifier};
//! use catalog_analytics::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![Field::new("productDisplayName", DataType::Utf8)]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::Utf8("Shirt 450".to_string())],
//!         vec![Value::Utf8("Watch 4999".to_string())],
//!         vec![Value::Utf8("Cap".to_string())],
//!         vec![Value::Utf8("Tee 299".to_string())],
//!     ],
//! );
//!
//! let query = GroupQuery::new(["segment"]).with_classification(Classification::new(
//!     "productDisplayName",
//!     "segment",
//!     PriceClassifier::default(),
//! ));
//! let out = group_by(&ds, &query).unwrap();
//! assert_eq!(out[0].label(), "Budget");
//! assert_eq!(out[0].percentage, 50.0);
//! ```

pub mod classify;
pub mod filter;
pub mod group;
pub mod rank;

pub use classify::{classify, first_number, Classification, Classifier, PriceBand, PriceClassifier};
pub use filter::{filter, filter_by, BoundFilter, Filter, RowPredicate};
pub use group::{group_by, percentage_of, AggregationResult, GroupQuery, ResultOrder};
pub use rank::{rank, RankQuery};
