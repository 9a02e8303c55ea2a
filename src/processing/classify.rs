//! Classification of a column into labelled buckets, applied before grouping.
//!
//! The price segmenter extracts the first numeric token from free text (e.g. a product display
//! name such as `"Shirt 450"`) and maps it onto threshold bands. Text without a number lands in the
//! "Unknown" bucket; classification never fails.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, ProcessingResult};
use crate::types::{DataSet, DataType, Field, Value};

static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("numeric token pattern is valid"));

/// Maps one value to a bucket label.
pub trait Classifier: Send + Sync {
    fn classify(&self, value: &Value) -> String;
}

/// One price band: values strictly below `below` get `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub below: f64,
    pub label: String,
}

impl PriceBand {
    pub fn new(below: f64, label: impl Into<String>) -> Self {
        Self {
            below,
            label: label.into(),
        }
    }
}

/// Threshold classifier over the first number found in a value.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceClassifier {
    bands: Vec<PriceBand>,
    top_label: String,
    unknown_label: String,
}

impl PriceClassifier {
    /// Bands are checked in ascending `below` order; numbers above every band get `top_label`.
    pub fn new(mut bands: Vec<PriceBand>, top_label: impl Into<String>) -> Self {
        bands.sort_by(|a, b| a.below.total_cmp(&b.below));
        Self {
            bands,
            top_label: top_label.into(),
            unknown_label: "Unknown".to_string(),
        }
    }

    pub fn with_unknown_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_label = label.into();
        self
    }

    /// Label for a raw number.
    pub fn bucket(&self, amount: f64) -> &str {
        self.bands
            .iter()
            .find(|band| amount < band.below)
            .map_or(self.top_label.as_str(), |band| band.label.as_str())
    }
}

impl Default for PriceClassifier {
    fn default() -> Self {
        Self::new(
            vec![PriceBand::new(500.0, "Budget"), PriceBand::new(2000.0, "Mid-Range")],
            "Premium",
        )
    }
}

impl Classifier for PriceClassifier {
    fn classify(&self, value: &Value) -> String {
        let amount = match value {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Utf8(text) => first_number(text),
            Value::Null | Value::Bool(_) => None,
        };
        match amount {
            Some(n) => self.bucket(n).to_owned(),
            None => self.unknown_label.clone(),
        }
    }
}

/// First integer or decimal token in `text`.
pub fn first_number(text: &str) -> Option<f64> {
    NUMERIC_TOKEN
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Derive `target` from `source` with a classifier.
#[derive(Clone)]
pub struct Classification {
    pub source: String,
    pub target: String,
    pub classifier: Arc<dyn Classifier>,
}

impl Classification {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        classifier: impl Classifier + 'static,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            classifier: Arc::new(classifier),
        }
    }
}

impl fmt::Debug for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classification")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Returns `dataset` with the classification appended as a non-nullable Utf8 column.
///
/// The target must be a new column name; an existing one would keep shadowing the derived values.
pub fn classify(dataset: &DataSet, classification: &Classification) -> ProcessingResult<DataSet> {
    if dataset.schema.index_of(&classification.target).is_some() {
        return Err(ProcessingError::DuplicateColumn(classification.target.clone()));
    }
    let idx = dataset
        .schema
        .index_of(&classification.source)
        .ok_or_else(|| ProcessingError::UnknownColumn(classification.source.clone()))?;

    let classifier = &classification.classifier;
    Ok(dataset.with_derived_column(
        Field::new(classification.target.clone(), DataType::Utf8),
        |row| Value::Utf8(classifier.classify(&row[idx])),
    ))
}
