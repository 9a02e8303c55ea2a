//! Row filtering for [`crate::types::DataSet`].
//!
//! Two flavours are offered: [`filter()`] takes any row closure (like `Iterator::filter`), while
//! [`Filter`] is a declarative predicate over named columns that aggregation queries carry around
//! and bind against a schema once per run.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{ProcessingError, ProcessingResult};
use crate::types::{DataSet, Schema, Value};

/// Returns a new [`DataSet`] containing only rows for which `predicate` returns `true`.
///
/// This is a convenience wrapper around [`DataSet::filter_rows`].
pub fn filter<F>(dataset: &DataSet, predicate: F) -> DataSet
where
    F: FnMut(&[Value]) -> bool,
{
    dataset.filter_rows(predicate)
}

/// Returns a new [`DataSet`] containing only rows matching `predicate`.
pub fn filter_by(dataset: &DataSet, predicate: &Filter) -> ProcessingResult<DataSet> {
    let bound = predicate.bind(&dataset.schema)?;
    Ok(dataset.filter_rows(|row| bound.matches(row)))
}

/// A row closure usable from several threads.
pub type RowPredicate = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// Declarative row predicate over named columns.
#[derive(Clone)]
pub enum Filter {
    /// Column equals value.
    Eq { field: String, value: Value },
    /// Column equals one of the values.
    In { field: String, values: Vec<Value> },
    /// Integer column within the half-open range `[lo, hi)`.
    Range { field: String, lo: i64, hi: i64 },
    /// Column is not null.
    NotNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Arbitrary closure over the whole row (schema order).
    Custom(RowPredicate),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::Eq {
            field: field.into(),
            value,
        }
    }

    pub fn range(field: impl Into<String>, lo: i64, hi: i64) -> Self {
        Self::Range {
            field: field.into(),
            lo,
            hi,
        }
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self::NotNull(field.into())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// Resolve column names against `schema`.
    pub fn bind(&self, schema: &Schema) -> ProcessingResult<BoundFilter> {
        let idx = |name: &str| {
            schema
                .index_of(name)
                .ok_or_else(|| ProcessingError::UnknownColumn(name.to_owned()))
        };

        Ok(match self {
            Filter::Eq { field, value } => BoundFilter::Eq(idx(field)?, value.clone()),
            Filter::In { field, values } => BoundFilter::In(idx(field)?, values.clone()),
            Filter::Range { field, lo, hi } => BoundFilter::Range(idx(field)?, *lo, *hi),
            Filter::NotNull(field) => BoundFilter::NotNull(idx(field)?),
            Filter::And(parts) => BoundFilter::And(
                parts
                    .iter()
                    .map(|p| p.bind(schema))
                    .collect::<ProcessingResult<_>>()?,
            ),
            Filter::Or(parts) => BoundFilter::Or(
                parts
                    .iter()
                    .map(|p| p.bind(schema))
                    .collect::<ProcessingResult<_>>()?,
            ),
            Filter::Not(inner) => BoundFilter::Not(Box::new(inner.bind(schema)?)),
            Filter::Custom(f) => BoundFilter::Custom(Arc::clone(f)),
        })
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { field, value } => write!(f, "{field} = {value:?}"),
            Filter::In { field, values } => write!(f, "{field} IN {values:?}"),
            Filter::Range { field, lo, hi } => write!(f, "{field} IN [{lo}, {hi})"),
            Filter::NotNull(field) => write!(f, "{field} IS NOT NULL"),
            Filter::And(parts) => f.debug_tuple("And").field(parts).finish(),
            Filter::Or(parts) => f.debug_tuple("Or").field(parts).finish(),
            Filter::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Filter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A [`Filter`] with column names resolved to row positions.
#[derive(Clone)]
pub enum BoundFilter {
    Eq(usize, Value),
    In(usize, Vec<Value>),
    Range(usize, i64, i64),
    NotNull(usize),
    And(Vec<BoundFilter>),
    Or(Vec<BoundFilter>),
    Not(Box<BoundFilter>),
    Custom(RowPredicate),
}

impl BoundFilter {
    pub fn matches(&self, row: &[Value]) -> bool {
        let same = |a: &Value, b: &Value| a.key_cmp(b) == Ordering::Equal;
        match self {
            BoundFilter::Eq(i, v) => row.get(*i).is_some_and(|x| same(x, v)),
            BoundFilter::In(i, vs) => row.get(*i).is_some_and(|x| vs.iter().any(|v| same(x, v))),
            BoundFilter::Range(i, lo, hi) => row
                .get(*i)
                .and_then(Value::as_i64)
                .is_some_and(|v| *lo <= v && v < *hi),
            BoundFilter::NotNull(i) => row.get(*i).is_some_and(|x| !x.is_null()),
            BoundFilter::And(parts) => parts.iter().all(|p| p.matches(row)),
            BoundFilter::Or(parts) => parts.iter().any(|p| p.matches(row)),
            BoundFilter::Not(inner) => !inner.matches(row),
            BoundFilter::Custom(f) => (**f)(row),
        }
    }
}
