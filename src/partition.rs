//! Partition planner: a year-bucketed copy of the store.
//!
//! Each record with a non-null bucket value goes to the first range containing it; records with a
//! null value, or outside every range, are left out of the view. Queries filtered on the bucket
//! field can then [`PartitionedView::scan`] only the overlapping buckets and get the same rows the
//! full store would give them.

use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, ProcessingResult};
use crate::types::{DataSet, DataType, Schema, Value};

/// Half-open integer range `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRange {
    pub lo: i64,
    pub hi: i64,
}

impl BucketRange {
    pub fn new(lo: i64, hi: i64) -> ProcessingResult<Self> {
        if lo >= hi {
            return Err(ProcessingError::InvalidRange { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    pub fn contains(&self, v: i64) -> bool {
        self.lo <= v && v < self.hi
    }

    pub fn overlaps(&self, lo: i64, hi: i64) -> bool {
        self.lo < hi && lo < self.hi
    }

    /// `"2010-2014"` for `[2010, 2015)`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.lo, self.hi - 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Bucket {
    range: BucketRange,
    rows: Vec<Vec<Value>>,
}

/// Row count of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub label: String,
    pub lo: i64,
    pub hi: i64,
    pub rows: usize,
}

/// A store reorganized into range buckets over one integer field.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedView {
    field: String,
    field_idx: usize,
    schema: Schema,
    buckets: Vec<Bucket>,
    excluded: usize,
}

/// Build a [`PartitionedView`] of `dataset` over `bucket_field`.
pub fn build_partitioned_view(
    dataset: &DataSet,
    bucket_field: &str,
    ranges: &[(i64, i64)],
) -> ProcessingResult<PartitionedView> {
    let field_idx = dataset
        .schema
        .index_of(bucket_field)
        .ok_or_else(|| ProcessingError::UnknownColumn(bucket_field.to_owned()))?;
    if dataset.schema.fields[field_idx].data_type != DataType::Int64 {
        return Err(ProcessingError::ColumnType {
            column: bucket_field.to_owned(),
            expected: DataType::Int64,
        });
    }

    let mut buckets = ranges
        .iter()
        .map(|&(lo, hi)| {
            BucketRange::new(lo, hi).map(|range| Bucket {
                range,
                rows: Vec::new(),
            })
        })
        .collect::<ProcessingResult<Vec<_>>>()?;

    let mut excluded = 0;
    for row in &dataset.rows {
        let target = row[field_idx]
            .as_i64()
            .and_then(|v| buckets.iter_mut().find(|b| b.range.contains(v)));
        match target {
            Some(bucket) => bucket.rows.push(row.clone()),
            None => excluded += 1,
        }
    }

    tracing::debug!(
        field = bucket_field,
        buckets = buckets.len(),
        excluded,
        "built partitioned view"
    );

    Ok(PartitionedView {
        field: bucket_field.to_owned(),
        field_idx,
        schema: dataset.schema.clone(),
        buckets,
        excluded,
    })
}

impl PartitionedView {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Records left out (null bucket value or outside every range).
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    /// Records in the view.
    pub fn row_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.len()).sum()
    }

    pub fn bucket_summaries(&self) -> Vec<BucketSummary> {
        self.buckets
            .iter()
            .map(|b| BucketSummary {
                label: b.range.label(),
                lo: b.range.lo,
                hi: b.range.hi,
                rows: b.rows.len(),
            })
            .collect()
    }

    /// Every record in the view, bucket by bucket.
    pub fn to_dataset(&self) -> DataSet {
        let rows = self.buckets.iter().flat_map(|b| b.rows.iter().cloned()).collect();
        DataSet::new(self.schema.clone(), rows)
    }

    /// Number of buckets a scan of `[lo, hi)` touches.
    pub fn buckets_scanned(&self, lo: i64, hi: i64) -> usize {
        self.buckets.iter().filter(|b| b.range.overlaps(lo, hi)).count()
    }

    /// Records with bucket value in `[lo, hi)`, reading only overlapping buckets.
    pub fn scan(&self, lo: i64, hi: i64) -> DataSet {
        let idx = self.field_idx;
        let rows = self
            .buckets
            .iter()
            .filter(|b| b.range.overlaps(lo, hi))
            .flat_map(|b| b.rows.iter())
            .filter(|row| row[idx].as_i64().is_some_and(|v| lo <= v && v < hi))
            .cloned()
            .collect();
        DataSet::new(self.schema.clone(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::{build_partitioned_view, BucketRange};
    use crate::error::ProcessingError;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn years(values: &[Option<i64>]) -> DataSet {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::nullable("year", DataType::Int64),
        ]);
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, y)| vec![Value::Int64(i as i64), y.map_or(Value::Null, Value::Int64)])
            .collect();
        DataSet::new(schema, rows)
    }

    #[test]
    fn every_in_range_record_lands_in_exactly_one_bucket() {
        let ds = years(&[Some(2009), Some(2012), Some(2015), None, Some(2030)]);
        let view = build_partitioned_view(&ds, "year", &[(2005, 2013), (2010, 2020)]).unwrap();

        let summaries = view.bucket_summaries();
        // 2012 matches both ranges but only the first one takes it.
        assert_eq!(summaries[0].rows, 2);
        assert_eq!(summaries[1].rows, 1);
        assert_eq!(summaries[0].label, "2005-2012");
        assert_eq!(view.excluded(), 2);
        assert_eq!(view.row_count() + view.excluded(), ds.row_count());
    }

    #[test]
    fn scan_prunes_buckets_and_filters_rows() {
        let ds = years(&[Some(2010), Some(2011), Some(2016), Some(2018)]);
        let view = build_partitioned_view(&ds, "year", &[(2010, 2015), (2015, 2020)]).unwrap();

        assert_eq!(view.buckets_scanned(2016, 2017), 1);
        let out = view.scan(2016, 2017);
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0][1], Value::Int64(2016));
    }

    #[test]
    fn invalid_ranges_and_columns_are_rejected() {
        let ds = years(&[Some(2010)]);
        assert_eq!(
            build_partitioned_view(&ds, "year", &[(2015, 2010)]).unwrap_err(),
            ProcessingError::InvalidRange { lo: 2015, hi: 2010 }
        );
        assert!(matches!(
            build_partitioned_view(&ds, "season", &[(2010, 2015)]),
            Err(ProcessingError::UnknownColumn(_))
        ));
        assert!(BucketRange::new(1, 1).is_err());
    }
}
