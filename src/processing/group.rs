//! Grouped counts with percentage-of-total.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::error::{ProcessingError, ProcessingResult};
use crate::types::{compare_keys, DataSet, HashKey, Schema, Value};

use super::classify::{classify, Classification};
use super::filter::{BoundFilter, Filter};

/// One row of an aggregation result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    /// One value per grouped field (partition values first for rankings).
    pub key: Vec<Value>,
    /// Records in the group.
    pub count: u64,
    /// `100 * count / population`, rounded half-up to 2 decimals.
    pub percentage: f64,
    /// Rank within the partition (rankings only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl AggregationResult {
    /// Key parts joined with `" / "`; `"(all)"` for the ungrouped total.
    pub fn label(&self) -> String {
        if self.key.is_empty() {
            return "(all)".to_string();
        }
        self.key
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Result ordering for [`group_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrder {
    /// Count descending, ties by key ascending.
    #[default]
    CountDesc,
    /// Key ascending (time series).
    KeyAsc,
}

/// A grouped-count query.
#[derive(Debug, Clone, Default)]
pub struct GroupQuery {
    /// Fields to group by; empty means one group holding the whole population.
    pub fields: Vec<String>,
    /// Only records matching this filter are counted.
    pub filter: Option<Filter>,
    /// Derived column computed before grouping; `fields` may reference its target.
    pub classification: Option<Classification>,
    /// Drop records with a null in any grouped field from the population.
    pub exclude_nulls: bool,
    pub order: ResultOrder,
}

impl GroupQuery {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn excluding_nulls(mut self) -> Self {
        self.exclude_nulls = true;
        self
    }

    pub fn ordered_by(mut self, order: ResultOrder) -> Self {
        self.order = order;
        self
    }
}

/// Count records per distinct combination of `query.fields`.
///
/// Percentages are relative to the number of records that passed the filter (and, with
/// `exclude_nulls`, had no null in a grouped field). An empty population yields an empty result.
pub fn group_by(dataset: &DataSet, query: &GroupQuery) -> ProcessingResult<Vec<AggregationResult>> {
    let plan = GroupPlan::prepare(dataset, query.classification.as_ref(), &query.fields, query.filter.as_ref())?;
    let counts = plan.count(&plan.dataset.rows, query.exclude_nulls);
    Ok(counts.finalize(query.order))
}

/// A query resolved against a concrete dataset (classification applied, names bound).
pub(crate) struct GroupPlan<'a> {
    pub(crate) dataset: Cow<'a, DataSet>,
    key_idxs: Vec<usize>,
    filter: Option<BoundFilter>,
}

impl<'a> GroupPlan<'a> {
    pub(crate) fn prepare(
        dataset: &'a DataSet,
        classification: Option<&Classification>,
        fields: &[String],
        filter: Option<&Filter>,
    ) -> ProcessingResult<Self> {
        let dataset = match classification {
            Some(c) => Cow::Owned(classify(dataset, c)?),
            None => Cow::Borrowed(dataset),
        };
        let key_idxs = resolve_fields(&dataset.schema, fields)?;
        let filter = filter.map(|f| f.bind(&dataset.schema)).transpose()?;
        Ok(Self {
            dataset,
            key_idxs,
            filter,
        })
    }

    /// Count a slice of rows; slices may be counted independently and merged.
    pub(crate) fn count(&self, rows: &[Vec<Value>], exclude_nulls: bool) -> GroupCounts {
        let mut counts = GroupCounts::default();
        for row in rows {
            if let Some(f) = &self.filter {
                if !f.matches(row) {
                    continue;
                }
            }
            let key: Vec<&Value> = self.key_idxs.iter().map(|&i| &row[i]).collect();
            if exclude_nulls && key.iter().any(|v| v.is_null()) {
                continue;
            }
            counts.add(key.into_iter().map(HashKey::of).collect(), 1);
        }
        counts
    }
}

pub(crate) fn resolve_fields(schema: &Schema, fields: &[String]) -> ProcessingResult<Vec<usize>> {
    fields
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .ok_or_else(|| ProcessingError::UnknownColumn(name.clone()))
        })
        .collect()
}

/// Partial per-key counts.
#[derive(Debug, Default)]
pub(crate) struct GroupCounts {
    pub(crate) counts: HashMap<Vec<HashKey>, u64>,
    pub(crate) total: u64,
}

impl GroupCounts {
    fn add(&mut self, key: Vec<HashKey>, n: u64) {
        *self.counts.entry(key).or_insert(0) += n;
        self.total += n;
    }

    pub(crate) fn merge(mut self, other: GroupCounts) -> GroupCounts {
        for (key, n) in other.counts {
            self.add(key, n);
        }
        self
    }

    pub(crate) fn finalize(self, order: ResultOrder) -> Vec<AggregationResult> {
        let total = self.total;
        let mut out: Vec<AggregationResult> = self
            .counts
            .into_iter()
            .map(|(key, count)| AggregationResult {
                key: key.into_iter().map(HashKey::into_value).collect(),
                count,
                percentage: percentage_of(count, total),
                rank: None,
            })
            .collect();
        sort_results(&mut out, order);
        out
    }
}

pub(crate) fn sort_results(results: &mut [AggregationResult], order: ResultOrder) {
    match order {
        ResultOrder::CountDesc => results.sort_by(by_count_desc_then_key),
        ResultOrder::KeyAsc => results.sort_by(|a, b| compare_keys(&a.key, &b.key)),
    }
}

pub(crate) fn by_count_desc_then_key(a: &AggregationResult, b: &AggregationResult) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| compare_keys(&a.key, &b.key))
}

/// `100 * count / total` rounded half-up to 2 decimals, computed in integer arithmetic.
pub fn percentage_of(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scaled = u128::from(count) * 10_000;
    let total = u128::from(total);
    let hundredths = (2 * scaled + total) / (2 * total);
    hundredths as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::{group_by, percentage_of, GroupQuery, ResultOrder};
    use crate::error::ProcessingError;
    use crate::processing::classify::{Classification, PriceClassifier};
    use crate::processing::filter::Filter;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn utf8(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn catalog() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("cat", DataType::Utf8),
            Field::nullable("season", DataType::Utf8),
            Field::nullable("year", DataType::Int64),
            Field::new("name", DataType::Utf8),
        ]);
        DataSet::new(
            schema,
            vec![
                vec![utf8("Apparel"), utf8("Summer"), Value::Int64(2012), utf8("Shirt 450")],
                vec![utf8("Apparel"), Value::Null, Value::Int64(2011), utf8("Tee 799")],
                vec![utf8("Apparel"), utf8("Fall"), Value::Null, utf8("Jacket 2999")],
                vec![utf8("Footwear"), utf8("Summer"), Value::Int64(2012), utf8("Sandal")],
            ],
        )
    }

    #[test]
    fn group_by_single_field_counts_and_percentages() {
        let out = group_by(&catalog(), &GroupQuery::new(["cat"])).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key, vec![utf8("Apparel")]);
        assert_eq!(out[0].count, 3);
        assert_eq!(out[0].percentage, 75.0);
        assert_eq!(out[1].key, vec![utf8("Footwear")]);
        assert_eq!(out[1].count, 1);
        assert_eq!(out[1].percentage, 25.0);
    }

    #[test]
    fn null_groups_can_be_excluded_from_population() {
        let with_nulls = group_by(&catalog(), &GroupQuery::new(["season"])).unwrap();
        assert_eq!(with_nulls.len(), 3);
        assert!(with_nulls.iter().any(|r| r.key == vec![Value::Null]));

        let without = group_by(&catalog(), &GroupQuery::new(["season"]).excluding_nulls()).unwrap();
        assert_eq!(without.len(), 2);
        assert_eq!(without[0].key, vec![utf8("Summer")]);
        assert_eq!(without[0].percentage, 66.67);
        assert_eq!(without[1].percentage, 33.33);
    }

    #[test]
    fn ties_break_by_key_ascending() {
        let out = group_by(&catalog(), &GroupQuery::new(["cat", "season"])).unwrap();
        let labels: Vec<String> = out.iter().map(|r| r.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Apparel / (null)",
                "Apparel / Fall",
                "Apparel / Summer",
                "Footwear / Summer"
            ]
        );
    }

    #[test]
    fn key_order_for_time_series() {
        let q = GroupQuery::new(["year"]).excluding_nulls().ordered_by(ResultOrder::KeyAsc);
        let out = group_by(&catalog(), &q).unwrap();
        let years: Vec<Value> = out.iter().map(|r| r.key[0].clone()).collect();
        assert_eq!(years, vec![Value::Int64(2011), Value::Int64(2012)]);
    }

    #[test]
    fn filter_restricts_population() {
        let q = GroupQuery::new(["season"]).with_filter(Filter::eq("cat", utf8("Apparel")));
        let out = group_by(&catalog(), &q).unwrap();
        assert_eq!(out.iter().map(|r| r.count).sum::<u64>(), 3);
        assert!(out.iter().all(|r| r.percentage == 33.33));
    }

    #[test]
    fn no_fields_yields_single_total() {
        let out = group_by(&catalog(), &GroupQuery::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].count, 4);
        assert_eq!(out[0].percentage, 100.0);
        assert_eq!(out[0].label(), "(all)");
    }

    #[test]
    fn zero_matches_is_empty_not_error() {
        let q = GroupQuery::new(["cat"]).with_filter(Filter::eq("cat", utf8("Home")));
        assert!(group_by(&catalog(), &q).unwrap().is_empty());
    }

    #[test]
    fn classification_feeds_grouping() {
        let q = GroupQuery::new(["segment"]).with_classification(Classification::new(
            "name",
            "segment",
            PriceClassifier::default(),
        ));
        let out = group_by(&catalog(), &q).unwrap();
        let labels: Vec<String> = out.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["Budget", "Mid-Range", "Premium", "Unknown"]);
    }

    #[test]
    fn classification_cannot_shadow_existing_column() {
        // Grouping on "season" must not silently fall back to the stored column.
        let q = GroupQuery::new(["season"]).with_classification(Classification::new(
            "name",
            "season",
            PriceClassifier::default(),
        ));
        let err = group_by(&catalog(), &q).unwrap_err();
        assert_eq!(err, ProcessingError::DuplicateColumn("season".to_string()));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let err = group_by(&catalog(), &GroupQuery::new(["colour"])).unwrap_err();
        assert_eq!(err, ProcessingError::UnknownColumn("colour".to_string()));
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage_of(1, 3), 33.33);
        assert_eq!(percentage_of(2, 3), 66.67);
        // 1/8 = 12.5% exactly; 1/16 = 6.25%; 1/32 = 3.125% -> 3.13
        assert_eq!(percentage_of(1, 32), 3.13);
        assert_eq!(percentage_of(0, 0), 0.0);
    }
}
