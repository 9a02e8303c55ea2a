//! Ranking of grouped counts within partitions.
//!
//! Ranks follow SQL `RANK()` semantics: ordered by count descending, tied counts share a rank and the
//! next distinct count skips by the size of the tie group (1, 1, 3). Within a tie, rows are listed by
//! key ascending.

use std::collections::BTreeMap;

use crate::error::ProcessingResult;
use crate::types::{compare_keys, DataSet, HashKey, Value};

use super::classify::Classification;
use super::filter::Filter;
use super::group::{by_count_desc_then_key, percentage_of, AggregationResult, GroupCounts, GroupPlan};

/// A ranking query.
#[derive(Debug, Clone, Default)]
pub struct RankQuery {
    /// Fields whose distinct combinations are ranked.
    pub fields: Vec<String>,
    /// Ranks restart for every distinct combination of these fields.
    pub partition_by: Vec<String>,
    pub filter: Option<Filter>,
    pub classification: Option<Classification>,
    /// Drop records with a null in any ranked or partition field.
    pub exclude_nulls: bool,
    /// Keep only rows with `rank <= top`.
    pub top: Option<u32>,
}

impl RankQuery {
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

    pub fn partitioned_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_by = fields.into_iter().map(Into::into).collect();
        self
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

    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    /// Partition fields followed by ranked fields: the grouping key of the underlying count.
    pub(crate) fn key_fields(&self) -> Vec<String> {
        self.partition_by.iter().chain(self.fields.iter()).cloned().collect()
    }
}

/// Rank distinct combinations of `query.fields` by count within each partition.
///
/// Each result's `key` holds the partition values followed by the ranked field values; its
/// `percentage` is relative to the partition total. Partitions are emitted in key order.
pub fn rank(dataset: &DataSet, query: &RankQuery) -> ProcessingResult<Vec<AggregationResult>> {
    let fields = query.key_fields();
    let plan = GroupPlan::prepare(dataset, query.classification.as_ref(), &fields, query.filter.as_ref())?;
    let counts = plan.count(&plan.dataset.rows, query.exclude_nulls);
    Ok(rank_counts(counts, query.partition_by.len(), query.top))
}

pub(crate) fn rank_counts(counts: GroupCounts, partition_len: usize, top: Option<u32>) -> Vec<AggregationResult> {
    let mut partitions: BTreeMap<PartitionKey, Vec<(Vec<Value>, u64)>> = BTreeMap::new();
    for (key, count) in counts.counts {
        let key: Vec<Value> = key.into_iter().map(HashKey::into_value).collect();
        let partition = PartitionKey(key[..partition_len].to_vec());
        partitions.entry(partition).or_default().push((key, count));
    }

    let mut out = Vec::new();
    for (_, members) in partitions {
        let total: u64 = members.iter().map(|(_, c)| c).sum();
        let mut rows: Vec<AggregationResult> = members
            .into_iter()
            .map(|(key, count)| AggregationResult {
                key,
                count,
                percentage: percentage_of(count, total),
                rank: None,
            })
            .collect();
        rows.sort_by(by_count_desc_then_key);
        assign_ranks(&mut rows);
        out.extend(
            rows.into_iter()
                .filter(|r| match (top, r.rank) {
                    (Some(n), Some(rank)) => rank <= n,
                    _ => true,
                }),
        );
    }
    out
}

/// Assign `RANK()` to rows already sorted by count descending.
fn assign_ranks(rows: &mut [AggregationResult]) {
    let mut current = 0u32;
    let mut prev_count = None;
    for (pos, row) in rows.iter_mut().enumerate() {
        if prev_count != Some(row.count) {
            current = pos as u32 + 1;
            prev_count = Some(row.count);
        }
        row.rank = Some(current);
    }
}

/// Partition values ordered with [`compare_keys`].
#[derive(Debug, PartialEq)]
struct PartitionKey(Vec<Value>);

impl Eq for PartitionKey {}

impl PartialOrd for PartitionKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartitionKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        compare_keys(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{rank, RankQuery};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn utf8(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn catalog() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("cat", DataType::Utf8),
            Field::new("article", DataType::Utf8),
        ]);
        let mut rows = Vec::new();
        let mut push = |cat: &str, article: &str, n: usize| {
            for _ in 0..n {
                rows.push(vec![utf8(cat), utf8(article)]);
            }
        };
        push("Apparel", "Tshirts", 4);
        push("Apparel", "Shirts", 2);
        push("Apparel", "Kurtas", 2);
        push("Apparel", "Jeans", 1);
        push("Footwear", "Casual Shoes", 3);
        push("Footwear", "Sandals", 1);
        DataSet::new(schema, rows)
    }

    #[test]
    fn ties_share_rank_and_next_rank_skips() {
        let out = rank(&catalog(), &RankQuery::new(["article"]).partitioned_by(["cat"])).unwrap();

        let apparel: Vec<(String, u32)> = out
            .iter()
            .filter(|r| r.key[0] == utf8("Apparel"))
            .map(|r| (r.key[1].to_string(), r.rank.unwrap()))
            .collect();
        assert_eq!(
            apparel,
            vec![
                ("Tshirts".to_string(), 1),
                ("Kurtas".to_string(), 2),
                ("Shirts".to_string(), 2),
                ("Jeans".to_string(), 4),
            ]
        );
    }

    #[test]
    fn ranks_restart_per_partition_and_percentages_use_partition_total() {
        let out = rank(&catalog(), &RankQuery::new(["article"]).partitioned_by(["cat"])).unwrap();
        let footwear: Vec<_> = out.iter().filter(|r| r.key[0] == utf8("Footwear")).collect();
        assert_eq!(footwear[0].rank, Some(1));
        assert_eq!(footwear[0].percentage, 75.0);
        assert_eq!(footwear[1].rank, Some(2));
        // Partitions come out in key order.
        assert_eq!(out[0].key[0], utf8("Apparel"));
    }

    #[test]
    fn top_keeps_whole_tie_groups() {
        let out = rank(
            &catalog(),
            &RankQuery::new(["article"]).partitioned_by(["cat"]).top(2),
        )
        .unwrap();
        let apparel = out.iter().filter(|r| r.key[0] == utf8("Apparel")).count();
        assert_eq!(apparel, 3);
    }

    #[test]
    fn unpartitioned_rank_is_global() {
        let out = rank(&catalog(), &RankQuery::new(["cat"])).unwrap();
        assert_eq!(out[0].key, vec![utf8("Apparel")]);
        assert_eq!(out[0].rank, Some(1));
        assert_eq!(out[1].rank, Some(2));
    }

    #[test]
    fn ranks_never_increase_as_counts_grow() {
        let out = rank(&catalog(), &RankQuery::new(["article"])).unwrap();
        for pair in out.windows(2) {
            assert!(pair[0].count >= pair[1].count);
            assert!(pair[0].rank <= pair[1].rank);
            if pair[0].count == pair[1].count {
                assert_eq!(pair[0].rank, pair[1].rank);
            }
        }
    }
}
