use catalog_analytics::ingestion::{CatalogStore, LoadOptions, LoadSource};
use catalog_analytics::partition::build_partitioned_view;
use catalog_analytics::processing::{group_by, Filter, GroupQuery};
use catalog_analytics::schema::SchemaRegistry;
use catalog_analytics::types::DataSet;
use rstest::{fixture, rstest};

const RANGES: &[(i64, i64)] = &[(2010, 2012), (2012, 2014), (2014, 2017)];

#[fixture]
fn styles() -> DataSet {
    let mut store = CatalogStore::new(SchemaRegistry::products());
    store
        .load(&LoadSource::file("tests/fixtures/styles.csv"), &LoadOptions::default())
        .unwrap();
    store.dataset().clone()
}

#[rstest]
fn view_holds_every_in_range_record_once(styles: DataSet) {
    let view = build_partitioned_view(&styles, "year", RANGES).unwrap();

    let rows: Vec<usize> = view.bucket_summaries().iter().map(|b| b.rows).collect();
    assert_eq!(rows, vec![4, 6, 1]);
    // Only the record without a year is left out.
    assert_eq!(view.excluded(), 1);
    assert_eq!(view.row_count() + view.excluded(), styles.row_count());
}

#[rstest]
#[case::whole_view(2010, 2017, &["gender"])]
#[case::one_bucket(2012, 2014, &["masterCategory"])]
#[case::straddles_buckets(2011, 2013, &["masterCategory", "gender"])]
#[case::partial_bucket(2016, 2017, &["articleType"])]
fn view_aggregates_match_filtered_store(
    styles: DataSet,
    #[case] lo: i64,
    #[case] hi: i64,
    #[case] fields: &[&str],
) {
    let view = build_partitioned_view(&styles, "year", RANGES).unwrap();
    let query = GroupQuery::new(fields.iter().copied());

    let from_view = group_by(&view.scan(lo, hi), &query).unwrap();
    let from_store = group_by(&styles, &query.clone().with_filter(Filter::range("year", lo, hi))).unwrap();
    assert_eq!(from_view, from_store);
}

#[rstest]
fn scan_prunes_non_overlapping_buckets(styles: DataSet) {
    let view = build_partitioned_view(&styles, "year", RANGES).unwrap();
    assert_eq!(view.buckets_scanned(2012, 2014), 1);
    assert_eq!(view.buckets_scanned(2011, 2013), 2);
    assert_eq!(view.buckets_scanned(2030, 2040), 0);
    assert_eq!(view.scan(2030, 2040).row_count(), 0);
}

#[rstest]
fn whole_view_equals_store_minus_excluded(styles: DataSet) {
    let view = build_partitioned_view(&styles, "year", RANGES).unwrap();
    let query = GroupQuery::new(["masterCategory"]);
    let from_view = group_by(&view.to_dataset(), &query).unwrap();
    let from_store = group_by(&styles, &query.clone().with_filter(Filter::not_null("year"))).unwrap();
    assert_eq!(from_view, from_store);
}

#[rstest]
fn bucket_field_must_be_integer(styles: DataSet) {
    assert!(build_partitioned_view(&styles, "season", RANGES).is_err());
}
