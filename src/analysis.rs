//! The fixed sequence of product-catalog analyses.
//!
//! Each [`Analysis`] pairs a named query with the [`ReportKind`] it is presented as. The standard
//! sequence from [`catalog_analyses`] covers headline totals, demographic and category shares,
//! top article types per category, seasonality, colours, yearly trend and price segments.

use crate::catalog::columns;
use crate::config::{PricingConfig, ReportConfig};
use crate::error::ProcessingResult;
use crate::processing::{group_by, rank, AggregationResult, Classification, GroupQuery, RankQuery, ResultOrder};
use crate::report::{Report, ReportKind};
use crate::types::DataSet;

/// Derived column holding the price segment.
pub const PRICE_SEGMENT: &str = "priceSegment";

/// The query behind an [`Analysis`].
#[derive(Debug, Clone)]
pub enum AnalysisQuery {
    Group(GroupQuery),
    Rank(RankQuery),
}

impl AnalysisQuery {
    pub fn run(&self, dataset: &DataSet) -> ProcessingResult<Vec<AggregationResult>> {
        match self {
            AnalysisQuery::Group(q) => group_by(dataset, q),
            AnalysisQuery::Rank(q) => rank(dataset, q),
        }
    }
}

/// A named query with its presentation.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub name: String,
    pub kind: ReportKind,
    pub query: AnalysisQuery,
}

impl Analysis {
    pub fn group(name: impl Into<String>, kind: ReportKind, query: GroupQuery) -> Self {
        Self {
            name: name.into(),
            kind,
            query: AnalysisQuery::Group(query),
        }
    }

    pub fn rank(name: impl Into<String>, query: RankQuery) -> Self {
        Self {
            name: name.into(),
            kind: ReportKind::Ranking,
            query: AnalysisQuery::Rank(query),
        }
    }

    pub fn run(&self, dataset: &DataSet) -> ProcessingResult<Report> {
        Ok(Report {
            name: self.name.clone(),
            kind: self.kind,
            results: self.query.run(dataset)?,
        })
    }
}

/// The standard catalog analyses, in presentation order.
pub fn catalog_analyses(pricing: &PricingConfig, report: &ReportConfig) -> Vec<Analysis> {
    let price_segment = Classification::new(pricing.source.clone(), PRICE_SEGMENT, pricing.classifier());

    vec![
        Analysis::group("total_products", ReportKind::Scorecard, GroupQuery::default()),
        Analysis::group(
            "gender_distribution",
            ReportKind::Distribution,
            GroupQuery::new([columns::GENDER]),
        ),
        Analysis::group(
            "master_category_distribution",
            ReportKind::Distribution,
            GroupQuery::new([columns::MASTER_CATEGORY]),
        ),
        Analysis::rank(
            "top_article_types_per_category",
            RankQuery::new([columns::ARTICLE_TYPE])
                .partitioned_by([columns::MASTER_CATEGORY])
                .top(report.top_article_types),
        ),
        Analysis::group(
            "season_distribution",
            ReportKind::Distribution,
            GroupQuery::new([columns::SEASON]).excluding_nulls(),
        ),
        Analysis::group(
            "usage_distribution",
            ReportKind::Distribution,
            GroupQuery::new([columns::USAGE]).excluding_nulls(),
        ),
        Analysis::rank(
            "top_base_colours",
            RankQuery::new([columns::BASE_COLOUR])
                .excluding_nulls()
                .top(report.top_colours),
        ),
        Analysis::group(
            "products_per_year",
            ReportKind::Timeseries,
            GroupQuery::new([columns::YEAR])
                .excluding_nulls()
                .ordered_by(ResultOrder::KeyAsc),
        ),
        Analysis::group(
            "price_segments",
            ReportKind::Distribution,
            GroupQuery::new([PRICE_SEGMENT]).with_classification(price_segment),
        ),
    ]
}

/// Run `analyses` one after another against the same snapshot.
///
/// See [`crate::execution::ExecutionEngine::run_analyses`] for the parallel variant.
pub fn run_analyses(dataset: &DataSet, analyses: &[Analysis]) -> ProcessingResult<Vec<Report>> {
    analyses.iter().map(|a| a.run(dataset)).collect()
}
