//! Execution engine for running catalog aggregations with configurable parallelism.
//!
//! This module sits "above" [`crate::processing`] and provides:
//!
//! - Parallel (chunked) counting for `group_by` and `rank`
//! - Parallel batches of [`Analysis`] runs against one snapshot
//! - Resource limits / throttling (in-flight chunks)
//! - Real-time metrics + observer hooks for monitoring
//!
//! Results are identical to the sequential functions in [`crate::processing`]: chunk counts are
//! merged before percentages and ranks are computed.

mod observer;
mod semaphore;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::analysis::{Analysis, AnalysisQuery};
use crate::error::ProcessingResult;
use crate::processing::group::{GroupCounts, GroupPlan};
use crate::processing::rank::rank_counts;
use crate::processing::{AggregationResult, Classification, Filter, GroupQuery, RankQuery};
use crate::report::Report;
use crate::types::DataSet;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, TracingExecutionObserver,
};

use semaphore::ChunkPermits;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Number of rows per chunk.
    pub chunk_size: usize,
    /// Upper bound on concurrently counted chunks.
    ///
    /// This is an additional throttle on top of `num_threads`. The bound is engine-wide: analyses
    /// in one [`ExecutionEngine::run_analyses`] batch draw from the same permits.
    pub max_in_flight_chunks: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_parallelism();
        Self {
            num_threads: Some(n),
            chunk_size: 4_096,
            max_in_flight_chunks: n,
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// A configurable execution engine for aggregations over an immutable [`DataSet`].
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
    permits: ChunkPermits,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Zero values for `chunk_size`, `max_in_flight_chunks` or `num_threads` are raised to one.
    pub fn new(opts: ExecutionOptions) -> Result<Self, ThreadPoolBuildError> {
        let opts = ExecutionOptions {
            num_threads: Some(opts.num_threads.unwrap_or_else(available_parallelism).max(1)),
            chunk_size: opts.chunk_size.max(1),
            max_in_flight_chunks: opts.max_in_flight_chunks.max(1),
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(opts.num_threads.unwrap_or(1))
            .thread_name(|i| format!("catalog-exec-{i}"))
            .build()?;

        Ok(Self {
            pool,
            permits: ChunkPermits::new(opts.max_in_flight_chunks),
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// [`crate::processing::group_by`] with rows counted in parallel chunks.
    pub fn group_by(&self, dataset: &DataSet, query: &GroupQuery) -> ProcessingResult<Vec<AggregationResult>> {
        self.run("group_by", || self.group_by_chunks(dataset, query))
    }

    /// [`crate::processing::rank`] with rows counted in parallel chunks.
    pub fn rank(&self, dataset: &DataSet, query: &RankQuery) -> ProcessingResult<Vec<AggregationResult>> {
        self.run("rank", || self.rank_chunks(dataset, query))
    }

    /// Run a batch of analyses concurrently against the same snapshot.
    ///
    /// Reports come back in the order of `analyses`; the first failing analysis fails the batch.
    pub fn run_analyses(&self, dataset: &DataSet, analyses: &[Analysis]) -> ProcessingResult<Vec<Report>> {
        self.run("analyses", || {
            analyses
                .par_iter()
                .map(|analysis| {
                    self.emit(ExecutionEvent::AnalysisStarted {
                        name: analysis.name.clone(),
                    });
                    let results = match &analysis.query {
                        AnalysisQuery::Group(q) => self.group_by_chunks(dataset, q)?,
                        AnalysisQuery::Rank(q) => self.rank_chunks(dataset, q)?,
                    };
                    self.metrics.on_analysis_finished();
                    self.emit(ExecutionEvent::AnalysisFinished {
                        name: analysis.name.clone(),
                        rows: results.len(),
                    });
                    Ok(Report {
                        name: analysis.name.clone(),
                        kind: analysis.kind,
                        results,
                    })
                })
                .collect()
        })
    }

    fn group_by_chunks(&self, dataset: &DataSet, query: &GroupQuery) -> ProcessingResult<Vec<AggregationResult>> {
        let counts = self.count_chunks(
            dataset,
            query.classification.as_ref(),
            &query.fields,
            query.filter.as_ref(),
            query.exclude_nulls,
        )?;
        Ok(counts.finalize(query.order))
    }

    fn rank_chunks(&self, dataset: &DataSet, query: &RankQuery) -> ProcessingResult<Vec<AggregationResult>> {
        let counts = self.count_chunks(
            dataset,
            query.classification.as_ref(),
            &query.key_fields(),
            query.filter.as_ref(),
            query.exclude_nulls,
        )?;
        Ok(rank_counts(counts, query.partition_by.len(), query.top))
    }

    /// Wrap one top-level call: install the pool, reset metrics, emit start/finish events.
    fn run<T, F>(&self, operation: &'static str, f: F) -> ProcessingResult<T>
    where
        T: Send,
        F: FnOnce() -> ProcessingResult<T> + Send,
    {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted { operation });

        let out = self.pool.install(f);

        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        self.emit(ExecutionEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });
        out
    }

    fn count_chunks(
        &self,
        dataset: &DataSet,
        classification: Option<&Classification>,
        fields: &[String],
        filter: Option<&Filter>,
        exclude_nulls: bool,
    ) -> ProcessingResult<GroupCounts> {
        let plan = GroupPlan::prepare(dataset, classification, fields, filter)?;
        let rows = &plan.dataset.rows;

        let counts = chunk_ranges(rows.len(), self.opts.chunk_size)
            .into_par_iter()
            .map(|range| {
                let (_permit, waited) = self.permits.acquire();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
                }

                self.metrics.on_chunk_start();
                self.emit(ExecutionEvent::ChunkStarted {
                    start_row: range.start,
                    row_count: range.len(),
                });

                let counts = plan.count(&rows[range.clone()], exclude_nulls);
                self.metrics.on_rows_processed(range.len());

                self.emit(ExecutionEvent::ChunkFinished {
                    groups: counts.counts.len(),
                });
                self.metrics.on_chunk_end();
                counts
            })
            .reduce(GroupCounts::default, GroupCounts::merge);
        Ok(counts)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn chunk_ranges(row_count: usize, chunk_size: usize) -> Vec<std::ops::Range<usize>> {
    let mut out = Vec::with_capacity(row_count.div_ceil(chunk_size));
    let mut start = 0usize;
    while start < row_count {
        let end = (start + chunk_size).min(row_count);
        out.push(start..end);
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{chunk_ranges, ExecutionEngine, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::analysis::{catalog_analyses, run_analyses};
    use crate::config::{PricingConfig, ReportConfig};
    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::processing::{group_by, rank, Filter, GroupQuery, RankQuery};
    use crate::schema::SchemaRegistry;
    use crate::types::{DataSet, Value};

    fn catalog(n: usize) -> DataSet {
        let masters = ["Apparel", "Footwear", "Accessories"];
        let articles = ["Tshirts", "Shirts", "Watches", "Casual Shoes", "Socks"];
        let colours = ["Blue", "Black", "White", "Red"];
        let registry = SchemaRegistry::products();
        let rows = (0..n)
            .map(|i| {
                let s = |v: &str| Value::Utf8(v.to_string());
                vec![
                    Value::Int64(i as i64),
                    s(if i % 3 == 0 { "Women" } else { "Men" }),
                    s(masters[i % masters.len()]),
                    s("Topwear"),
                    s(articles[(i * 7) % articles.len()]),
                    if i % 11 == 0 { Value::Null } else { s(colours[i % colours.len()]) },
                    s("Summer"),
                    if i % 13 == 0 {
                        Value::Null
                    } else {
                        Value::Int64(2010 + (i % 8) as i64)
                    },
                    s("Casual"),
                    s(&format!("Item {}", (i * 37) % 3000)),
                ]
            })
            .collect();
        DataSet::new(registry.schema().clone(), rows)
    }

    fn engine(chunk_size: usize, in_flight: usize) -> ExecutionEngine {
        ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            chunk_size,
            max_in_flight_chunks: in_flight,
        })
        .unwrap()
    }

    #[test]
    fn chunk_ranges_cover_all_rows() {
        assert!(chunk_ranges(0, 4).is_empty());
        assert_eq!(chunk_ranges(10, 4), vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn parallel_group_by_matches_sequential() {
        let ds = catalog(1_000);
        let q = GroupQuery::new(["masterCategory", "gender"])
            .with_filter(Filter::range("year", 2011, 2016));
        let seq = group_by(&ds, &q).unwrap();
        let par = engine(17, 4).group_by(&ds, &q).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn parallel_rank_matches_sequential() {
        let ds = catalog(1_000);
        let q = RankQuery::new(["articleType"])
            .partitioned_by(["masterCategory"])
            .top(3);
        assert_eq!(rank(&ds, &q).unwrap(), engine(64, 2).rank(&ds, &q).unwrap());
    }

    #[test]
    fn parallel_analyses_match_sequential() {
        let ds = catalog(500);
        let analyses = catalog_analyses(&PricingConfig::default(), &ReportConfig::default());
        let seq = run_analyses(&ds, &analyses).unwrap();
        let eng = engine(50, 4);
        let par = eng.run_analyses(&ds, &analyses).unwrap();
        assert_eq!(seq, par);
        assert_eq!(eng.metrics().snapshot().analyses_run, analyses.len() as u64);
    }

    #[test]
    fn unknown_column_is_reported_not_panicked() {
        let ds = catalog(10);
        assert!(engine(4, 1).group_by(&ds, &GroupQuery::new(["colour"])).is_err());
    }

    struct ConcurrencyObserver {
        active_chunks: AtomicUsize,
        max_active_chunks: AtomicUsize,
    }

    impl ExecutionObserver for ConcurrencyObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::ChunkStarted { .. } => {
                    let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                ExecutionEvent::ChunkFinished { .. } => {
                    self.active_chunks.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn max_in_flight_chunks_throttles_chunk_concurrency() {
        let ds = catalog(100);
        let observer = Arc::new(ConcurrencyObserver {
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        });
        let eng = engine(1, 1).with_observer(observer.clone());

        let out = eng.group_by(&ds, &GroupQuery::new(["gender"])).unwrap();
        assert_eq!(out.iter().map(|r| r.count).sum::<u64>(), 100);
        assert_eq!(observer.max_active_chunks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn max_in_flight_chunks_bounds_a_whole_analysis_batch() {
        let ds = catalog(40);
        let observer = Arc::new(ConcurrencyObserver {
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        });
        let eng = engine(1, 1).with_observer(observer.clone());
        let analyses = catalog_analyses(&PricingConfig::default(), &ReportConfig::default());

        let reports = eng.run_analyses(&ds, &analyses).unwrap();
        assert_eq!(reports, run_analyses(&ds, &analyses).unwrap());
        assert_eq!(observer.max_active_chunks.load(Ordering::SeqCst), 1);
        assert_eq!(eng.metrics().snapshot().max_active_chunks, 1);
    }

    #[test]
    fn metrics_are_available_after_run() {
        let ds = catalog(60);
        let eng = engine(10, 2);
        let metrics = eng.metrics();

        eng.group_by(&ds, &GroupQuery::new(["gender"])).unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.rows_processed, 60);
        assert_eq!(snap.chunks_started, 6);
        assert_eq!(snap.chunks_finished, 6);
        assert!(snap.max_active_chunks <= 2);
        assert!(snap.elapsed.is_some());
    }
}
