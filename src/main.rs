use std::sync::Arc;

use anyhow::{bail, Context as _};
use catalog_analytics::analysis::catalog_analyses;
use catalog_analytics::cli::{Cli, Command, SourceArgs};
use catalog_analytics::config::PipelineConfig;
use catalog_analytics::execution::{ExecutionEngine, TracingExecutionObserver};
use catalog_analytics::ingestion::{CatalogStore, LoadMode, LoadReport, LoadSource};
use catalog_analytics::partition::build_partitioned_view;
use catalog_analytics::processing::{group_by, GroupQuery, ResultOrder};
use catalog_analytics::report::{render, render_all, OutputFormat, ReportKind};
use catalog_analytics::schema::SchemaRegistry;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::import()?;
    let mut cfg = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(n) = cli.max_bad_records {
        cfg.load.max_bad_records = n;
    }

    match cli.command {
        Command::Load(sources) => {
            let (_, reports) = load_all(&cfg, &sources)?;
            for report in &reports {
                print_load_report(report);
            }
        }
        Command::Report { sources, format, only } => {
            let (store, _) = load_all(&cfg, &sources)?;
            let mut analyses = catalog_analyses(&cfg.pricing, &cfg.report);
            if !only.is_empty() {
                if let Some(unknown) = only.iter().find(|n| !analyses.iter().any(|a| &a.name == *n)) {
                    bail!("unknown analysis {unknown:?}");
                }
                analyses.retain(|a| only.contains(&a.name));
            }

            let engine = ExecutionEngine::new(cfg.execution.to_options())?
                .with_observer(Arc::new(TracingExecutionObserver));
            let reports = engine.run_analyses(store.dataset(), &analyses)?;
            print!("{}", render_all(&reports, format.map(OutputFormat::from).unwrap_or(cfg.report.format))?);
        }
        Command::Partition { sources, scan } => {
            let (store, _) = load_all(&cfg, &sources)?;
            let view = build_partitioned_view(store.dataset(), &cfg.partition.field, &cfg.partition.range_pairs())?;

            println!("{:<12}  {:>8}", "bucket", "rows");
            for bucket in view.bucket_summaries() {
                println!("{:<12}  {:>8}", bucket.label, bucket.rows);
            }
            println!("{:<12}  {:>8}", "excluded", view.excluded());

            if let Some([lo, hi]) = scan.as_deref() {
                let (lo, hi) = (*lo, *hi);
                if lo >= hi {
                    bail!("scan range must satisfy FROM < TO, got {lo}..{hi}");
                }
                tracing::info!(lo, hi, buckets = view.buckets_scanned(lo, hi), "scanning view");
                let scanned = view.scan(lo, hi);
                let per_year = group_by(
                    &scanned,
                    &GroupQuery::new([view.field()]).ordered_by(ResultOrder::KeyAsc),
                )?;
                println!();
                print!("{}", render(&per_year, ReportKind::Timeseries, cfg.report.format)?);
            }
        }
    }

    Ok(())
}

/// Load every source in order; the first uses the configured mode, the rest append.
fn load_all(cfg: &PipelineConfig, sources: &SourceArgs) -> anyhow::Result<(CatalogStore, Vec<LoadReport>)> {
    let mut store = CatalogStore::new(SchemaRegistry::products());
    let mut options = cfg.load.to_load_options()?;

    let mut reports = Vec::with_capacity(sources.sources.len());
    for (i, arg) in sources.sources.iter().enumerate() {
        if i > 0 {
            options.mode = LoadMode::Append;
        }
        let source = LoadSource::infer(arg);
        let report = store
            .load(&source, &options)
            .with_context(|| format!("failed to load {source}"))?;
        reports.push(report);
    }
    Ok((store, reports))
}

fn print_load_report(report: &LoadReport) {
    println!(
        "loaded={} skipped={} duplicates_replaced={} store_rows={}",
        report.records_loaded, report.records_skipped, report.duplicates_replaced, report.store_rows
    );
    for file in &report.files {
        println!("  file {}", file.display());
    }
    for rejected in &report.rejected {
        println!("  rejected {}:{} {}", rejected.source, rejected.line, rejected.reason);
    }
}
