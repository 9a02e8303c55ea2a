//! Pipeline configuration.
//!
//! Values are layered with a fixed precedence: built-in defaults, then an optional TOML file, then
//! environment variables. Environment variables follow `CATALOG_<SECTION>__<KEY>`, e.g.
//!
//! ```bash
//! export CATALOG_LOAD__MAX_BAD_RECORDS=25
//! export CATALOG_REPORT__FORMAT=json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::ExecutionOptions;
use crate::ingestion::{
    CompositeObserver, FileObserver, IngestionObserver, LoadMode, LoadOptions, TracingObserver,
};
use crate::partition::BucketRange;
use crate::processing::{PriceBand, PriceClassifier};
use crate::report::OutputFormat;

/// Every section of the pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Rows that may be skipped before a load is aborted.
    pub max_bad_records: usize,
    pub mode: LoadMode,
    /// Single ASCII field separator.
    pub delimiter: String,
    /// File extension picked up when loading a directory.
    pub extension: String,
    /// Append load outcomes to this file in addition to the log.
    pub audit_log: Option<PathBuf>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_bad_records: 10,
            mode: LoadMode::Replace,
            delimiter: ",".to_string(),
            extension: "csv".to_string(),
            audit_log: None,
        }
    }
}

impl LoadConfig {
    pub fn to_load_options(&self) -> Result<LoadOptions, ConfigError> {
        let delimiter = match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => return Err(ConfigError::Delimiter(self.delimiter.clone())),
        };
        let observer: Arc<dyn IngestionObserver> = match &self.audit_log {
            Some(path) => Arc::new(CompositeObserver::new(vec![
                Arc::new(TracingObserver) as Arc<dyn IngestionObserver>,
                Arc::new(FileObserver::new(path)),
            ])),
            None => Arc::new(TracingObserver),
        };
        Ok(LoadOptions {
            max_bad_records: self.max_bad_records,
            mode: self.mode,
            delimiter,
            extension: self.extension.clone(),
            observer: Some(observer),
            ..LoadOptions::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Integer field the view is bucketed on.
    pub field: String,
    pub ranges: Vec<BucketRange>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            field: "year".to_string(),
            ranges: vec![
                BucketRange { lo: 2007, hi: 2010 },
                BucketRange { lo: 2010, hi: 2013 },
                BucketRange { lo: 2013, hi: 2016 },
                BucketRange { lo: 2016, hi: 2020 },
            ],
        }
    }
}

impl PartitionConfig {
    pub fn range_pairs(&self) -> Vec<(i64, i64)> {
        self.ranges.iter().map(|r| (r.lo, r.hi)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Text column the price is extracted from.
    pub source: String,
    pub bands: Vec<PriceBand>,
    pub top_label: String,
    pub unknown_label: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            source: "productDisplayName".to_string(),
            bands: vec![PriceBand::new(500.0, "Budget"), PriceBand::new(2000.0, "Mid-Range")],
            top_label: "Premium".to_string(),
            unknown_label: "Unknown".to_string(),
        }
    }
}

impl PricingConfig {
    pub fn classifier(&self) -> PriceClassifier {
        PriceClassifier::new(self.bands.clone(), self.top_label.clone())
            .with_unknown_label(self.unknown_label.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: OutputFormat,
    /// Article types kept per master category.
    pub top_article_types: u32,
    pub top_colours: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            top_article_types: 5,
            top_colours: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker threads; 0 uses the available parallelism.
    pub threads: usize,
    pub chunk_size: usize,
    /// Chunks counted at once; 0 matches the thread count.
    pub max_in_flight_chunks: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            chunk_size: 4_096,
            max_in_flight_chunks: 0,
        }
    }
}

impl ExecutionConfig {
    pub fn to_options(&self) -> ExecutionOptions {
        let defaults = ExecutionOptions::default();
        let threads = (self.threads > 0).then_some(self.threads);
        let in_flight = match (self.max_in_flight_chunks, threads) {
            (0, Some(n)) => n,
            (0, None) => defaults.max_in_flight_chunks,
            (n, _) => n,
        };
        ExecutionOptions {
            num_threads: threads.or(defaults.num_threads),
            chunk_size: self.chunk_size.max(1),
            max_in_flight_chunks: in_flight,
        }
    }
}

impl PipelineConfig {
    /// Load configuration with precedence (highest first):
    /// 1. `CATALOG_<SECTION>__<KEY>` environment variables
    /// 2. the TOML file at `path`, which must exist when given
    /// 3. default values
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Defaults come from the `#[serde(default)]` sections so that a list in the file
        // replaces the default list instead of merging with it index by index.
        let mut config = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            config = config.add_source(config::File::from(path));
        }

        config = config.add_source(
            config::Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = config.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for r in &self.partition.ranges {
            BucketRange::new(r.lo, r.hi)?;
        }
        self.load.to_load_options()?;
        Ok(())
    }
}
