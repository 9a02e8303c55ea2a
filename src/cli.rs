//! Command-line interface definition and parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::report::OutputFormat;

/// Load a product-catalog export and report on it.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, env = "CATALOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override `load.max_bad_records`.
    #[arg(long, global = true)]
    pub max_bad_records: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load sources and print the load summary.
    Load(SourceArgs),
    /// Load sources and print the standard catalog analyses.
    Report {
        #[command(flatten)]
        sources: SourceArgs,
        /// Output encoding; defaults to `report.format`.
        #[arg(short, long, value_enum)]
        format: Option<Format>,
        /// Only print the named analyses.
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
    },
    /// Load sources and print the year buckets of the partitioned view.
    Partition {
        #[command(flatten)]
        sources: SourceArgs,
        /// Also print products per year for `[FROM, TO)` scanned from the view.
        #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
        scan: Option<Vec<i64>>,
    },
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Files, directories or glob patterns; loaded in order, each appended to the last.
    #[arg(required = true)]
    pub sources: Vec<String>,
}

/// `--format` values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Csv,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Csv => OutputFormat::Csv,
        }
    }
}

impl Cli {
    /// Parse command-line arguments.
    pub fn import() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}
