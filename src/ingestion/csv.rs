//! Delimited-text reading with a bounded bad-row budget.

use std::io::Read;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::schema::{SchemaRegistry, ValidatedRecord};

/// Keep at most this many rejected-row samples per load.
pub const MAX_REJECTED_SAMPLES: usize = 100;

/// A data row that was skipped during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Source the row came from.
    pub source: String,
    /// 1-based line number in the source (the header is line 1).
    pub line: u64,
    /// Why the row was skipped.
    pub reason: String,
}

/// Rows accumulated across one load call, possibly spanning several files.
#[derive(Debug)]
pub struct Batch {
    max_bad_records: usize,
    pub(crate) rows: Vec<ValidatedRecord>,
    pub(crate) skipped: usize,
    pub(crate) rejected: Vec<RejectedRow>,
}

impl Batch {
    pub fn new(max_bad_records: usize) -> Self {
        Self {
            max_bad_records,
            rows: Vec::new(),
            skipped: 0,
            rejected: Vec::new(),
        }
    }

    /// Rows accepted so far.
    pub fn loaded(&self) -> usize {
        self.rows.len()
    }

    /// Rows skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    fn skip(&mut self, source: &str, line: u64, reason: String) -> IngestionResult<()> {
        self.skipped += 1;
        tracing::debug!(source, line, %reason, "skipping row");
        if self.rejected.len() < MAX_REJECTED_SAMPLES {
            self.rejected.push(RejectedRow {
                source: source.to_owned(),
                line,
                reason,
            });
        }
        if self.skipped > self.max_bad_records {
            return Err(IngestionError::LoadAborted {
                skipped: self.skipped,
                max_bad_records: self.max_bad_records,
            });
        }
        Ok(())
    }
}

/// Build a CSV reader configured for catalog input.
///
/// The reader is `flexible` so rows with the wrong number of fields reach validation (and are
/// counted as skipped) instead of failing the whole read.
pub fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).delimiter(delimiter);
    builder
}

/// Read a delimited file into `batch`.
pub fn read_csv_from_path(
    path: impl AsRef<Path>,
    delimiter: u8,
    registry: &SchemaRegistry,
    batch: &mut Batch,
) -> IngestionResult<()> {
    let path = path.as_ref();
    let mut rdr = reader_builder(delimiter).from_path(path)?;
    read_csv_from_reader(&mut rdr, &path.display().to_string(), registry, batch)
}

/// Read CSV data from an existing reader into `batch`.
///
/// Rules:
///
/// - The header must contain every registry column (order can differ); otherwise the whole read
///   fails with [`IngestionError::SchemaMismatch`].
/// - A row failing validation, or that is not valid UTF-8, is skipped and counted.
/// - Once more rows were skipped than the batch allows, [`IngestionError::LoadAborted`] is returned.
pub fn read_csv_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    source: &str,
    registry: &SchemaRegistry,
    batch: &mut Batch,
) -> IngestionResult<()> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        // Zero-byte input: nothing to load, not a header error.
        return Ok(());
    }
    let layout = registry
        .layout(headers.iter())
        .map_err(IngestionError::SchemaMismatch)?;

    for (row_idx0, result) in rdr.records().enumerate() {
        // +1 for 1-based lines, +1 again because the header is line 1.
        let fallback_line = row_idx0 as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(err) => match err.kind() {
                csv::ErrorKind::Utf8 { .. } => {
                    let line = err.position().map(|p| p.line()).unwrap_or(fallback_line);
                    batch.skip(source, line, err.to_string())?;
                    continue;
                }
                _ => return Err(err.into()),
            },
        };

        match registry.validate(&layout, &record) {
            Ok(row) => batch.rows.push(row),
            Err(err) => {
                let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
                batch.skip(source, line, err.to_string())?;
            }
        }
    }

    Ok(())
}
