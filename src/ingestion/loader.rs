//! Catalog loader: moves delimited files into the in-memory [`CatalogStore`].
//!
//! A load reads every row of its source against the store's [`SchemaRegistry`], skipping rows that
//! fail validation up to [`LoadOptions::max_bad_records`]. Loads are atomic: the store only changes
//! when the whole source was read within budget.
//!
//! ```no_run
//! use catalog_analytics::ingestion::{CatalogStore, LoadOptions, LoadSource};
//! use catalog_analytics::schema::SchemaRegistry;
//!
//! # fn main() -> Result<(), catalog_analytics::IngestionError> {
//! let mut store = CatalogStore::new(SchemaRegistry::products());
//! let report = store.load(&LoadSource::file("styles.csv"), &LoadOptions::default())?;
//! println!("loaded={} skipped={}", report.records_loaded, report.records_skipped);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::schema::{SchemaRegistry, ValidatedRecord};
use crate::types::{DataSet, HashKey, Value};

use super::csv::{read_csv_from_path, read_csv_from_reader, reader_builder, Batch, RejectedRow};
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

/// Whether a load replaces the store or merges into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Discard current contents (default).
    #[default]
    Replace,
    /// Keep current contents; incoming rows win on key collisions.
    Append,
}

/// Where to read catalog rows from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// A single delimited file.
    File(PathBuf),
    /// Every file matching a glob pattern, in sorted order.
    Glob(String),
    /// Every file under a directory (recursively) with [`LoadOptions::extension`], in sorted order.
    Directory(PathBuf),
}

impl LoadSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Pick a source kind from a CLI-style argument: directories walk, patterns glob, else file.
    pub fn infer(arg: &str) -> Self {
        let path = Path::new(arg);
        if path.is_dir() {
            Self::Directory(path.to_path_buf())
        } else if arg.contains(['*', '?', '[']) {
            Self::Glob(arg.to_owned())
        } else {
            Self::File(path.to_path_buf())
        }
    }

    fn resolve(&self, extension: &str) -> IngestionResult<Vec<PathBuf>> {
        let mut files = match self {
            LoadSource::File(path) => return Ok(vec![path.clone()]),
            LoadSource::Glob(pattern) => {
                let mut out = Vec::new();
                for entry in glob::glob(pattern)? {
                    let path = entry.map_err(std::io::Error::from)?;
                    if path.is_file() {
                        out.push(path);
                    }
                }
                out
            }
            LoadSource::Directory(dir) => {
                let mut out = Vec::new();
                for entry in walkdir::WalkDir::new(dir) {
                    let entry = entry.map_err(std::io::Error::from)?;
                    let matches_ext = entry
                        .path()
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
                    if entry.file_type().is_file() && matches_ext {
                        out.push(entry.into_path());
                    }
                }
                out
            }
        };

        if files.is_empty() {
            return Err(IngestionError::EmptySource {
                source_desc: self.to_string(),
            });
        }
        files.sort();
        Ok(files)
    }
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadSource::File(p) => write!(f, "{}", p.display()),
            LoadSource::Glob(g) => f.write_str(g),
            LoadSource::Directory(d) => write!(f, "{}/", d.display()),
        }
    }
}

/// Options controlling a single load call.
#[derive(Clone)]
pub struct LoadOptions {
    /// Maximum number of rows that may be skipped before the load aborts (per call).
    pub max_bad_records: usize,
    /// Replace or append.
    pub mode: LoadMode,
    /// Field delimiter.
    pub delimiter: u8,
    /// File extension picked up by [`LoadSource::Directory`].
    pub extension: String,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("max_bad_records", &self.max_bad_records)
            .field("mode", &self.mode)
            .field("delimiter", &(self.delimiter as char))
            .field("extension", &self.extension)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_bad_records: 10,
            mode: LoadMode::Replace,
            delimiter: b',',
            extension: "csv".to_string(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Audit record of one successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows accepted (including rows that replaced an earlier row with the same key).
    pub records_loaded: usize,
    /// Rows skipped because they failed validation.
    pub records_skipped: usize,
    /// Accepted rows that replaced an existing row with the same key.
    pub duplicates_replaced: usize,
    /// Rows in the store after the load.
    pub store_rows: usize,
    /// Files read, in order.
    pub files: Vec<PathBuf>,
    /// First skipped rows with reasons.
    pub rejected: Vec<RejectedRow>,
}

impl LoadReport {
    /// Data rows seen (header excluded).
    pub fn total_rows(&self) -> usize {
        self.records_loaded + self.records_skipped
    }
}

/// The queryable store: an immutable snapshot replaced atomically by each load.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    registry: SchemaRegistry,
    snapshot: Arc<DataSet>,
}

impl CatalogStore {
    pub fn new(registry: SchemaRegistry) -> Self {
        let snapshot = Arc::new(DataSet::empty(registry.schema().clone()));
        Self { registry, snapshot }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Current contents.
    pub fn dataset(&self) -> &DataSet {
        &self.snapshot
    }

    /// Shared handle to the current snapshot; unaffected by later loads.
    pub fn snapshot(&self) -> Arc<DataSet> {
        Arc::clone(&self.snapshot)
    }

    /// Load a file-based source.
    ///
    /// When an observer is configured, this reports:
    ///
    /// - `on_success` with loaded/skipped counts
    /// - `on_failure` on failure, with a computed severity
    /// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
    pub fn load(&mut self, source: &LoadSource, options: &LoadOptions) -> IngestionResult<LoadReport> {
        let span = tracing::info_span!("load", source = %source, mode = ?options.mode);
        let _enter = span.enter();

        let result = source.resolve(&options.extension).and_then(|files| {
            let mut batch = Batch::new(options.max_bad_records);
            for file in &files {
                tracing::debug!(file = %file.display(), "reading");
                read_csv_from_path(file, options.delimiter, &self.registry, &mut batch)?;
            }
            Ok(self.commit(batch, files, options.mode))
        });

        self.notify(source.to_string(), options, &result);
        result
    }

    /// Load delimited data from any reader; `name` identifies it in reports.
    pub fn load_reader<R: Read>(
        &mut self,
        reader: R,
        name: &str,
        options: &LoadOptions,
    ) -> IngestionResult<LoadReport> {
        let span = tracing::info_span!("load", source = name, mode = ?options.mode);
        let _enter = span.enter();

        let mut rdr = reader_builder(options.delimiter).from_reader(reader);
        let mut batch = Batch::new(options.max_bad_records);
        let result = read_csv_from_reader(&mut rdr, name, &self.registry, &mut batch)
            .map(|()| self.commit(batch, Vec::new(), options.mode));

        self.notify(name.to_owned(), options, &result);
        result
    }

    fn commit(&mut self, batch: Batch, files: Vec<PathBuf>, mode: LoadMode) -> LoadReport {
        let records_loaded = batch.loaded();
        let records_skipped = batch.skipped();
        let rejected = batch.rejected().to_vec();

        let base = match mode {
            LoadMode::Replace => Vec::new(),
            LoadMode::Append => self.snapshot.rows.clone(),
        };
        let (rows, duplicates_replaced) =
            merge_last_write_wins(base, batch.rows, self.registry.key_index());

        self.snapshot = Arc::new(DataSet::new(self.registry.schema().clone(), rows));

        LoadReport {
            records_loaded,
            records_skipped,
            duplicates_replaced,
            store_rows: self.snapshot.row_count(),
            files,
            rejected,
        }
    }

    fn notify(&self, source: String, options: &LoadOptions, result: &IngestionResult<LoadReport>) {
        let Some(obs) = options.observer.as_ref() else {
            return;
        };
        let ctx = IngestionContext {
            source,
            mode: options.mode,
        };
        match result {
            Ok(report) => obs.on_success(
                &ctx,
                IngestionStats {
                    loaded: report.records_loaded,
                    skipped: report.records_skipped,
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }
}

fn row_key(row: &[Value], idx: usize) -> Option<HashKey> {
    match row.get(idx)? {
        Value::Null => None,
        value => Some(HashKey::of(value)),
    }
}

/// Append `incoming` to `base`; a row whose key already exists replaces that row in place.
fn merge_last_write_wins(
    mut base: Vec<ValidatedRecord>,
    incoming: Vec<ValidatedRecord>,
    key_idx: Option<usize>,
) -> (Vec<ValidatedRecord>, usize) {
    let Some(key_idx) = key_idx else {
        base.extend(incoming);
        return (base, 0);
    };

    let mut positions: HashMap<HashKey, usize> = base
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row_key(row, key_idx).map(|k| (k, i)))
        .collect();

    let mut replaced = 0;
    for row in incoming {
        match row_key(&row, key_idx) {
            Some(key) => match positions.get(&key) {
                Some(&pos) => {
                    base[pos] = row;
                    replaced += 1;
                }
                None => {
                    positions.insert(key, base.len());
                    base.push(row);
                }
            },
            None => base.push(row),
        }
    }
    (base, replaced)
}

fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Io(_) => IngestionSeverity::Critical,
        IngestionError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        IngestionError::Pattern(_) => IngestionSeverity::Error,
        IngestionError::SchemaMismatch(_) => IngestionSeverity::Error,
        IngestionError::EmptySource { .. } => IngestionSeverity::Error,
        IngestionError::LoadAborted { .. } => IngestionSeverity::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_last_write_wins, CatalogStore, LoadMode, LoadOptions, LoadSource};
    use crate::error::IngestionError;
    use crate::schema::SchemaRegistry;
    use crate::types::{DataType, Field, Schema, Value};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("cat", DataType::Utf8),
        ]))
        .with_key_column("id")
    }

    #[test]
    fn duplicate_ids_are_last_write_wins() {
        let mut store = CatalogStore::new(registry());
        let report = store
            .load_reader("id,cat\n1,a\n2,b\n1,c\n".as_bytes(), "inline", &LoadOptions::default())
            .unwrap();

        assert_eq!(report.records_loaded, 3);
        assert_eq!(report.duplicates_replaced, 1);
        assert_eq!(store.dataset().row_count(), 2);
        assert_eq!(store.dataset().rows[0], vec![Value::Int64(1), Value::Utf8("c".to_string())]);
    }

    #[test]
    fn append_mode_keeps_previous_rows() {
        let mut store = CatalogStore::new(registry());
        let opts = LoadOptions::default();
        store.load_reader("id,cat\n1,a\n".as_bytes(), "first", &opts).unwrap();

        let append = LoadOptions {
            mode: LoadMode::Append,
            ..Default::default()
        };
        let report = store
            .load_reader("id,cat\n2,b\n".as_bytes(), "second", &append)
            .unwrap();
        assert_eq!(report.store_rows, 2);

        store.load_reader("id,cat\n3,c\n".as_bytes(), "third", &opts).unwrap();
        assert_eq!(store.dataset().row_count(), 1);
    }

    #[test]
    fn aborted_load_leaves_store_untouched() {
        let mut store = CatalogStore::new(registry());
        store
            .load_reader("id,cat\n1,a\n".as_bytes(), "good", &LoadOptions::default())
            .unwrap();
        let before = store.snapshot();

        let opts = LoadOptions {
            max_bad_records: 0,
            ..Default::default()
        };
        let err = store
            .load_reader("id,cat\n2,b\nbad,c\n".as_bytes(), "bad", &opts)
            .unwrap_err();

        assert!(matches!(err, IngestionError::LoadAborted { skipped: 1, max_bad_records: 0 }));
        assert_eq!(*store.dataset(), *before);
    }

    #[test]
    fn empty_input_loads_nothing() {
        let mut store = CatalogStore::new(registry());
        let report = store
            .load_reader("".as_bytes(), "empty", &LoadOptions::default())
            .unwrap();
        assert_eq!(report.total_rows(), 0);
        assert_eq!(store.dataset().row_count(), 0);
    }

    #[test]
    fn infer_source_kind_from_argument() {
        assert_eq!(LoadSource::infer("data/*.csv"), LoadSource::Glob("data/*.csv".to_string()));
        assert_eq!(
            LoadSource::infer("definitely/not/here.csv"),
            LoadSource::file("definitely/not/here.csv")
        );
    }

    #[test]
    fn merge_without_key_appends_everything() {
        let rows = vec![vec![Value::Int64(1)], vec![Value::Int64(1)]];
        let (out, replaced) = merge_last_write_wins(Vec::new(), rows, None);
        assert_eq!(out.len(), 2);
        assert_eq!(replaced, 0);
    }
}
