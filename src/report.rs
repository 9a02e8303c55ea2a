//! Report emitter: formats aggregation results for presentation.
//!
//! Rendering is pure formatting. Rows are emitted in the order the aggregation engine produced
//! them and no value is recomputed (percentages are printed with two decimals as stored).

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::processing::AggregationResult;

/// Presentation shape of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Headline numbers.
    Scorecard,
    /// Share of each group.
    Distribution,
    /// Ranked groups.
    Ranking,
    /// Groups ordered along a time key, with a bar per row.
    Timeseries,
}

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// A titled result set, as produced by [`crate::analysis`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub name: String,
    pub kind: ReportKind,
    pub results: Vec<AggregationResult>,
}

const BAR_WIDTH: usize = 30;

#[derive(Serialize)]
struct JsonRow<'a> {
    label: String,
    #[serde(flatten)]
    result: &'a AggregationResult,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    kind: ReportKind,
    rows: Vec<JsonRow<'a>>,
}

/// Render one result set.
pub fn render(
    results: &[AggregationResult],
    kind: ReportKind,
    format: OutputFormat,
) -> Result<String, ReportError> {
    render_named(None, results, kind, format)
}

/// Render a titled report.
pub fn render_report(report: &Report, format: OutputFormat) -> Result<String, ReportError> {
    render_named(Some(report.name.as_str()), &report.results, report.kind, format)
}

/// Render several reports; JSON output is a single array.
pub fn render_all(reports: &[Report], format: OutputFormat) -> Result<String, ReportError> {
    match format {
        OutputFormat::Json => {
            let docs: Vec<JsonReport<'_>> = reports
                .iter()
                .map(|r| json_report(Some(r.name.as_str()), &r.results, r.kind))
                .collect();
            Ok(serde_json::to_string_pretty(&docs)?)
        }
        OutputFormat::Text | OutputFormat::Csv => {
            let mut out = String::new();
            for (i, report) in reports.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str(&render_report(report, format)?);
            }
            Ok(out)
        }
    }
}

fn render_named(
    name: Option<&str>,
    results: &[AggregationResult],
    kind: ReportKind,
    format: OutputFormat,
) -> Result<String, ReportError> {
    match format {
        OutputFormat::Text => Ok(render_text(name, results, kind)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json_report(name, results, kind))?),
        OutputFormat::Csv => render_csv(name, results, kind),
    }
}

fn json_report<'a>(
    name: Option<&'a str>,
    results: &'a [AggregationResult],
    kind: ReportKind,
) -> JsonReport<'a> {
    JsonReport {
        name,
        kind,
        rows: results
            .iter()
            .map(|result| JsonRow {
                label: result.label(),
                result,
            })
            .collect(),
    }
}

fn percent(r: &AggregationResult) -> String {
    format!("{:.2}%", r.percentage)
}

fn render_text(name: Option<&str>, results: &[AggregationResult], kind: ReportKind) -> String {
    let mut out = String::new();
    if let Some(name) = name {
        let _ = writeln!(out, "== {name} ==");
    }
    if results.is_empty() {
        out.push_str("(no rows)\n");
        return out;
    }

    match kind {
        ReportKind::Scorecard => {
            let width = results.iter().map(|r| r.label().len()).max().unwrap_or(0);
            for r in results {
                let _ = writeln!(out, "{:<width$}  {}", r.label(), r.count);
            }
        }
        ReportKind::Distribution => {
            let rows = results
                .iter()
                .map(|r| vec![r.label(), r.count.to_string(), percent(r)])
                .collect();
            write_table(&mut out, &["group", "count", "share"], rows);
        }
        ReportKind::Ranking => {
            let rows = results
                .iter()
                .map(|r| {
                    let rank = r.rank.map_or_else(|| "-".to_string(), |n| n.to_string());
                    vec![rank, r.label(), r.count.to_string(), percent(r)]
                })
                .collect();
            write_table(&mut out, &["rank", "group", "count", "share"], rows);
        }
        ReportKind::Timeseries => {
            let max = results.iter().map(|r| r.count).max().unwrap_or(0).max(1);
            let rows = results
                .iter()
                .map(|r| {
                    let len = (r.count as usize * BAR_WIDTH).div_ceil(max as usize);
                    vec![r.label(), r.count.to_string(), percent(r), "#".repeat(len)]
                })
                .collect();
            write_table(&mut out, &["period", "count", "share", ""], rows);
        }
    }
    out
}

fn write_table(out: &mut String, header: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let _ = writeln!(out, "{}", line(header.to_vec()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", line(rule.iter().map(String::as_str).collect()));
    for row in &rows {
        let _ = writeln!(out, "{}", line(row.iter().map(String::as_str).collect()));
    }
}

fn render_csv(
    name: Option<&str>,
    results: &[AggregationResult],
    kind: ReportKind,
) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let mut header = Vec::new();
    if name.is_some() {
        header.push("report");
    }
    if kind == ReportKind::Ranking {
        header.push("rank");
    }
    header.extend(["group", "count", "percentage"]);
    wtr.write_record(&header)?;

    for r in results {
        let mut record = Vec::with_capacity(header.len());
        if let Some(name) = name {
            record.push(name.to_owned());
        }
        if kind == ReportKind::Ranking {
            record.push(r.rank.map(|n| n.to_string()).unwrap_or_default());
        }
        record.push(r.label());
        record.push(r.count.to_string());
        record.push(format!("{:.2}", r.percentage));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
