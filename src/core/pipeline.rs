use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::error::ReportResult;
use crate::core::fetch::{fetch_report, FetchOptions, PageSource};
use crate::core::query::QueryBuilder;
use crate::core::writer::{write_workbook, WriterOptions};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub fetch: FetchOptions,
    pub writer: WriterOptions,
    pub normalize_dates: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub output: PathBuf,
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub columns: Vec<String>,
    pub rows: usize,
    pub pages: usize,
}

/// Build the query, fetch every page, and write the workbook.
///
/// The query is validated before `source` is touched, and nothing is
/// written unless the fetch completed.
pub async fn run<S: PageSource>(
    source: &S,
    params: &QueryBuilder,
    today: NaiveDate,
    output: &Path,
    opts: &PipelineOptions,
) -> ReportResult<RunSummary> {
    let query = params.build(today)?;
    let range = query.date_range();
    info!(
        property = query.property_id(),
        start = %range.start,
        end = %range.end,
        dimensions = query.dimensions().len(),
        metrics = query.metrics().len(),
        "Running report"
    );

    let mut fetched = fetch_report(source, &query, &opts.fetch).await?;
    if opts.normalize_dates {
        fetched.table.normalize_dates();
    }

    let writer = WriterOptions {
        numeric_columns: numeric_metrics(&opts.writer.numeric_columns, query.metrics()),
        ..opts.writer.clone()
    };
    write_workbook(&fetched.table, output, &writer)?;

    Ok(RunSummary {
        output: output.to_path_buf(),
        property_id: query.property_id().to_string(),
        start_date: range.start,
        end_date: range.end,
        columns: fetched.table.header,
        rows: fetched.table.rows.len(),
        pages: fetched.pages,
    })
}

/// Keep only the requested metrics; dimensions are always written as text.
fn numeric_metrics(requested: &[String], metrics: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| {
            let known = metrics.contains(name);
            if !known {
                warn!(column = name.as_str(), "Not a requested metric; writing as text");
            }
            known
        })
        .cloned()
        .collect()
}
