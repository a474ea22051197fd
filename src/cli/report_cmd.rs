use anyhow::Result;
use clap::Args;
use colored::{control, Colorize};
use std::path::PathBuf;
use tracing::debug;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::auth::{authenticate, CredentialSource};
use crate::core::config::AppConfig;
use crate::core::fetch::Ga4Client;
use crate::core::pipeline::{self, PipelineOptions, RunSummary};
use crate::core::query::QueryBuilder;
use crate::core::writer::WriterOptions;

#[derive(Args, Debug, Default, Clone)]
pub struct ReportArgs {
    /// GA4 property ID (numeric, or properties/NNN)
    #[arg(short, long)]
    pub property: Option<String>,

    /// Start date: YYYY-MM-DD, today, yesterday or NdaysAgo
    #[arg(long)]
    pub start: Option<String>,

    /// End date (inclusive), same formats as --start
    #[arg(long)]
    pub end: Option<String>,

    /// Dimension name; repeat or comma-separate
    #[arg(short, long = "dimension", value_delimiter = ',')]
    pub dimensions: Vec<String>,

    /// Metric name; repeat or comma-separate
    #[arg(short, long = "metric", value_delimiter = ',')]
    pub metrics: Vec<String>,

    /// Metrics to write as numbers instead of text
    #[arg(long = "numeric", value_delimiter = ',')]
    pub numeric: Vec<String>,

    /// Maximum number of rows to export
    #[arg(long)]
    pub limit: Option<usize>,

    /// Ordering key: NAME, NAME:asc or NAME:desc
    #[arg(long)]
    pub order_by: Option<String>,

    /// Output workbook path (overwritten if it exists)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Worksheet name
    #[arg(long)]
    pub sheet: Option<String>,

    /// Service account key file
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Rewrite YYYYMMDD values of the date dimension as YYYY-MM-DD
    #[arg(long)]
    pub normalize_dates: bool,

    /// Rows requested per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Stop with an error after this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}

impl ReportArgs {
    /// Overlay command-line values on the loaded configuration.
    pub fn apply(self, config: &mut AppConfig) {
        let report = &mut config.report;
        if let Some(property) = self.property {
            report.property_id = property;
        }
        if let Some(start) = self.start {
            report.start_date = start;
        }
        if let Some(end) = self.end {
            report.end_date = end;
        }
        if !self.dimensions.is_empty() {
            report.dimensions = self.dimensions;
        }
        if !self.metrics.is_empty() {
            report.metrics = self.metrics;
        }
        if !self.numeric.is_empty() {
            report.numeric_metrics = self.numeric;
        }
        if self.limit.is_some() {
            report.limit = self.limit;
        }
        if self.order_by.is_some() {
            report.order_by = self.order_by;
        }
        if let Some(output) = self.output {
            report.output = output;
        }
        if let Some(sheet) = self.sheet {
            report.sheet_name = sheet;
        }
        if self.normalize_dates {
            report.normalize_dates = true;
        }
        if self.credentials.is_some() {
            config.auth.credentials_path = self.credentials;
        }
        if let Some(page_size) = self.page_size {
            config.fetch.page_size = page_size;
        }
        if let Some(timeout) = self.timeout {
            config.fetch.timeout_secs = timeout;
        }
        if let Some(max_pages) = self.max_pages {
            config.fetch.max_pages = max_pages;
        }
    }
}

fn query_params(config: &AppConfig) -> QueryBuilder {
    let report = &config.report;
    QueryBuilder::new(report.property_id.clone())
        .dates(report.start_date.clone(), report.end_date.clone())
        .dimensions(report.dimensions.clone())
        .metrics(report.metrics.clone())
        .limit(report.limit)
        .order_by(report.order_by.clone())
}

fn pipeline_options(config: &AppConfig) -> PipelineOptions {
    PipelineOptions {
        fetch: config.fetch.fetch_options(),
        writer: WriterOptions {
            sheet_name: config.report.sheet_name.clone(),
            numeric_columns: config.report.numeric_metrics.clone(),
        },
        normalize_dates: config.report.normalize_dates,
    }
}

pub async fn run(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let params = query_params(config);
    // Fail on a bad query before any network traffic.
    params.build(today)?;
    config.ensure_valid()?;

    let source = CredentialSource::resolve(config.auth.credentials_path.as_deref())?;
    let credential = authenticate(&source, &config.auth_options()).await?;
    debug!(
        account = credential.client_email(),
        expires_at = %credential.expires_at(),
        "Using access token"
    );
    let client = Ga4Client::new(credential, &config.fetch.api_base, config.fetch.timeout())?;

    let summary = pipeline::run(
        &client,
        &params,
        today,
        &config.report.output,
        &pipeline_options(config),
    )
    .await?;

    print_summary(&summary, opts)
}

fn print_summary(summary: &RunSummary, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => {
            control::set_override(opts.use_color);
            let line = format!(
                "Wrote {} row{} ({} page{}) to {}",
                summary.rows,
                if summary.rows == 1 { "" } else { "s" },
                summary.pages,
                if summary.pages == 1 { "" } else { "s" },
                summary.output.display()
            );
            println!("{}", line.green());
            println!(
                "  {} {} .. {}  [{}]",
                format!("properties/{}", summary.property_id).bold(),
                summary.start_date,
                summary.end_date,
                summary.columns.join(", ")
            );
        }
        OutputFormat::Json => {
            let json = if opts.pretty {
                serde_json::to_string_pretty(summary)?
            } else {
                serde_json::to_string(summary)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}
