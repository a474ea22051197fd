use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::auth::Credential;
use crate::core::error::{ReportError, ReportResult};
use crate::core::http::{build_client, validate_endpoint};
use crate::core::query::{OrderField, ReportQuery};
use crate::core::retry::{with_backoff, CallError, RetryPolicy};
use crate::core::table::{ReportPage, ReportTable};

pub const DEFAULT_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
/// Largest page the Data API serves per request.
pub const MAX_PAGE_SIZE: usize = 250_000;

/// One page request: the query plus the continuation token from the
/// previous page, if any.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub query: &'a ReportQuery,
    pub page_token: Option<&'a str>,
    pub page_size: usize,
}

/// Anything that can serve report pages. The real implementation is
/// [`Ga4Client`]; tests plug in fakes.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<ReportPage, CallError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub page_size: usize,
    /// Hard cap on the number of pages; reaching it while more rows remain
    /// is a truncation error.
    pub max_pages: usize,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            max_pages: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a complete fetch.
#[derive(Debug, Clone)]
pub struct FetchedReport {
    pub table: ReportTable,
    pub pages: usize,
}

/// Pull every page for `query` and concatenate rows in arrival order.
///
/// All-or-nothing: any error discards the pages fetched so far.
pub async fn fetch_report<S: PageSource>(
    source: &S,
    query: &ReportQuery,
    opts: &FetchOptions,
) -> ReportResult<FetchedReport> {
    if opts.page_size == 0 || opts.page_size > MAX_PAGE_SIZE || opts.max_pages == 0 {
        return Err(ReportError::Configuration(format!(
            "page size must be 1-{} and the page cap at least 1 (got {} and {})",
            MAX_PAGE_SIZE, opts.page_size, opts.max_pages
        )));
    }
    let mut table = ReportTable::new(query.header());
    let page_size = opts.page_size;
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        if pages >= opts.max_pages {
            return Err(ReportError::Truncated {
                pages,
                rows: table.rows.len(),
            });
        }

        let offset = table.rows.len();
        let request_size = match query.limit() {
            Some(limit) => page_size.min(limit - offset),
            None => page_size,
        };
        let page_no = pages + 1;
        debug!(page = page_no, offset, size = request_size, "Requesting page");

        let request = PageRequest {
            query,
            page_token: token.as_deref(),
            page_size: request_size,
        };
        let what = format!("page {}", page_no);
        let page = with_backoff(&opts.retry, &what, move || source.fetch_page(request))
            .await
            .map_err(|err| page_error(err, page_no, offset))?;
        pages += 1;

        if let Some(bad) = page.rows.iter().find(|r| r.len() != table.width()) {
            return Err(ReportError::Fetch {
                page: page_no,
                offset,
                reason: format!(
                    "row has {} cells, expected {} ({} dimensions + {} metrics)",
                    bad.len(),
                    table.width(),
                    query.dimensions().len(),
                    query.metrics().len()
                ),
            });
        }
        debug!(
            page = page_no,
            rows = page.rows.len(),
            total = ?page.row_count,
            more = page.next_page_token.is_some(),
            "Received page"
        );
        table.rows.extend(page.rows);

        if let Some(limit) = query.limit() {
            if table.rows.len() >= limit {
                table.rows.truncate(limit);
                break;
            }
        }
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    info!(rows = table.rows.len(), pages, "Fetched report");
    Ok(FetchedReport { table, pages })
}

fn page_error(err: CallError, page: usize, offset: usize) -> ReportError {
    match err {
        CallError::Transient(reason) => ReportError::Fetch {
            page,
            offset,
            reason: format!("gave up after retries: {}", reason),
        },
        CallError::Fatal(ReportError::Fetch { reason, .. }) => ReportError::Fetch {
            page,
            offset,
            reason,
        },
        CallError::Fatal(other) => other,
    }
}

// --- GA4 Data API client ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest<'a> {
    date_ranges: [ApiDateRange; 1],
    dimensions: Vec<Named<'a>>,
    metrics: Vec<Named<'a>>,
    limit: usize,
    offset: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<ApiOrderBy<'a>>,
    keep_empty_rows: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Serialize)]
struct Named<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiOrderBy<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension: Option<DimensionOrder<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metric: Option<MetricOrder<'a>>,
    desc: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DimensionOrder<'a> {
    dimension_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricOrder<'a> {
    metric_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    rows: Vec<ApiRow>,
    #[serde(default)]
    row_count: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRow {
    #[serde(default)]
    dimension_values: Vec<ApiValue>,
    #[serde(default)]
    metric_values: Vec<ApiValue>,
}

#[derive(Deserialize)]
struct ApiValue {
    #[serde(default)]
    value: String,
}

impl<'a> RunReportRequest<'a> {
    fn new(query: &'a ReportQuery, offset: usize, limit: usize) -> Self {
        let range = query.date_range();
        let order_bys = query
            .order_by()
            .map(|o| match o.field {
                OrderField::Dimension => ApiOrderBy {
                    dimension: Some(DimensionOrder {
                        dimension_name: &o.name,
                    }),
                    metric: None,
                    desc: o.descending,
                },
                OrderField::Metric => ApiOrderBy {
                    dimension: None,
                    metric: Some(MetricOrder {
                        metric_name: &o.name,
                    }),
                    desc: o.descending,
                },
            })
            .into_iter()
            .collect();
        Self {
            date_ranges: [ApiDateRange {
                start_date: range.start.format("%Y-%m-%d").to_string(),
                end_date: range.end.format("%Y-%m-%d").to_string(),
            }],
            dimensions: query.dimensions().iter().map(|n| Named { name: n }).collect(),
            metrics: query.metrics().iter().map(|n| Named { name: n }).collect(),
            limit,
            offset,
            order_bys,
            keep_empty_rows: false,
        }
    }
}

/// The Data API pages by offset. The client hands out the next offset as
/// the continuation token and stops once `rowCount` is reached.
fn to_page(response: RunReportResponse, offset: usize) -> ReportPage {
    let rows: Vec<Vec<String>> = response
        .rows
        .into_iter()
        .map(|row| {
            row.dimension_values
                .into_iter()
                .chain(row.metric_values)
                .map(|v| v.value)
                .collect()
        })
        .collect();
    let next = offset + rows.len();
    let more = !rows.is_empty() && response.row_count.is_some_and(|total| next < total);
    ReportPage {
        rows,
        next_page_token: more.then(|| next.to_string()),
        row_count: response.row_count,
    }
}

/// Client for the `runReport` method of the GA4 Data API.
pub struct Ga4Client {
    http: reqwest::Client,
    api_base: String,
    credential: Credential,
}

impl Ga4Client {
    pub fn new(
        credential: Credential,
        api_base: &str,
        timeout: std::time::Duration,
    ) -> ReportResult<Self> {
        validate_endpoint(api_base, "reporting API")?;
        Ok(Self {
            http: build_client(timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn report_url(&self, property_id: &str) -> String {
        format!("{}/properties/{}:runReport", self.api_base, property_id)
    }
}

impl PageSource for Ga4Client {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<ReportPage, CallError> {
        let offset = match request.page_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                CallError::Fatal(ReportError::Fetch {
                    page: 0,
                    offset: 0,
                    reason: format!("invalid continuation token '{}'", token),
                })
            })?,
            None => 0,
        };
        let body = RunReportRequest::new(request.query, offset, request.page_size);

        let response = self
            .http
            .post(self.report_url(request.query.property_id()))
            .header("Authorization", self.credential.bearer())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(status, &text));
        }

        let data: RunReportResponse = response.json().await?;
        Ok(to_page(data, offset))
    }
}
