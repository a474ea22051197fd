use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::error::{ReportError, ReportResult};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    Dimension,
    Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub name: String,
    pub field: OrderField,
    pub descending: bool,
}

/// A validated report request. Only [`QueryBuilder::build`] creates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportQuery {
    property_id: String,
    date_range: DateRange,
    dimensions: Vec<String>,
    metrics: Vec<String>,
    limit: Option<usize>,
    order_by: Option<OrderBy>,
}

impl ReportQuery {
    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    /// Column names in table order: dimensions, then metrics.
    pub fn header(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .chain(self.metrics.iter())
            .cloned()
            .collect()
    }
}

/// Unvalidated query parameters as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub property_id: String,
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub limit: Option<usize>,
    pub order_by: Option<String>,
}

impl QueryBuilder {
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            ..Self::default()
        }
    }

    pub fn dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }

    pub fn dimensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn metrics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn order_by(mut self, key: Option<String>) -> Self {
        self.order_by = key;
        self
    }

    /// Validate and freeze the query. Relative dates resolve against `today`.
    pub fn build(&self, today: NaiveDate) -> ReportResult<ReportQuery> {
        let property_id = normalize_property_id(&self.property_id)?;

        if self.metrics.is_empty() {
            return Err(ReportError::invalid_query("at least one metric is required"));
        }
        check_names("dimension", &self.dimensions)?;
        check_names("metric", &self.metrics)?;

        let dims: HashSet<&str> = self.dimensions.iter().map(String::as_str).collect();
        if let Some(both) = self.metrics.iter().find(|m| dims.contains(m.as_str())) {
            return Err(ReportError::invalid_query(format!(
                "'{}' is listed as both a dimension and a metric",
                both
            )));
        }

        let start = resolve_date(&self.start_date, today)?;
        let end = resolve_date(&self.end_date, today)?;
        if start > end {
            return Err(ReportError::invalid_query(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        if self.limit == Some(0) {
            return Err(ReportError::invalid_query("row limit must be positive"));
        }

        let order_by = match &self.order_by {
            Some(key) => Some(self.parse_order_by(key)?),
            None => None,
        };

        Ok(ReportQuery {
            property_id,
            date_range: DateRange { start, end },
            dimensions: self.dimensions.clone(),
            metrics: self.metrics.clone(),
            limit: self.limit,
            order_by,
        })
    }

    fn parse_order_by(&self, key: &str) -> ReportResult<OrderBy> {
        let (name, descending) = match key.rsplit_once(':') {
            Some((name, "desc")) => (name, true),
            Some((name, "asc")) => (name, false),
            Some((_, dir)) => {
                return Err(ReportError::invalid_query(format!(
                    "invalid sort direction '{}' (must be asc or desc)",
                    dir
                )))
            }
            None => (key, false),
        };
        let name = name.trim();
        let field = if self.dimensions.iter().any(|d| d == name) {
            OrderField::Dimension
        } else if self.metrics.iter().any(|m| m == name) {
            OrderField::Metric
        } else {
            return Err(ReportError::invalid_query(format!(
                "order key '{}' is not one of the requested dimensions or metrics",
                name
            )));
        };
        Ok(OrderBy {
            name: name.to_string(),
            field,
            descending,
        })
    }
}

/// Accepts `123456` or `properties/123456`.
fn normalize_property_id(raw: &str) -> ReportResult<String> {
    let id = raw.trim();
    let id = id.strip_prefix("properties/").unwrap_or(id);
    if id.is_empty() {
        return Err(ReportError::invalid_query("property id is empty"));
    }
    if id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(ReportError::invalid_query(format!(
            "invalid property id '{}'",
            raw
        )));
    }
    Ok(id.to_string())
}

fn check_names(kind: &str, names: &[String]) -> ReportResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ReportError::invalid_query(format!("empty {} name", kind)));
        }
        if !seen.insert(name.as_str()) {
            return Err(ReportError::invalid_query(format!(
                "duplicate {} '{}'",
                kind, name
            )));
        }
    }
    Ok(())
}

/// Parse `YYYY-MM-DD`, `today`, `yesterday` or `NdaysAgo`.
pub fn resolve_date(raw: &str, today: NaiveDate) -> ReportResult<NaiveDate> {
    let value = raw.trim();
    match value {
        "today" => return Ok(today),
        "yesterday" => {
            return today
                .pred_opt()
                .ok_or_else(|| ReportError::invalid_query(format!("invalid date '{}'", raw)))
        }
        _ => {}
    }
    if let Some(days) = value.strip_suffix("daysAgo") {
        let days: u32 = days
            .parse()
            .map_err(|_| ReportError::invalid_query(format!("invalid date '{}'", raw)))?;
        return today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| ReportError::invalid_query(format!("invalid date '{}'", raw)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ReportError::invalid_query(format!("invalid date '{}'", raw)))
}
