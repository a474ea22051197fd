use serde::Serialize;

/// One response unit from the reporting API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPage {
    /// Cells aligned to dimensions, then metrics.
    pub rows: Vec<Vec<String>>,
    pub next_page_token: Option<String>,
    /// Total matching rows as reported by the API.
    pub row_count: Option<usize>,
}

/// Fully materialized report: header plus every row in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Rewrite compact `YYYYMMDD` values in the `date` column to `YYYY-MM-DD`.
    /// Values in any other shape are left alone.
    pub fn normalize_dates(&mut self) {
        let Some(col) = self.column_index("date") else {
            return;
        };
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(col) {
                if let Some(iso) = compact_to_iso(cell) {
                    *cell = iso;
                }
            }
        }
    }
}

fn compact_to_iso(value: &str) -> Option<String> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    chrono::NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}
