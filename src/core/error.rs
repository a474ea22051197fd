use std::path::PathBuf;
use thiserror::Error;

/// Fatal error classes of a report run. Every variant aborts the run and
/// no workbook is produced.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    InvalidQuery(String),
    #[error("page {page} (row offset {offset}) failed: {reason}")]
    Fetch {
        page: usize,
        offset: usize,
        reason: String,
    },
    #[error(
        "result truncated after {pages} pages ({rows} rows); \
         narrow the date range or add a row limit"
    )]
    Truncated { pages: usize, rows: usize },
    #[error("cannot write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

impl ReportError {
    /// Short name of the failing stage, used as the message prefix.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Authentication(_) => "authentication",
            Self::InvalidQuery(_) => "query",
            Self::Fetch { .. } => "fetch",
            Self::Truncated { .. } => "truncated",
            Self::Write { .. } => "write",
        }
    }

    /// Process exit code. 1 is left for unexpected errors and 2 for
    /// command-line usage errors reported by clap.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 3,
            Self::Authentication(_) => 4,
            Self::InvalidQuery(_) => 5,
            Self::Fetch { .. } => 6,
            Self::Truncated { .. } => 7,
            Self::Write { .. } => 8,
        }
    }

    pub(crate) fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
