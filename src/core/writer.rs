use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::{debug, info};

use crate::core::error::{ReportError, ReportResult};
use crate::core::table::ReportTable;

pub const DEFAULT_SHEET_NAME: &str = "Report";

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub sheet_name: String,
    /// Columns written as numbers when the cell parses as one.
    pub numeric_columns: Vec<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            numeric_columns: Vec::new(),
        }
    }
}

/// Render `table` as a single-sheet workbook in memory.
pub fn render_workbook(table: &ReportTable, opts: &WriterOptions) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let numeric: HashSet<usize> = opts
        .numeric_columns
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();

    let sheet = workbook.add_worksheet();
    sheet.set_name(&opts.sheet_name)?;

    for (col, name) in table.header.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &header_format)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match numeric
                .contains(&col)
                .then(|| cell.trim().parse::<f64>().ok())
                .flatten()
                .filter(|v| v.is_finite())
            {
                Some(value) => sheet.write_number(r, c, value)?,
                None => sheet.write_string(r, c, cell)?,
            };
        }
    }

    workbook.save_to_buffer()
}

/// Write the workbook to `path` atomically: the bytes go to a temp file in
/// the target directory which is then renamed over `path`. On failure the
/// temp file is removed and any previous file at `path` is left as it was.
pub fn write_workbook(table: &ReportTable, path: &Path, opts: &WriterOptions) -> ReportResult<()> {
    let bytes = render_workbook(table, opts).map_err(|e| ReportError::write(path, e))?;

    let dir = target_dir(path);
    if !dir.is_dir() {
        return Err(ReportError::write(
            path,
            format!("directory {} does not exist", dir.display()),
        ));
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(".ga4xl-")
        .suffix(".xlsx.tmp")
        .tempfile_in(&dir)
        .map_err(|e| ReportError::write(path, e))?;
    debug!(tmp = %tmp.path().display(), bytes = bytes.len(), "Writing workbook");

    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ReportError::write(path, e))?;
    tmp.persist(path)
        .map_err(|e| ReportError::write(path, e.error))?;

    info!(
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.width(),
        "Wrote workbook"
    );
    Ok(())
}

fn target_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};

    fn sample() -> ReportTable {
        ReportTable {
            header: vec!["date".into(), "country".into(), "sessions".into(), "bounceRate".into()],
            rows: vec![
                vec!["2024-01-01".into(), "US".into(), "10".into(), "0.4213".into()],
                vec!["2024-01-02".into(), "DE".into(), "12".into(), "n/a".into()],
            ],
        }
    }

    fn read_back(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
        let mut wb: Xlsx<_> = open_workbook(path).unwrap();
        let range = wb.worksheet_range(sheet).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn writes_header_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_workbook(&sample(), &path, &WriterOptions::default()).unwrap();

        let rows = read_back(&path, "Report");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Data::String("date".into()));
        assert_eq!(rows[0][3], Data::String("bounceRate".into()));
        assert_eq!(rows[1][0], Data::String("2024-01-01".into()));
        assert_eq!(rows[2][1], Data::String("DE".into()));
        // no numeric columns requested -> text
        assert_eq!(rows[1][2], Data::String("10".into()));
    }

    #[test]
    fn numeric_columns_become_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let opts = WriterOptions {
            sheet_name: "GA4".into(),
            numeric_columns: vec!["sessions".into(), "bounceRate".into(), "missing".into()],
        };
        write_workbook(&sample(), &path, &opts).unwrap();

        let rows = read_back(&path, "GA4");
        assert_eq!(rows[1][2], Data::Float(10.0));
        assert_eq!(rows[1][3], Data::Float(0.4213));
        // unparseable numeric cells fall back to text
        assert_eq!(rows[2][3], Data::String("n/a".into()));
        assert_eq!(rows[1][1], Data::String("US".into()));
    }

    #[test]
    fn empty_table_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let table = ReportTable::new(vec!["date".into(), "activeUsers".into()]);
        write_workbook(&table, &path, &WriterOptions::default()).unwrap();

        let rows = read_back(&path, "Report");
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec![Data::String("date".into()), Data::String("activeUsers".into())]
        );
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, b"stale").unwrap();
        write_workbook(&sample(), &path, &WriterOptions::default()).unwrap();
        assert_eq!(read_back(&path, "Report").len(), 3);
    }

    #[test]
    fn missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("such").join("report.xlsx");
        match write_workbook(&sample(), &path, &WriterOptions::default()) {
            Err(ReportError::Write { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("does not exist"));
            }
            other => panic!("expected write error, got {:?}", other),
        }
        assert!(!path.exists());
    }

    #[test]
    fn invalid_sheet_name_is_write_error_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let opts = WriterOptions {
            sheet_name: "bad[name]".into(),
            ..WriterOptions::default()
        };
        assert!(matches!(
            write_workbook(&sample(), &path, &opts),
            Err(ReportError::Write { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_workbook(&sample(), &path, &WriterOptions::default()).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["report.xlsx".to_string()]);
    }
}
