#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use sheet_merge::data::{CellValue, Row, RowSet};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes a one-sheet workbook: `headers` on row 0, then `rows`.
    /// Cells that parse as numbers are written as numbers; `""` leaves the cell empty.
    pub fn write_xlsx(&self, name: &str, headers: &[&str], rows: &[&[&str]]) -> PathBuf {
        let path = self.join(name);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).expect("header");
        }
        for (idx, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let line = (idx + 1) as u32;
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(number) => sheet.write_number(line, col as u16, number),
                    Err(_) => sheet.write_string(line, col as u16, *cell),
                }
                .expect("cell");
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }
}

pub fn text_row(cells: &[(&str, &str)]) -> Row {
    cells.iter().map(|(k, v)| (*k, *v)).collect()
}

pub fn text_rows(rows: &[&[(&str, &str)]]) -> RowSet {
    rows.iter().map(|cells| text_row(cells)).collect()
}

pub fn cell<'a>(rows: &'a RowSet, index: usize, column: &str) -> &'a CellValue {
    rows.rows()[index]
        .get(column)
        .unwrap_or_else(|| panic!("row {index} has no column {column}"))
}
