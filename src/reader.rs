//! Tabular reader: turns the bytes of an uploaded spreadsheet into a [`RowSet`].
//!
//! Only the first sheet of a workbook is read. The first row of the used
//! range supplies the column names; every data row carries every column, with
//! missing cells filled in as empty text.

use std::{collections::HashSet, io::Cursor, path::Path};

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{CellValue, Row, RowSet},
    error::{MergeError, MergeResult},
    io_utils,
};

const EMPTY_HEADER: &str = "__EMPTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Delimited { delimiter: u8 },
}

impl SourceFormat {
    /// Picks the parser from an explicit delimiter or the file extension.
    pub fn detect(path: &Path, delimiter: Option<u8>) -> Self {
        match delimiter.or_else(|| io_utils::delimiter_for_extension(path)) {
            Some(delimiter) => SourceFormat::Delimited { delimiter },
            None => SourceFormat::Workbook,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// Reads `path` fully into memory and parses it.
pub fn read_path(path: &Path, options: &ReadOptions) -> Result<RowSet> {
    let bytes = io_utils::read_input_bytes(path)?;
    let format = SourceFormat::detect(path, options.delimiter);
    debug!("Parsing {:?} as {:?} ({} bytes)", path, format, bytes.len());
    let rows = read_rows(bytes, format, options.encoding, &path.display().to_string())
        .with_context(|| format!("Reading rows from {path:?}"))?;
    Ok(rows)
}

pub fn read_rows(
    bytes: Vec<u8>,
    format: SourceFormat,
    encoding: &'static Encoding,
    source_name: &str,
) -> MergeResult<RowSet> {
    let grid = match format {
        SourceFormat::Workbook => workbook_grid(bytes, source_name)?,
        SourceFormat::Delimited { delimiter } => {
            delimited_grid(&bytes, delimiter, encoding, source_name)?
        }
    };
    Ok(rows_from_grid(grid))
}

fn workbook_grid(bytes: Vec<u8>, source_name: &str) -> MergeResult<Vec<Vec<CellValue>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| MergeError::unreadable(source_name, err))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|err| MergeError::unreadable(source_name, err))?,
        None => return Ok(Vec::new()),
    };
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::text(b.to_string()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(err) => CellValue::Text(err.to_string()),
    }
}

fn delimited_grid(
    bytes: &[u8],
    delimiter: u8,
    encoding: &'static Encoding,
    source_name: &str,
) -> MergeResult<Vec<Vec<CellValue>>> {
    let text = io_utils::decode_bytes(bytes, encoding)
        .map_err(|err| MergeError::unreadable(source_name, err))?;
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
    let mut grid = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            MergeError::unreadable(source_name, format!("line {}: {err}", idx + 1))
        })?;
        grid.push(record.iter().map(CellValue::text).collect());
    }
    Ok(grid)
}

fn rows_from_grid(grid: Vec<Vec<CellValue>>) -> RowSet {
    let lines: Vec<Vec<CellValue>> = grid
        .into_iter()
        .skip_while(|cells| cells.iter().all(CellValue::is_blank))
        .collect();
    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines = lines.into_iter();
    let Some(mut header_cells) = lines.next() else {
        return RowSet::default();
    };
    // Data cells past the header row get `__EMPTY` columns instead of being dropped.
    header_cells.resize(width, CellValue::Empty);
    let headers = unique_headers(&header_cells);

    lines
        .filter(|cells| !cells.iter().all(CellValue::is_blank))
        .map(|cells| {
            let mut row = Row::with_capacity(headers.len());
            let mut values = cells.into_iter();
            for name in &headers {
                let value = match values.next() {
                    Some(CellValue::Empty) | None => CellValue::blank(),
                    Some(value) => value,
                };
                row.insert(name.clone(), value);
            }
            row
        })
        .collect()
}

/// Names blank headers `__EMPTY`, `__EMPTY_1`, ... and suffixes repeated names with `_1`, `_2`, ...
fn unique_headers(cells: &[CellValue]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(cells.len());
    for cell in cells {
        let base = match cell.as_key() {
            name if name.is_empty() => EMPTY_HEADER.to_string(),
            name => name,
        };
        let mut candidate = base.clone();
        let mut counter = 1usize;
        while seen.contains(&candidate) {
            candidate = format!("{base}_{counter}");
            counter += 1;
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn csv(text: &str) -> RowSet {
        read_rows(
            text.as_bytes().to_vec(),
            SourceFormat::Delimited { delimiter: b',' },
            UTF_8,
            "test.csv",
        )
        .expect("parse csv")
    }

    #[test]
    fn short_rows_are_padded_with_empty_text() {
        let rows = csv("id,name,qty\n1,Sabão\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.columns(), vec!["id", "name", "qty"]);
        assert_eq!(rows.rows()[0].get("qty"), Some(&CellValue::blank()));
    }

    #[test]
    fn cells_past_the_header_get_empty_columns() {
        let rows = csv("id,name\n1,a,extra\n2,b\n");
        assert_eq!(rows.columns(), vec!["id", "name", "__EMPTY"]);
        assert_eq!(rows.rows()[0].get("__EMPTY"), Some(&CellValue::text("extra")));
        assert_eq!(rows.rows()[1].get("__EMPTY"), Some(&CellValue::blank()));
    }

    #[test]
    fn workbook_booleans_stringify_like_keys() {
        assert_eq!(cell_from_data(&Data::Bool(true)), CellValue::text("true"));
        assert_eq!(cell_from_data(&Data::Bool(false)).as_key(), "false");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let rows = csv("id,name\n1,a\n,\n2,b\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn header_is_first_non_blank_line() {
        let rows = csv(",,\nid,name\n1,a\n");
        assert_eq!(rows.columns(), vec!["id", "name"]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn duplicate_and_blank_headers_are_disambiguated() {
        let rows = csv("id,id,,\n1,2,3,4\n");
        assert_eq!(rows.columns(), vec!["id", "id_1", "__EMPTY", "__EMPTY_1"]);
    }

    #[test]
    fn header_only_file_has_empty_schema() {
        let rows = csv("CÓDIGO,PRODUTO\n");
        assert!(rows.is_empty());
        assert!(rows.columns().is_empty());
    }

    #[test]
    fn garbage_bytes_are_unreadable_as_workbook() {
        let err = read_rows(
            b"definitely not a workbook".to_vec(),
            SourceFormat::Workbook,
            UTF_8,
            "broken.xlsx",
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::Unreadable { .. }));
        assert!(err.to_string().contains("broken.xlsx"));
    }

    #[test]
    fn detect_prefers_explicit_delimiter() {
        assert_eq!(
            SourceFormat::detect(Path::new("a.xlsx"), Some(b';')),
            SourceFormat::Delimited { delimiter: b';' }
        );
        assert_eq!(
            SourceFormat::detect(Path::new("a.xlsx"), None),
            SourceFormat::Workbook
        );
    }
}
