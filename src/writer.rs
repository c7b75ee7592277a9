//! Workbook writer: serializes merged rows to a single-sheet `.xlsx` file, or
//! to delimited text when the output path (or an explicit delimiter) asks for it.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools;
use log::debug;
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::{
    data::{CellValue, RowSet},
    error::{MergeError, MergeResult},
    io_utils,
};

pub const DEFAULT_SHEET_NAME: &str = "Resultado";
pub const DEFAULT_MERGE_FILE: &str = "resultado.xlsx";
pub const DEFAULT_DEPARA_FILE: &str = "resultado_de_para.xlsx";
pub const DEFAULT_FUZZY_FILE: &str = "resultado_fuzzy.xlsx";

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub sheet_name: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

/// Header order: the first row's columns, then unseen columns in order of first appearance.
pub fn column_order(rows: &RowSet) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.columns())
        .unique()
        .map(str::to_string)
        .collect()
}

pub fn write_rows(rows: &RowSet, path: &Path, options: &WriteOptions) -> MergeResult<()> {
    match io_utils::resolve_output_delimiter(path, options.delimiter) {
        Some(delimiter) => write_delimited(rows, path, delimiter, options.encoding),
        None => {
            let bytes = workbook_bytes(rows, &options.sheet_name)?;
            debug!("Serialized workbook: {} byte(s)", bytes.len());
            if io_utils::is_dash(path) {
                io::stdout()
                    .lock()
                    .write_all(&bytes)
                    .map_err(|err| MergeError::Write(err.to_string()))
            } else {
                fs::write(path, bytes)
                    .map_err(|err| MergeError::Write(format!("{}: {err}", path.display())))
            }
        }
    }
}

/// Serializes `rows` into an in-memory `.xlsx` workbook with one sheet.
pub fn workbook_bytes(rows: &RowSet, sheet_name: &str) -> MergeResult<Vec<u8>> {
    build_workbook(rows, sheet_name).map_err(|err| MergeError::Write(err.to_string()))
}

fn build_workbook(rows: &RowSet, sheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let columns = column_order(rows);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let line = (idx + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            match row.get(name) {
                Some(CellValue::Text(text)) if !text.is_empty() => {
                    worksheet.write_string(line, col as u16, text)?;
                }
                Some(CellValue::Number(number)) => {
                    worksheet.write_number(line, col as u16, *number)?;
                }
                Some(CellValue::Text(_) | CellValue::Empty) | None => {}
            }
        }
    }
    workbook.save_to_buffer()
}

fn write_delimited(
    rows: &RowSet,
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> MergeResult<()> {
    let to_write_error = |err: anyhow::Error| MergeError::Write(format!("{err:#}"));
    let columns = column_order(rows);
    let mut writer = io_utils::open_csv_writer(path, delimiter, encoding).map_err(to_write_error)?;
    writer
        .write_record(&columns)
        .map_err(|err| MergeError::Write(err.to_string()))?;
    for row in rows {
        let record = columns
            .iter()
            .map(|name| row.get(name).map(CellValue::as_key).unwrap_or_default());
        writer
            .write_record(record)
            .map_err(|err| MergeError::Write(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| MergeError::Write(err.to_string()))
}
