use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::RowSet, writer};

/// Renders rows as a plain-text table with a dashed rule under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| cell_width(h)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }
    widths.iter_mut().for_each(|w| *w = (*w).max(3));

    let mut output = String::new();
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(output, "{}", format_line(headers, &widths));
    let _ = writeln!(output, "{}", format_line(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_line(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Table view of the first `limit` rows of `rows`, columns in output order.
pub fn render_rowset(rows: &RowSet, limit: usize) -> String {
    let headers = writer::column_order(rows);
    let body: Vec<Vec<String>> = rows
        .iter()
        .take(limit)
        .map(|row| {
            headers
                .iter()
                .map(|name| row.get(name).map(|v| v.as_key()).unwrap_or_default())
                .collect()
        })
        .collect();
    render_table(&headers, &body)
}

fn format_line(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = flatten(value);
            let pad = width.saturating_sub(cell_width(&cell));
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
