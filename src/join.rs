use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    cli::MergeArgs,
    data::{CellValue, Row, RowSet},
    error::{MergeError, MergeResult, Side},
    reader, writer,
};

pub const LEFT_PREFIX: &str = "A_";
pub const RIGHT_PREFIX: &str = "B_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinSummary {
    pub left_rows: usize,
    pub right_rows: usize,
    pub output_rows: usize,
    pub matched_left_rows: usize,
}

pub fn execute(args: &MergeArgs) -> Result<()> {
    let read_options = args.input_options.read_options()?;
    info!("Reading file A from {:?}", args.a);
    let left = reader::read_path(&args.a, &read_options)?;
    info!("Reading file B from {:?}", args.b);
    let right = reader::read_path(&args.b, &read_options)?;
    debug!("File A columns: {:?}", left.columns());
    debug!("File B columns: {:?}", right.columns());

    info!("Merging on A.{} = B.{}", args.key_a, args.key_b);
    let (merged, summary) = merge_rows_with_summary(&left, &right, &args.key_a, &args.key_b)?;

    let output = args.output.resolve(writer::DEFAULT_MERGE_FILE);
    writer::write_rows(&merged, &output, &args.output.write_options()?)
        .with_context(|| format!("Writing merged rows to {output:?}"))?;
    info!(
        "Merge complete: {} output row(s), {} of {} row(s) from A matched; written to {:?}",
        summary.output_rows, summary.matched_left_rows, summary.left_rows, output
    );
    Ok(())
}

/// Left outer join of `left` against `right` on the stringified key columns.
///
/// Every right row sharing a key produces its own output row, so duplicate
/// keys on the right multiply the matching left row. Output columns are the
/// first-row columns of `left` prefixed `A_` followed by those of `right`
/// prefixed `B_`.
pub fn merge_rows(left: &RowSet, right: &RowSet, key_a: &str, key_b: &str) -> MergeResult<RowSet> {
    merge_rows_with_summary(left, right, key_a, key_b).map(|(rows, _)| rows)
}

pub fn merge_rows_with_summary(
    left: &RowSet,
    right: &RowSet,
    key_a: &str,
    key_b: &str,
) -> MergeResult<(RowSet, JoinSummary)> {
    if key_a.is_empty() {
        return Err(MergeError::MissingKey { side: Side::A });
    }
    if key_b.is_empty() {
        return Err(MergeError::MissingKey { side: Side::B });
    }

    let left_columns = left.columns();
    let right_columns = right.columns();
    let lookup = build_right_lookup(right, key_b);
    debug!("Right lookup holds {} distinct key(s)", lookup.len());

    let mut output = Vec::with_capacity(left.len());
    let mut summary = JoinSummary {
        left_rows: left.len(),
        right_rows: right.len(),
        ..JoinSummary::default()
    };

    for left_row in left {
        let key = key_of(left_row, key_a);
        match lookup.get(key.as_str()) {
            Some(bucket) if !bucket.is_empty() => {
                summary.matched_left_rows += 1;
                for right_row in bucket {
                    output.push(combine(
                        left_row,
                        &left_columns,
                        Some(right_row),
                        &right_columns,
                    ));
                }
            }
            _ => output.push(combine(left_row, &left_columns, None, &right_columns)),
        }
    }

    summary.output_rows = output.len();
    Ok((RowSet::new(output), summary))
}

fn key_of(row: &Row, column: &str) -> String {
    row.get(column).map(CellValue::as_key).unwrap_or_default()
}

fn build_right_lookup<'a>(right: &'a RowSet, key: &str) -> HashMap<String, Vec<&'a Row>> {
    let mut map: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in right {
        map.entry(key_of(row, key)).or_default().push(row);
    }
    map
}

fn combine(
    left_row: &Row,
    left_columns: &[String],
    right_row: Option<&Row>,
    right_columns: &[String],
) -> Row {
    let mut combined = Row::with_capacity(left_columns.len() + right_columns.len());
    for column in left_columns {
        combined.insert(
            format!("{LEFT_PREFIX}{column}"),
            left_row.value_or_empty(column),
        );
    }
    for column in right_columns {
        let value = right_row
            .map(|row| row.value_or_empty(column))
            .unwrap_or_else(CellValue::blank);
        combined.insert(format!("{RIGHT_PREFIX}{column}"), value);
    }
    combined
}
