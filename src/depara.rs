//! De-para code mapping: attaches the lookup file's `CÓDIGO`/`PRODUTO` to every
//! base row whose normalized `PRODUTO` matches exactly.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::{
    cli::DeparaArgs,
    data::{CellValue, Row, RowSet},
    error::{MergeError, MergeResult},
    reader, table,
    transform::string_ops::{KeyNormalization, normalize_key},
    writer,
};

pub const CODE_COLUMN: &str = "CÓDIGO";
pub const PRODUCT_COLUMN: &str = "PRODUTO";
pub const CODE_LOOKUP_COLUMN: &str = "CÓDIGO RHC";
pub const PRODUCT_LOOKUP_COLUMN: &str = "PRODUTO RHC";
pub const REQUIRED_COLUMNS: [&str; 2] = [CODE_COLUMN, PRODUCT_COLUMN];

pub const BASE_SET_NAME: &str = "base_hcm";
pub const LOOKUP_SET_NAME: &str = "base_rhc";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchStatistics {
    pub total: usize,
    pub matches: usize,
    pub rate: f64,
}

impl MatchStatistics {
    /// Counts rows of `rows` whose `CÓDIGO RHC` is filled in.
    pub fn from_rows(rows: &RowSet) -> Self {
        let total = rows.len();
        let matches = rows
            .iter()
            .filter(|row| {
                row.get(CODE_LOOKUP_COLUMN)
                    .is_some_and(|value| !value.is_blank())
            })
            .count();
        Self::new(total, matches)
    }

    pub fn new(total: usize, matches: usize) -> Self {
        let rate = if total == 0 {
            0.0
        } else {
            matches as f64 / total as f64 * 100.0
        };
        Self {
            total,
            matches,
            rate,
        }
    }

    pub fn unmatched(&self) -> usize {
        self.total.saturating_sub(self.matches)
    }

    pub fn summary_rows(&self) -> Vec<Vec<String>> {
        vec![
            vec!["total".to_string(), self.total.to_string()],
            vec!["matches".to_string(), self.matches.to_string()],
            vec!["unmatched".to_string(), self.unmatched().to_string()],
            vec!["match rate".to_string(), format!("{:.2}%", self.rate)],
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeparaOptions {
    pub normalization: KeyNormalization,
}

#[derive(Debug, Clone)]
pub struct DeparaOutcome {
    pub rows: RowSet,
    pub stats: MatchStatistics,
}

pub fn execute(args: &DeparaArgs) -> Result<()> {
    let read_options = args.input_options.read_options()?;
    info!("Reading {} from {:?}", BASE_SET_NAME, args.base);
    let base = reader::read_path(&args.base, &read_options)?;
    info!("Reading {} from {:?}", LOOKUP_SET_NAME, args.lookup);
    let lookup = reader::read_path(&args.lookup, &read_options)?;

    info!("Normalizing and merging {} row(s)", base.len());
    let options = DeparaOptions {
        normalization: if args.compat_normalization {
            KeyNormalization::Compatibility
        } else {
            KeyNormalization::Canonical
        },
    };
    let outcome = build_depara(&base, &lookup, &options)?;

    let output = args.output.resolve(writer::DEFAULT_DEPARA_FILE);
    writer::write_rows(&outcome.rows, &output, &args.output.write_options()?)
        .with_context(|| format!("Writing de-para rows to {output:?}"))?;
    report_statistics(&outcome.stats, args.stats_json.as_deref())?;
    info!("De-para written to {:?}", output);
    Ok(())
}

/// Prints the results summary and optionally stores it as JSON.
pub(crate) fn report_statistics(stats: &MatchStatistics, json_path: Option<&Path>) -> Result<()> {
    let headers = vec!["metric".to_string(), "value".to_string()];
    table::print_table(&headers, &stats.summary_rows());
    if let Some(path) = json_path {
        let json = serde_json::to_string_pretty(stats).context("Serializing match statistics")?;
        fs::write(path, json).with_context(|| format!("Writing statistics to {path:?}"))?;
    }
    Ok(())
}

/// Verifies that `rows` carries every required column in its first-row schema.
pub fn require_columns(rows: &RowSet, set_name: &str) -> MergeResult<()> {
    let missing = rows.missing_columns(&REQUIRED_COLUMNS);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MergeError::MissingColumns {
            set: set_name.to_string(),
            columns: missing,
        })
    }
}

/// Left join of `base` against `lookup` on the normalized `PRODUTO` value.
///
/// The first lookup row carrying a given key wins. Output keeps the base row
/// order and count and appends `CÓDIGO RHC`/`PRODUTO RHC`.
pub fn build_depara(
    base: &RowSet,
    lookup: &RowSet,
    options: &DeparaOptions,
) -> MergeResult<DeparaOutcome> {
    require_columns(base, BASE_SET_NAME)?;
    require_columns(lookup, LOOKUP_SET_NAME)?;

    let index = build_lookup_index(lookup, options.normalization);
    debug!("Lookup index holds {} distinct key(s)", index.len());

    let rows: RowSet = base
        .iter()
        .map(|row| {
            let key = product_key(row, options.normalization);
            let matched = index.get(&key).map(|&idx| &lookup.rows()[idx]);
            attach_lookup(row, matched)
        })
        .collect();

    let stats = MatchStatistics::from_rows(&rows);
    info!(
        "Matched {} of {} row(s) ({:.2}%)",
        stats.matches, stats.total, stats.rate
    );
    Ok(DeparaOutcome { rows, stats })
}

fn product_key(row: &Row, form: KeyNormalization) -> String {
    row.get(PRODUCT_COLUMN)
        .map(|value| normalize_key(value, form))
        .unwrap_or_default()
}

fn build_lookup_index(lookup: &RowSet, form: KeyNormalization) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(lookup.len());
    for (idx, row) in lookup.iter().enumerate() {
        index.entry(product_key(row, form)).or_insert(idx);
    }
    index
}

fn attach_lookup(base_row: &Row, matched: Option<&Row>) -> Row {
    let mut out = base_row.clone();
    let (code, product) = match matched {
        Some(found) => (
            found.value_or_empty(CODE_COLUMN),
            found.value_or_empty(PRODUCT_COLUMN),
        ),
        None => (CellValue::blank(), CellValue::blank()),
    };
    out.insert(CODE_LOOKUP_COLUMN, code);
    out.insert(PRODUCT_LOOKUP_COLUMN, product);
    out
}
