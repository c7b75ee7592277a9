use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{fuzzy, io_utils, reader::ReadOptions, writer::WriteOptions};

#[derive(Debug, Parser)]
#[command(author, version, about = "Join spreadsheets and build de-para code mappings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Left-join file A against file B on one key column per file
    Merge(MergeArgs),
    /// Map base products to lookup codes by normalized PRODUTO name
    Depara(DeparaArgs),
    /// Map base products to lookup codes by name similarity
    Fuzzy(FuzzyArgs),
    /// Show the columns, row count and first rows of a spreadsheet
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Parse inputs as delimited text with this delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl InputArgs {
    pub fn read_options(&self) -> Result<ReadOptions> {
        Ok(ReadOptions {
            delimiter: self.delimiter,
            encoding: io_utils::resolve_encoding(self.input_encoding.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output file; `.csv`/`.tsv` write delimited text, anything else `.xlsx`
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Force delimited output with this delimiter
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for delimited output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Worksheet name for workbook output
    #[arg(long = "sheet-name", default_value = crate::writer::DEFAULT_SHEET_NAME)]
    pub sheet_name: String,
}

impl OutputArgs {
    pub fn resolve(&self, default_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_name))
    }

    pub fn write_options(&self) -> Result<WriteOptions> {
        Ok(WriteOptions {
            delimiter: self.output_delimiter,
            encoding: io_utils::resolve_encoding(self.output_encoding.as_deref())?,
            sheet_name: self.sheet_name.clone(),
        })
    }
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// File A (every row is kept)
    #[arg(short = 'a', long = "file-a")]
    pub a: PathBuf,
    /// File B (looked up by key)
    #[arg(short = 'b', long = "file-b")]
    pub b: PathBuf,
    /// Key column in file A
    #[arg(long = "key-a")]
    pub key_a: String,
    /// Key column in file B
    #[arg(long = "key-b")]
    pub key_b: String,
    #[command(flatten)]
    pub input_options: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct DeparaArgs {
    /// Base file (base_hcm); needs CÓDIGO and PRODUTO columns
    #[arg(long)]
    pub base: PathBuf,
    /// Lookup file (base_rhc); needs CÓDIGO and PRODUTO columns
    #[arg(long)]
    pub lookup: PathBuf,
    /// Use compatibility decomposition (NFKD) when normalizing product names
    #[arg(long = "compat-normalization")]
    pub compat_normalization: bool,
    /// Also write the match statistics as JSON to this path
    #[arg(long = "stats-json")]
    pub stats_json: Option<PathBuf>,
    #[command(flatten)]
    pub input_options: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct FuzzyArgs {
    /// Base file (base_hcm); needs CÓDIGO and PRODUTO columns
    #[arg(long)]
    pub base: PathBuf,
    /// Lookup file (base_rhc); needs CÓDIGO and PRODUTO columns
    #[arg(long)]
    pub lookup: PathBuf,
    /// Minimum similarity (0.0 - 1.0) for a match
    #[arg(long, default_value_t = fuzzy::DEFAULT_THRESHOLD, value_parser = parse_threshold)]
    pub threshold: f64,
    /// Also write the match statistics as JSON to this path
    #[arg(long = "stats-json")]
    pub stats_json: Option<PathBuf>,
    #[command(flatten)]
    pub input_options: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Spreadsheet to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    #[command(flatten)]
    pub input_options: InputArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_threshold(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err("Threshold must lie between 0.0 and 1.0".to_string())
    }
}
