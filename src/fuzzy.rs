//! Similarity-based product matching for names that differ in spelling,
//! abbreviations or word order.
//!
//! Each base row is compared only with lookup rows sharing at least one
//! significant token. The best scoring candidate is accepted when its score
//! reaches the threshold.
//!
//! Score = 0.35 * character sequence ratio + 0.65 * overlap of the first five
//! words, +0.15 when both names carry the same dosages (-0.15 when they
//! differ), +0.2 when both name the same brand in parentheses, clamped to
//! `[0, 1]`.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use similar::TextDiff;

use crate::{
    cli::FuzzyArgs,
    data::{CellValue, Row, RowSet},
    depara::{
        self, BASE_SET_NAME, CODE_COLUMN, CODE_LOOKUP_COLUMN, DeparaOutcome, LOOKUP_SET_NAME,
        MatchStatistics, PRODUCT_COLUMN, PRODUCT_LOOKUP_COLUMN,
    },
    error::{MergeError, MergeResult},
    reader,
    transform::string_ops::{KeyNormalization, normalize_text},
    writer,
};

pub const SIMILARITY_COLUMN: &str = "SIMILARIDADE";
pub const DEFAULT_THRESHOLD: f64 = 0.75;

const MIN_TOKEN_CHARS: usize = 3;
const LEADING_TOKENS: usize = 5;
const SEQUENCE_WEIGHT: f64 = 0.35;
const OVERLAP_WEIGHT: f64 = 0.65;
const CONCENTRATION_ADJUSTMENT: f64 = 0.15;
const BRAND_BONUS: f64 = 0.2;
const PROGRESS_EVERY: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct FuzzyOptions {
    pub threshold: f64,
    pub normalization: KeyNormalization,
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            normalization: KeyNormalization::Canonical,
        }
    }
}

pub fn execute(args: &FuzzyArgs) -> Result<()> {
    let read_options = args.input_options.read_options()?;
    info!("Reading {} from {:?}", BASE_SET_NAME, args.base);
    let base = reader::read_path(&args.base, &read_options)?;
    info!("Reading {} from {:?}", LOOKUP_SET_NAME, args.lookup);
    let lookup = reader::read_path(&args.lookup, &read_options)?;

    info!("Similarity threshold: {:.2}", args.threshold);
    let options = FuzzyOptions {
        threshold: args.threshold,
        ..FuzzyOptions::default()
    };
    let outcome = build_fuzzy(&base, &lookup, &options)?;

    let output = args.output.resolve(writer::DEFAULT_FUZZY_FILE);
    writer::write_rows(&outcome.rows, &output, &args.output.write_options()?)
        .with_context(|| format!("Writing similarity matches to {output:?}"))?;
    depara::report_statistics(&outcome.stats, args.stats_json.as_deref())?;
    info!("Similarity matches written to {:?}", output);
    Ok(())
}

/// Matches every base row against its most similar lookup product.
///
/// Row order and count follow `base`. Matched rows get the lookup code,
/// product and the similarity as a percentage; unmatched rows get blanks.
pub fn build_fuzzy(
    base: &RowSet,
    lookup: &RowSet,
    options: &FuzzyOptions,
) -> MergeResult<DeparaOutcome> {
    if !(0.0..=1.0).contains(&options.threshold) {
        return Err(MergeError::InvalidThreshold(options.threshold));
    }
    depara::require_columns(base, BASE_SET_NAME)?;
    depara::require_columns(lookup, LOOKUP_SET_NAME)?;

    let matcher = ProductMatcher::new(lookup, options.normalization);
    debug!("Token index holds {} token(s)", matcher.token_count());

    let mut rows = Vec::with_capacity(base.len());
    let mut matched = 0usize;
    for (idx, row) in base.iter().enumerate() {
        let product = row
            .get(PRODUCT_COLUMN)
            .map(CellValue::as_key)
            .unwrap_or_default();
        let best = matcher
            .best_match(&product)
            .filter(|(_, score)| *score >= options.threshold);
        if best.is_some() {
            matched += 1;
        }
        rows.push(attach_match(row, best.map(|(i, s)| (&lookup.rows()[i], s))));
        if (idx + 1) % PROGRESS_EVERY == 0 {
            info!(
                "Processed {}/{} row(s) ({} match(es) so far)",
                idx + 1,
                base.len(),
                matched
            );
        }
    }

    let rows = RowSet::new(rows);
    let stats = MatchStatistics::from_rows(&rows);
    info!(
        "Matched {} of {} row(s) ({:.2}%)",
        stats.matches, stats.total, stats.rate
    );
    Ok(DeparaOutcome { rows, stats })
}

fn attach_match(base_row: &Row, best: Option<(&Row, f64)>) -> Row {
    let mut out = base_row.clone();
    match best {
        Some((found, score)) => {
            out.insert(CODE_LOOKUP_COLUMN, found.value_or_empty(CODE_COLUMN));
            out.insert(PRODUCT_LOOKUP_COLUMN, found.value_or_empty(PRODUCT_COLUMN));
            out.insert(
                SIMILARITY_COLUMN,
                CellValue::Text(format!("{:.2}%", score * 100.0)),
            );
        }
        None => {
            out.insert(CODE_LOOKUP_COLUMN, CellValue::blank());
            out.insert(PRODUCT_LOOKUP_COLUMN, CellValue::blank());
            out.insert(SIMILARITY_COLUMN, CellValue::blank());
        }
    }
    out
}

/// Pre-normalized lookup products with an inverted token index.
pub struct ProductMatcher {
    products: Vec<ProductFeatures>,
    tokens: HashMap<String, Vec<usize>>,
    form: KeyNormalization,
}

/// Normalized name plus the dosage and brand markers used for scoring.
#[derive(Debug, Clone)]
struct ProductFeatures {
    name: String,
    concentrations: BTreeSet<String>,
    brand: Option<String>,
}

impl ProductFeatures {
    fn new(raw: &str, form: KeyNormalization) -> Self {
        let name = normalize_product_name(raw, form);
        Self {
            concentrations: extract_concentrations(&name),
            brand: extract_brand(&name),
            name,
        }
    }
}

impl ProductMatcher {
    pub fn new(lookup: &RowSet, form: KeyNormalization) -> Self {
        let products: Vec<ProductFeatures> = lookup
            .iter()
            .map(|row| {
                let raw = row
                    .get(PRODUCT_COLUMN)
                    .map(CellValue::as_key)
                    .unwrap_or_default();
                ProductFeatures::new(&raw, form)
            })
            .collect();
        let mut tokens: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, product) in products.iter().enumerate() {
            let unique: BTreeSet<&str> = significant_tokens(&product.name).collect();
            for token in unique {
                tokens.entry(token.to_string()).or_default().push(idx);
            }
        }
        Self {
            products,
            tokens,
            form,
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Best scoring lookup row for `product`; ties keep the earliest row.
    pub fn best_match(&self, product: &str) -> Option<(usize, f64)> {
        let input = ProductFeatures::new(product, self.form);
        let candidates: BTreeSet<usize> = significant_tokens(&input.name)
            .filter_map(|token| self.tokens.get(token))
            .flatten()
            .copied()
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for idx in candidates {
            let score = score_features(&input, &self.products[idx]);
            if best.is_none_or(|(_, current)| score > current) {
                best = Some((idx, score));
            }
        }
        best.filter(|(_, score)| *score > 0.0)
    }
}

/// Similarity between two raw product names in `[0, 1]`.
pub fn similarity(left: &str, right: &str) -> f64 {
    let form = KeyNormalization::Canonical;
    score_features(
        &ProductFeatures::new(left, form),
        &ProductFeatures::new(right, form),
    )
}

fn score_features(left: &ProductFeatures, right: &ProductFeatures) -> f64 {
    let sequence = f64::from(TextDiff::from_chars(left.name.as_str(), right.name.as_str()).ratio());

    let left_words: HashSet<&str> = left.name.split_whitespace().take(LEADING_TOKENS).collect();
    let right_words: HashSet<&str> = right.name.split_whitespace().take(LEADING_TOKENS).collect();
    let shared = left_words.intersection(&right_words).count();
    let overlap = shared as f64 / left_words.len().max(right_words.len()).max(1) as f64;

    let concentration = if left.concentrations.is_empty() || right.concentrations.is_empty() {
        0.0
    } else if left.concentrations == right.concentrations {
        CONCENTRATION_ADJUSTMENT
    } else {
        -CONCENTRATION_ADJUSTMENT
    };
    let brand = match (&left.brand, &right.brand) {
        (Some(a), Some(b)) if a == b => BRAND_BONUS,
        _ => 0.0,
    };

    (sequence * SEQUENCE_WEIGHT + overlap * OVERLAP_WEIGHT + concentration + brand).clamp(0.0, 1.0)
}

/// Uppercases, strips accents and expands common dosage-form abbreviations.
pub fn normalize_product_name(text: &str, form: KeyNormalization) -> String {
    let base = normalize_text(text, form);
    let mut words: Vec<&str> = Vec::new();
    for token in base.split_whitespace() {
        if let Some(rest) = token.strip_prefix("C/") {
            words.push("COM");
            words.extend(Some(rest).filter(|r| !r.is_empty()));
        } else if let Some(rest) = token.strip_prefix("S/") {
            words.push("SEM");
            words.extend(Some(rest).filter(|r| !r.is_empty()));
        } else {
            words.push(expand_abbreviation(token));
        }
    }
    words.join(" ")
}

fn expand_abbreviation(token: &str) -> &str {
    match token {
        "COMP" | "COMP." | "CPR" | "CPR." => "COMPRIMIDO",
        "AMP" | "AMP." => "AMPOLA",
        "FA" | "FA." | "FR" | "FR." => "FRASCO",
        "ENV" | "ENV." => "ENVELOPE",
        "MG." => "MG",
        "ML." => "ML",
        "G." => "G",
        other => other,
    }
}

fn significant_tokens(name: &str) -> impl Iterator<Item = &str> {
    name.split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
}

fn concentration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\d+(?:[.,]\d+)?\s*(?:MG\s*/\s*\d+(?:[.,]\d+)?\s*ML|MCG|MG|ML|UI|GRAMAS?|GR|G|%)",
        )
        .expect("concentration pattern is valid")
    })
}

fn brand_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([A-Z]+)\)").expect("brand pattern is valid"))
}

/// Dosages such as `500MG`, `2.5%` or `100MG/5ML`, with inner whitespace removed
/// and gram spellings (`GR`, `GRAMA`, `GRAMAS`) folded to `G`.
pub fn extract_concentrations(name: &str) -> BTreeSet<String> {
    concentration_pattern()
        .find_iter(name)
        .map(|m| {
            let compact: String = m.as_str().chars().filter(|c| !c.is_whitespace()).collect();
            fold_gram_unit(compact)
        })
        .collect()
}

fn fold_gram_unit(dosage: String) -> String {
    for unit in ["GRAMAS", "GRAMA", "GR"] {
        if let Some(amount) = dosage.strip_suffix(unit) {
            return format!("{amount}G");
        }
    }
    dosage
}

/// Brand written in parentheses, e.g. `NEOSALDINA` in `DIPIRONA (NEOSALDINA)`.
pub fn extract_brand(name: &str) -> Option<String> {
    brand_pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
