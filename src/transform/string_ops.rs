use std::borrow::Cow;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::data::CellValue;

/// Decomposition applied before combining marks are stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyNormalization {
    /// Canonical decomposition (NFD).
    #[default]
    Canonical,
    /// Compatibility decomposition (NFKD); also folds ligatures, ordinals and the like.
    Compatibility,
}

/// Builds the matching key for a cell: decomposed, diacritics removed, uppercased, trimmed.
pub fn normalize_key(value: &CellValue, form: KeyNormalization) -> String {
    normalize_text(&value.as_key(), form)
}

pub fn normalize_text(input: &str, form: KeyNormalization) -> String {
    let stripped = strip_diacritics(input, form);
    let upper = uppercase(&stripped);
    trim(&upper).into_owned()
}

/// Removes every combining mark after decomposing `input`.
pub fn strip_diacritics(input: &str, form: KeyNormalization) -> Cow<'_, str> {
    if input.is_ascii() {
        return Cow::Borrowed(input);
    }
    let stripped: String = match form {
        KeyNormalization::Canonical => input.nfd().filter(|ch| !is_combining_mark(*ch)).collect(),
        KeyNormalization::Compatibility => {
            input.nfkd().filter(|ch| !is_combining_mark(*ch)).collect()
        }
    };
    Cow::Owned(stripped)
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input
        .chars()
        .all(|ch| ch.to_uppercase().eq(std::iter::once(ch)))
    {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

/// Trims leading/trailing whitespace while borrowing the original when unchanged.
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(input: &str) -> Cow<'_, str> {
    let mut previous_space = true;
    let needs_work = input.chars().any(|ch| {
        let is_space = ch.is_whitespace();
        let bad = is_space && (previous_space || ch != ' ');
        previous_space = is_space;
        bad
    }) || input.ends_with(char::is_whitespace);
    if !needs_work {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.split_whitespace().collect::<Vec<_>>().join(" "))
}
