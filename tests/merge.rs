mod common;

use common::{cell, text_rows};
use proptest::prelude::*;
use sheet_merge::{
    data::{CellValue, Row, RowSet},
    error::MergeError,
    join::{merge_rows, merge_rows_with_summary},
};

#[test]
fn duplicate_b_keys_emit_one_row_per_match() {
    let a = text_rows(&[&[("id", "1"), ("name", "x")]]);
    let b = text_rows(&[&[("id", "1"), ("val", "a")], &[("id", "1"), ("val", "b")]]);

    let merged = merge_rows(&a, &b, "id", "id").expect("merge");

    assert_eq!(merged.len(), 2);
    assert_eq!(cell(&merged, 0, "A_id"), &CellValue::text("1"));
    assert_eq!(cell(&merged, 1, "A_name"), &CellValue::text("x"));
    assert_eq!(cell(&merged, 0, "B_val"), &CellValue::text("a"));
    assert_eq!(cell(&merged, 1, "B_val"), &CellValue::text("b"));
}

#[test]
fn unmatched_a_row_keeps_blank_b_columns() {
    let a = text_rows(&[&[("id", "2")]]);
    let b = text_rows(&[&[("id", "1")]]);

    let merged = merge_rows(&a, &b, "id", "id").expect("merge");

    assert_eq!(merged.len(), 1);
    assert_eq!(cell(&merged, 0, "B_id"), &CellValue::text(""));
}

#[test]
fn output_columns_are_a_then_b_prefixed() {
    let a = text_rows(&[&[("code", "1"), ("desc", "x")]]);
    let b = text_rows(&[&[("sku", "1"), ("price", "9")]]);

    let merged = merge_rows(&a, &b, "code", "sku").expect("merge");
    let columns: Vec<&str> = merged.rows()[0].columns().collect();

    assert_eq!(columns, vec!["A_code", "A_desc", "B_sku", "B_price"]);
}

#[test]
fn output_follows_a_order() {
    let a = text_rows(&[&[("id", "3")], &[("id", "1")], &[("id", "2")]]);
    let b = text_rows(&[&[("id", "1")], &[("id", "2")], &[("id", "3")]]);

    let merged = merge_rows(&a, &b, "id", "id").expect("merge");
    let order: Vec<String> = merged
        .iter()
        .map(|row| row.get("A_id").map(CellValue::as_key).unwrap_or_default())
        .collect();

    assert_eq!(order, vec!["3", "1", "2"]);
}

#[test]
fn empty_b_keeps_every_a_row() {
    let a = text_rows(&[&[("id", "1")], &[("id", "2")]]);
    let merged = merge_rows(&a, &RowSet::default(), "id", "id").expect("merge");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.columns(), vec!["A_id"]);
}

#[test]
fn blank_key_selection_fails_without_output() {
    let a = text_rows(&[&[("id", "1")]]);
    let err = merge_rows(&a, &a, "", "").expect_err("missing key");
    assert!(matches!(err, MergeError::MissingKey { .. }));
}

fn key_sets() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (
        prop::collection::vec(0u8..6, 0..20),
        prop::collection::vec(0u8..6, 0..20),
    )
}

fn rows_from_keys(keys: &[u8], column: &str) -> RowSet {
    keys.iter()
        .enumerate()
        .map(|(idx, key)| {
            let mut row = Row::new();
            row.insert("id", CellValue::Number(f64::from(*key)));
            row.insert(column, CellValue::text(idx.to_string()));
            row
        })
        .collect()
}

proptest! {
    #[test]
    fn output_count_is_sum_of_max_one_and_matches((left, right) in key_sets()) {
        let a = rows_from_keys(&left, "left_pos");
        let b = rows_from_keys(&right, "right_pos");
        let expected: usize = left
            .iter()
            .map(|key| right.iter().filter(|other| *other == key).count().max(1))
            .sum();

        let (merged, summary) = merge_rows_with_summary(&a, &b, "id", "id").unwrap();

        prop_assert_eq!(merged.len(), expected);
        prop_assert!(merged.len() >= a.len());
        prop_assert_eq!(summary.output_rows, expected);
    }

    #[test]
    fn matched_b_rows_keep_their_relative_order((left, right) in key_sets()) {
        let a = rows_from_keys(&left, "left_pos");
        let b = rows_from_keys(&right, "right_pos");
        let merged = merge_rows(&a, &b, "id", "id").unwrap();

        let positions: Vec<(usize, Option<usize>)> = merged
            .iter()
            .map(|row| {
                let left_pos = row.get("A_left_pos").unwrap().as_key().parse().unwrap();
                let right_pos = row.get("B_right_pos").and_then(|v| v.as_key().parse().ok());
                (left_pos, right_pos)
            })
            .collect();
        for pair in positions.windows(2) {
            prop_assert!(pair[0].0 <= pair[1].0);
            if pair[0].0 == pair[1].0 {
                prop_assert!(pair[0].1 < pair[1].1);
            }
        }
    }
}
