use std::hint::black_box;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use sheet_merge::data::{CellValue, Row, RowSet};
use sheet_merge::depara::{DeparaOptions, build_depara};
use sheet_merge::fuzzy::{FuzzyOptions, build_fuzzy};
use sheet_merge::join::merge_rows;
use sheet_merge::reader::{ReadOptions, read_path};
use sheet_merge::writer::{WriteOptions, write_rows};
use tempfile::TempDir;

const FORMS: [&str; 4] = ["comp", "AMP", "fr 100 ml", "envelope"];
const NAMES: [&str; 5] = ["Dipirona", "Água destilada", "Sabão", "Paracetamol", "Luva"];

fn generate_products(rows: usize, upper: bool) -> RowSet {
    (0..rows)
        .map(|i| {
            let name = NAMES[i % NAMES.len()];
            let form = FORMS[i % FORMS.len()];
            let mut product = format!("{name} {}mg {form} {}", (i % 7 + 1) * 100, i / 20);
            if upper {
                product = product.to_uppercase();
            }
            let mut row = Row::with_capacity(3);
            row.insert("CÓDIGO", CellValue::Number(i as f64));
            row.insert("PRODUTO", CellValue::Text(product));
            row.insert("UNIDADE", CellValue::text(if i % 2 == 0 { "UN" } else { "CX" }));
            row
        })
        .collect()
}

fn generate_workbook(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let path = temp_dir.path().join("base_hcm.xlsx");
    write_rows(&generate_products(rows, false), &path, &WriteOptions::default())
        .expect("write workbook");
    (temp_dir, path)
}

fn bench_join_paths(c: &mut Criterion) {
    let base = generate_products(20_000, false);
    let lookup = generate_products(20_000, true);

    let mut group = c.benchmark_group("join_paths");

    group.bench_function("merge_on_codigo", |b| {
        b.iter(|| {
            merge_rows(black_box(&base), black_box(&lookup), "CÓDIGO", "CÓDIGO").expect("merge")
        });
    });

    group.bench_function("depara_on_produto", |b| {
        b.iter(|| {
            build_depara(black_box(&base), black_box(&lookup), &DeparaOptions::default())
                .expect("depara")
        });
    });

    let small_base = generate_products(1_000, false);
    let small_lookup = generate_products(1_000, true);
    group.bench_function("fuzzy_on_produto", |b| {
        b.iter(|| {
            build_fuzzy(
                black_box(&small_base),
                black_box(&small_lookup),
                &FuzzyOptions::default(),
            )
            .expect("fuzzy")
        });
    });

    group.finish();
}

fn bench_workbook_read(c: &mut Criterion) {
    let (temp_dir, path) = generate_workbook(20_000);
    let options = ReadOptions::default();

    c.bench_function("read_first_sheet", |b| {
        b.iter_batched(
            || (),
            |_| read_path(&path, &options).expect("read workbook"),
            BatchSize::SmallInput,
        );
    });

    drop(temp_dir);
}

criterion_group!(benches, bench_join_paths, bench_workbook_read);
criterion_main!(benches);
