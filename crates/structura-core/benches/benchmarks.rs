use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;

use chrono::NaiveDate;
use structura_core::config::{DiffConfig, ExpandConfig};
use structura_core::diff::{compute_hunks, diff_tree};
use structura_core::parse_schema;
use structura_core::render::{expand, Bindings};

const SCHEMA: &str = r#"<template>
  <hooks><post-create>git init</post-create></hooks>
  <folder name="%PROJECT:kebab-case%">
    <file name="README.md"># %PROJECT%

Created %DATE% by %AUTHOR%.
</file>
    <folder name="src">
      <repeat count="%MODULES%" as="m">
        <folder name="module_%m_1%">
          <file name="mod.rs">pub mod %PROJECT:snake_case%_%m%;</file>
          <file name="tests.rs"/>
        </folder>
      </repeat>
    </folder>
    <if var="DOCKER">
      <file name="Dockerfile">FROM rust:1</file>
    </if>
    <else>
      <file name="run.sh">cargo run</file>
    </else>
  </folder>
</template>"#;

fn sample_bindings() -> Bindings {
    let mut values = BTreeMap::new();
    values.insert("PROJECT".to_string(), "BenchProject".to_string());
    values.insert("AUTHOR".to_string(), "Benchmark User".to_string());
    values.insert("MODULES".to_string(), "50".to_string());
    values.insert("DOCKER".to_string(), "true".to_string());
    Bindings::from_map(&values, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).with_builtins(None)
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_schema", |b| {
        b.iter(|| {
            let tree = parse_schema(black_box(SCHEMA)).unwrap();
            black_box(tree)
        });
    });
}

fn bench_expand(c: &mut Criterion) {
    let tree = parse_schema(SCHEMA).unwrap();
    let bindings = sample_bindings();
    let config = ExpandConfig::default();

    c.bench_function("expand (50 repeats)", |b| {
        b.iter(|| {
            let concrete = expand(black_box(&tree), black_box(&bindings), &config);
            black_box(concrete)
        });
    });
}

fn bench_diff_tree(c: &mut Criterion) {
    let tree = parse_schema(SCHEMA).unwrap();
    let concrete = expand(&tree, &sample_bindings(), &ExpandConfig::default());
    let target = tempfile::tempdir().unwrap();
    let config = DiffConfig::default();

    c.bench_function("diff_tree (empty target)", |b| {
        b.iter(|| {
            let result = diff_tree(black_box(&concrete), target.path(), true, &config);
            black_box(result)
        });
    });
}

fn bench_hunks(c: &mut Criterion) {
    let old: String = (0..2000).map(|i| format!("line {i}\n")).collect();
    let new: String = (0..2000)
        .map(|i| {
            if i % 97 == 0 {
                format!("changed {i}\n")
            } else {
                format!("line {i}\n")
            }
        })
        .collect();

    c.bench_function("compute_hunks (2000 lines)", |b| {
        b.iter(|| {
            let hunks = compute_hunks(black_box(&old), black_box(&new), 3, 200);
            black_box(hunks)
        });
    });
}

criterion_group!(benches, bench_parse, bench_expand, bench_diff_tree, bench_hunks);
criterion_main!(benches);
