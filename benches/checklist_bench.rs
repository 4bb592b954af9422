use std::path::PathBuf;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cfdi_check::cfdi::{self, CfdiValidator, MemoryInvoiceStore, MemoryProviderCatalog};
use cfdi_check::core::ValidatorConfig;
use cfdi_check::xml::Document;

fn schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/xsd")
}

fn invoice() -> Vec<u8> {
    include_bytes!("../tests/fixtures/cfdi/ingreso_timbrado.xml").to_vec()
}

/// The fixture invoice with `n` concept lines instead of one.
fn invoice_with_concepts(n: usize) -> Vec<u8> {
    let xml = String::from_utf8(invoice()).unwrap();
    let start = xml.find("<cfdi:Concepto ").unwrap();
    let end = xml.find("</cfdi:Concepto>").unwrap() + "</cfdi:Concepto>".len();
    let concept = &xml[start..end];
    let many = vec![concept; n].join("\n    ");
    xml.replacen(concept, &many, 1).into_bytes()
}

fn bench_parse(c: &mut Criterion) {
    let xml = invoice();
    c.bench_function("parse_cfdi", |b| {
        b.iter(|| black_box(Document::parse(black_box(&xml))));
    });
}

fn bench_strip(c: &mut Criterion) {
    let doc = Document::parse(&invoice()).unwrap();
    c.bench_function("strip_for_schema", |b| {
        b.iter(|| black_box(cfdi::strip_for_schema(black_box(&doc))));
    });
}

fn bench_extract(c: &mut Criterion) {
    let doc = Document::parse(&invoice()).unwrap();
    c.bench_function("extract_fields", |b| {
        b.iter(|| black_box(cfdi::extract_fields(black_box(&doc))));
    });
}

fn bench_load_schema(c: &mut Criterion) {
    c.bench_function("load_schema", |b| {
        b.iter(|| black_box(CfdiValidator::new(ValidatorConfig::with_schema_dir(schema_dir()))));
    });
}

fn bench_checklist(c: &mut Criterion) {
    let validator = CfdiValidator::new(ValidatorConfig::with_schema_dir(schema_dir()));
    let xml = invoice();
    c.bench_function("build_checklist", |b| {
        b.iter(|| black_box(validator.build_checklist(black_box(&xml))));
    });

    let big = invoice_with_concepts(500);
    c.bench_function("build_checklist_500_concepts", |b| {
        b.iter(|| black_box(validator.build_checklist(black_box(&big))));
    });
}

fn bench_validate_with_rules(c: &mut Criterion) {
    let validator = CfdiValidator::new(ValidatorConfig::with_schema_dir(schema_dir()));
    let catalog = MemoryProviderCatalog::new([(1, "EKU9003173C9")]);
    let store = MemoryInvoiceStore::new();
    let xml = invoice();
    c.bench_function("validate_with_business_rules", |b| {
        b.iter(|| black_box(validator.validate(black_box(&xml), &catalog, &store)));
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_strip,
    bench_extract,
    bench_load_schema,
    bench_checklist,
    bench_validate_with_rules,
);
criterion_main!(benches);
