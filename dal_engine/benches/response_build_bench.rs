use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dal_engine::document::DocumentCodec;
use dal_engine::{AttrCode, Element, JsonDocumentCodec, QueryResponse};

fn catalog(rows: usize) -> Element {
    let mut table = Element::new("TABLE")
        .with_child(Element::new("PARAM").with_attr("name", "epoch").with_attr("value", "J2000"));
    for (name, ucd) in [
        ("id", "meta.id;meta.main"),
        ("ra", "pos.eq.ra;meta.main"),
        ("dec", "pos.eq.dec;meta.main"),
        ("mag", "phot.mag"),
    ] {
        table = table.with_child(Element::new("FIELD").with_attr("name", name).with_attr("ucd", ucd));
    }
    let tabledata = Element::new("TABLEDATA").with_children((0..rows).map(|i| {
        Element::tr([
            format!("src_{}", i),
            format!("{:.6}", i as f64 * 0.001),
            format!("{:.6}", -45.0 + i as f64 * 0.0005),
            format!("{:.2}", 12.0 + (i % 700) as f64 / 100.0),
        ])
    }));
    Element::new("VOTABLE").with_child(
        Element::new("RESOURCE").with_child(table.with_child(Element::new("DATA").with_child(tabledata))),
    )
}

fn benchmark_build_1000_rows(c: &mut Criterion) {
    let doc = catalog(1000);
    c.bench_function("build_response_1000_rows", |b| {
        b.iter(|| black_box(QueryResponse::from_document(black_box(&doc), 0, 0)))
    });
}

fn benchmark_parse_and_build_10000_rows(c: &mut Criterion) {
    let text = serde_json::to_string(&catalog(10_000)).unwrap_or_default();
    let codec = JsonDocumentCodec::new();
    c.bench_function("parse_and_build_10000_rows", |b| {
        b.iter(|| {
            let root = codec.parse(black_box(&text)).ok();
            black_box(root.map(|r| QueryResponse::from_document(&r, 0, 0)))
        })
    });
}

fn benchmark_float_column(c: &mut Criterion) {
    let doc = catalog(10_000);
    let Ok(qr) = QueryResponse::from_document(&doc, 0, 0) else {
        return;
    };
    let ra = qr.field_index("pos.eq.ra;meta.main", AttrCode::Ucd).unwrap_or(2);
    let mut out = vec![0.0; qr.record_count()];
    c.bench_function("float_column_10000_rows", |b| {
        b.iter(|| black_box(qr.float_column(black_box(ra), &mut out)))
    });
}

criterion_group!(
    benches,
    benchmark_build_1000_rows,
    benchmark_parse_and_build_10000_rows,
    benchmark_float_column
);
criterion_main!(benches);
