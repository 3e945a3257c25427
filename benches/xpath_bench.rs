#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlweave::stylesheet::{Processor, Stylesheet, StylesheetError};
use xmlweave::xpath::XPath;
use xmlweave::{Document, NodeId};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a catalog with 500 books across a few genres.
fn make_catalog_xml() -> String {
    let genres = ["fiction", "science", "history", "poetry"];
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog>\n");
    for i in 0..500 {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\" genre=\"{}\"><title>Title {i}</title>\
             <author>Author {}</author><price>{}.50</price></book>",
            genres[i % genres.len()],
            i % 37,
            5 + i % 40
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

/// Generates an article with nested sections and inline markup.
fn make_article_xml() -> String {
    let mut xml = String::from("<article><title>Bench</title>");
    for i in 0..100 {
        let _ = write!(
            xml,
            "<section><title>Section {i}</title>\
             <para>Some <em>inline</em> text {i}.</para>\
             <para>More text.</para></section>"
        );
    }
    xml.push_str("</article>");
    xml
}

// ---------------------------------------------------------------------------
// XPath benchmarks
// ---------------------------------------------------------------------------

const COMPLEX: &str = "//book[@genre='fiction' and number(price) > 20][position() < 10]/title";

fn bench_compile(c: &mut Criterion) {
    c.bench_function("xpath_compile", |b| {
        b.iter(|| XPath::compile(black_box(COMPLEX)).expect("compile failed"));
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog_xml()).expect("failed to parse catalog");
    let xpath = XPath::compile("sum(//price) div count(//book)").expect("compile failed");
    c.bench_function("xpath_evaluate", |b| {
        b.iter(|| xpath.evaluate(black_box(&doc), doc.root()));
    });
}

fn bench_select_predicate(c: &mut Criterion) {
    let doc = Document::parse_str(&make_catalog_xml()).expect("failed to parse catalog");
    let xpath = XPath::compile(COMPLEX).expect("compile failed");
    c.bench_function("xpath_select_predicate", |b| {
        b.iter(|| xpath.select_nodes(black_box(&doc), doc.root()));
    });
}

// ---------------------------------------------------------------------------
// Stylesheet benchmark
// ---------------------------------------------------------------------------

fn wrap(open: &'static str, close: &'static str) -> impl Fn(&mut Processor<'_>, NodeId) -> Result<(), StylesheetError> + Send + Sync {
    move |p: &mut Processor<'_>, node: NodeId| -> Result<(), StylesheetError> {
        p.write(open);
        p.apply_templates(node)?;
        p.write(close);
        Ok(())
    }
}

fn bench_stylesheet_run(c: &mut Criterion) {
    let doc = Document::parse_str(&make_article_xml()).expect("failed to parse article");
    let mut style = Stylesheet::new();
    style.add("article/title", wrap("# ", "\n")).expect("bad pattern");
    style.add("section/title", wrap("## ", "\n")).expect("bad pattern");
    style.add("para", wrap("", "\n\n")).expect("bad pattern");
    style.add("em", wrap("*", "*")).expect("bad pattern");
    c.bench_function("stylesheet_run", |b| {
        b.iter(|| style.run(black_box(&doc), doc.root(), None).expect("run failed"));
    });
}

criterion_group!(xpath, bench_compile, bench_evaluate, bench_select_predicate);

criterion_group!(stylesheet, bench_stylesheet_run);

criterion_main!(xpath, stylesheet);
