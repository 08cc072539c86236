//! Performance benchmarks for corpus indexing
//!
//! These benchmarks run over a generated corpus of Terraform documents to measure:
//! - Cold indexing, including forward references resolved lazily
//! - The fingerprint fast path when nothing changed
//! - Re-indexing a single edited document that others depend on
//! - Reference queries against a warm index
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tfindex::{
    document::SourceDocument,
    index::CorpusIndex,
    properties::SectionKey,
    query::{ReferenceQuery, Scope},
};
use url::Url;

const DOCUMENTS: usize = 50;

fn doc_uri(i: usize) -> Url {
    Url::parse(&format!("file:///bench/doc_{i:03}.tf")).unwrap()
}

// Each document declares a variable, a resource and an output, and refers to the resource of the
// next document, so half the corpus is indexed before its targets exist.
fn document_text(i: usize, revision: usize) -> String {
    let next = (i + 1) % DOCUMENTS;
    format!(
        r#"variable "size_{i}" {{
  default = {revision}
}}

resource "aws_instance" "node_{i}" {{
  count         = var.size_{i}
  instance_type = "t3.micro"
  tags = {{
    Peer = aws_instance.node_{next}.id
  }}
}}

output "node_{i}_ip" {{
  value = aws_instance.node_{i}[*].private_ip
}}
"#
    )
}

fn corpus(revision: usize) -> Vec<SourceDocument> {
    (0..DOCUMENTS)
        .map(|i| SourceDocument::from_content(doc_uri(i), document_text(i, revision)))
        .collect()
}

fn indexed_corpus() -> (CorpusIndex, Vec<SourceDocument>) {
    let index = CorpusIndex::new();
    let docs = corpus(0);
    for doc in docs.iter() {
        index.get_or_index_document(doc);
    }
    index.refresh_stale();
    (index, docs)
}

fn bench_index_corpus(c: &mut Criterion) {
    let docs = corpus(0);
    c.bench_function("index_corpus", |b| {
        b.iter(|| {
            let index = CorpusIndex::new();
            for doc in docs.iter() {
                index.get_or_index_document(doc);
            }
            index.refresh_stale();
            index.stats().resolved
        });
    });
}

fn bench_unchanged_corpus(c: &mut Criterion) {
    let (index, docs) = indexed_corpus();
    c.bench_function("unchanged_corpus", |b| {
        b.iter(|| {
            for doc in docs.iter() {
                black_box(index.get_or_index_document(doc));
            }
        });
    });
}

fn bench_edit_referenced_document(c: &mut Criterion) {
    let (index, _docs) = indexed_corpus();
    let mut revision = 0;
    c.bench_function("edit_referenced_document", |b| {
        b.iter(|| {
            revision += 1;
            let doc = SourceDocument::from_content(doc_uri(0), document_text(0, revision));
            index.get_or_index_document(&doc);
            index.refresh_stale();
        });
    });
}

fn bench_query_references(c: &mut Criterion) {
    let (index, _docs) = indexed_corpus();
    let queries: Vec<ReferenceQuery> = (0..DOCUMENTS)
        .map(|i| ReferenceQuery::new(SectionKey::new(doc_uri(i), format!("aws_instance.node_{i}"))))
        .collect();
    c.bench_function("query_references", |b| {
        b.iter(|| {
            queries
                .iter()
                .map(|q| index.query_references(&Scope::AllFiles, q).len())
                .sum::<usize>()
        });
    });
}

criterion_group!(
    benches,
    bench_index_corpus,
    bench_unchanged_corpus,
    bench_edit_referenced_document,
    bench_query_references
);
criterion_main!(benches);
