//! Microbenchmarks for the line parsing hot path.
//!
//! Measures parse latency by label count and the cost of reading fields back
//! out of a finished record.
//!
//! Run with: `cargo bench -p promsample -- parse`

#![allow(missing_docs)]

use std::fmt::Write as _;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use promsample::clock::FixedClock;
use promsample::{ParserConfig, SampleParser};

fn parser() -> SampleParser<FixedClock> {
    SampleParser::new(ParserConfig::default())
        .unwrap()
        .with_clock(FixedClock::new(1_700_000_000_000))
}

/// Builds a line with `labels` labels in the shape node_exporter emits.
fn line_with_labels(labels: usize) -> String {
    let mut line = String::from("node_network_receive_bytes_total");
    if labels > 0 {
        line.push('{');
        for i in 0..labels {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "label_{i}=\"value_{i}\"");
        }
        line.push('}');
    }
    line.push_str(" 123456789.5 1700000000000");
    line
}

fn bench_parse_documented_line(c: &mut Criterion) {
    let parser = parser();
    let line = r#"http_requests_total{method="post",code="200"} 1027 1395066363000"#;

    c.bench_function("parse/documented_line", |b| {
        b.iter(|| parser.parse(black_box(line)).unwrap());
    });
}

fn bench_parse_label_count(c: &mut Criterion) {
    let parser = parser();
    let mut group = c.benchmark_group("parse/label_count");

    for count in [0, 1, 4, 16, 64] {
        let line = line_with_labels(count);
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &line, |b, line| {
            b.iter(|| parser.parse(black_box(line)).unwrap());
        });
    }

    group.finish();
}

fn bench_parse_rejected(c: &mut Criterion) {
    let parser = parser();
    let line = r#"http_requests_total{method="post",code="200"}"#;

    c.bench_function("parse/rejected_missing_value", |b| {
        b.iter(|| parser.parse(black_box(line)).unwrap_err());
    });
}

fn bench_read_fields(c: &mut Criterion) {
    let record = parser().parse(&line_with_labels(16)).unwrap();

    c.bench_function("record/read_all_fields", |b| {
        b.iter(|| {
            let record = black_box(&record);
            let mut label_bytes = 0;
            for label in record.labels() {
                label_bytes += label.name.len() + label.value.len();
            }
            (record.name().len(), label_bytes, record.value(), record.timestamp())
        });
    });
}

criterion_group!(
    benches,
    bench_parse_documented_line,
    bench_parse_label_count,
    bench_parse_rejected,
    bench_read_fields,
);
criterion_main!(benches);
