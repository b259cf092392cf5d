//! Benchmarks for parsing tracer output and projecting the call graph.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tracewatch::domain::projection;
use tracewatch::domain::trace_output::TraceRecorder;
use tracewatch::infrastructure::StaticModel;

// ═══════════════════════════════════════════════════════════════════════════
// Synthetic Data Generators
// ═══════════════════════════════════════════════════════════════════════════

/// A capture of `events` events spread over `functions` traced functions,
/// each with a call stack `depth` frames deep.
fn synthetic_capture(events: usize, functions: usize, depth: usize) -> String {
    let mut text = String::from("PID     TID     COMM     FUNC     -\n");
    for event in 0..events {
        let func = event % functions;
        text.push_str(&format!("4242    4242    app      func_{}   {} tag{}\n", func, event, func));
        text.push_str(&format!("        func_{}+0x0 [app]\n", func));
        for level in 1..depth {
            text.push_str(&format!("        frame_{}_{}+0x1c [app]\n", (func + level) % functions, level));
        }
        text.push_str("        main+0x2f [app]\n\n");
    }
    text
}

// ═══════════════════════════════════════════════════════════════════════════
// Benchmarks
// ═══════════════════════════════════════════════════════════════════════════

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_trace_output");
    for events in [1_000, 10_000] {
        let capture = synthetic_capture(events, 50, 4);
        group.throughput(Throughput::Bytes(capture.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(events), &capture, |b, capture| {
            b.iter(|| TraceRecorder::parse_text(black_box(capture)))
        });
    }
    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project_graph");
    for functions in [50, 500] {
        let capture = synthetic_capture(10_000, functions, 4);
        let model = match StaticModel::load_text(&capture) {
            Ok(model) => model,
            Err(e) => panic!("synthetic capture rejected: {}", e),
        };
        group.bench_with_input(BenchmarkId::from_parameter(functions), &model, |b, model| {
            b.iter(|| projection::project(black_box(model)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_project);
criterion_main!(benches);
