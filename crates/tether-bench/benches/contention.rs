//! Criterion benchmarks for clone/drop churn on a block shared by several
//! threads.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tether::Shared;
use tether_bench::contended_churn;
use tether_test_utils::DropLedger;

const ROUNDS: usize = 1_000;

/// Benchmark: `ROUNDS` clone/drop pairs per thread, 1 to 8 threads.
fn bench_contended_churn(c: &mut Criterion) {
    let ledger = DropLedger::new();
    let root = Shared::new(ledger.track(0));
    let mut group = c.benchmark_group("contended_churn");
    for threads in [1_usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &n| {
            b.iter(|| black_box(contended_churn(&root, n, ROUNDS)));
        });
    }
    group.finish();
    drop(root);
    assert_eq!(ledger.drops(0), 1);
}

criterion_group!(benches, bench_contended_churn);
criterion_main!(benches);
