// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for `enforce()` across ancestor-chain length and outcome.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use relay_envelope::budget::{enforce, Budget};

fn budget_with_chain(len: usize) -> Budget {
    Budget {
        hop_count: 0,
        max_hops: (len as u32) + 5,
        ancestor_chain: (0..len).map(|i| format!("relay.agent.ep{i}")).collect(),
        ttl: i64::MAX,
        call_budget_remaining: 10,
    }
}

fn bench_enforce_admit_by_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforce_admit_by_chain_length");
    for len in [0, 8, 16, 32] {
        let budget = budget_with_chain(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &budget, |b, budget| {
            b.iter(|| enforce(black_box(budget), black_box("relay.agent.new"), Some(0)).unwrap());
        });
    }
    group.finish();
}

fn bench_enforce_rejection_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforce_rejection_paths");

    let hops_exhausted = Budget {
        hop_count: 5,
        max_hops: 5,
        ancestor_chain: Vec::new(),
        ttl: i64::MAX,
        call_budget_remaining: 10,
    };
    group.bench_function("max_hops_exceeded", |b| {
        b.iter(|| enforce(black_box(&hops_exhausted), black_box("relay.agent.x"), Some(0)));
    });

    let cyclic = budget_with_chain(4);
    let repeat_endpoint = cyclic.ancestor_chain[2].clone();
    group.bench_function("cycle_detected", |b| {
        b.iter(|| enforce(black_box(&cyclic), black_box(&repeat_endpoint), Some(0)));
    });

    let expired = Budget {
        hop_count: 0,
        max_hops: 5,
        ancestor_chain: Vec::new(),
        ttl: 0,
        call_budget_remaining: 10,
    };
    group.bench_function("ttl_expired", |b| {
        b.iter(|| enforce(black_box(&expired), black_box("relay.agent.x"), Some(1)));
    });

    let exhausted_calls = Budget {
        hop_count: 0,
        max_hops: 5,
        ancestor_chain: Vec::new(),
        ttl: i64::MAX,
        call_budget_remaining: 0,
    };
    group.bench_function("call_budget_exhausted", |b| {
        b.iter(|| enforce(black_box(&exhausted_calls), black_box("relay.agent.x"), Some(0)));
    });

    group.finish();
}

criterion_group!(benches, bench_enforce_admit_by_chain_length, bench_enforce_rejection_paths);
criterion_main!(benches);
