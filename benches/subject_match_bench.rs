// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for `matches_pattern()` across subject depth and wildcard mix.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use relay_subject::matches_pattern;

fn literal_subject(depth: usize) -> String {
    (0..depth).map(|i| format!("tok{i}")).collect::<Vec<_>>().join(".")
}

fn bench_literal_match_by_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("matches_pattern_literal_by_depth");
    for depth in [1, 4, 8, 16] {
        let subject = literal_subject(depth);
        let pattern = subject.clone();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &(subject, pattern), |b, (s, p)| {
            b.iter(|| matches_pattern(black_box(s), black_box(p)));
        });
    }
    group.finish();
}

fn bench_wildcard_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("matches_pattern_wildcard_variants");
    let subject = "relay.agent.sess-01.turn.7";
    let cases = [
        ("trailing_gt", "relay.agent.>"),
        ("single_star", "relay.*.sess-01.turn.7"),
        ("mixed_star_gt", "relay.*.*.>"),
        ("no_match_literal", "relay.human.sess-01.turn.7"),
    ];
    for (name, pattern) in cases {
        group.bench_with_input(BenchmarkId::new("case", name), &pattern, |b, p| {
            b.iter(|| matches_pattern(black_box(subject), black_box(p)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_literal_match_by_depth, bench_wildcard_variants);
criterion_main!(benches);
