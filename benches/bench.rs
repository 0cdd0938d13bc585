use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use sort_test_tools::patterns;

fn pattern_set() -> Vec<(&'static str, fn(usize) -> Vec<i32>)> {
    vec![
        ("random", patterns::random),
        ("random_d20", |len| patterns::random_uniform(len, 0..20)),
        ("ascending", patterns::ascending),
        ("descending", patterns::descending),
        ("saw_mixed", |len| patterns::saw_mixed(len, 32)),
        ("pipe_organ", patterns::pipe_organ),
    ]
}

fn bench_sorts(c: &mut Criterion) {
    for len in [1_000, 100_000] {
        let mut group = c.benchmark_group(format!("i32_len_{len}"));

        for (pattern_name, pattern_fn) in pattern_set() {
            group.bench_with_input(
                BenchmarkId::new("timsort_stable", pattern_name),
                &len,
                |b, &len| {
                    b.iter_batched_ref(
                        || pattern_fn(len),
                        |v| timsort::sort(v),
                        BatchSize::LargeInput,
                    )
                },
            );

            group.bench_with_input(
                BenchmarkId::new("rust_std_stable", pattern_name),
                &len,
                |b, &len| {
                    b.iter_batched_ref(|| pattern_fn(len), |v| v.sort(), BatchSize::LargeInput)
                },
            );
        }

        group.finish();
    }
}

criterion_group!(benches, bench_sorts);
criterion_main!(benches);
