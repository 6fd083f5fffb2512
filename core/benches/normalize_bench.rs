use criterion::{criterion_group, criterion_main, Criterion};
use scholar_core::text::normalize;

fn bench_normalize(c: &mut Criterion) {
    let text = "Advances in Gas Turbine Design: we present combustion stability \
        measurements across industrial turbines, comparing thermal models against \
        experimental results from 2019 to 2024. The proposed methodology reduces \
        simulation costs while preserving accuracy for researchers and students."
        .repeat(50);
    c.bench_function("normalize_abstract", |b| b.iter(|| normalize(&text)));
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
