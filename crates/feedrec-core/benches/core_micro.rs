use criterion::{black_box, criterion_group, criterion_main, Bencher, BenchmarkId, Criterion, Throughput};
use feedrec_core::types::{Candidate, ItemKind};

fn gen_candidate(i: usize) -> Candidate {
    let mut c = Candidate::new(i as i64, ItemKind::Content);
    c.title = Some(format!("post #{i}"));
    c.tags = vec!["rust".to_string(), "systems".to_string()];
    c.match_score = Some(0.5 + (i % 10) as f64 / 20.0);
    c
}

fn bench_candidate_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_candidate_creation");
    for &n in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("create_candidates", n), &n, |b: &mut Bencher, &n| {
            b.iter(|| {
                let candidates: Vec<_> = (0..n).map(gen_candidate).collect();
                black_box(candidates)
            })
        });
    }
    group.finish();
}

fn bench_json_serde(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_candidate_json_serde");
    for &n in &[100usize, 1_000] {
        let dataset: Vec<_> = (0..n).map(gen_candidate).collect();
        let encoded = serde_json::to_vec(&dataset).unwrap();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("serialize_vec", n), &n, |b: &mut Bencher, _| {
            b.iter(|| {
                let bytes = serde_json::to_vec(black_box(&dataset)).unwrap();
                black_box(bytes)
            })
        });

        group.bench_with_input(BenchmarkId::new("deserialize_vec", n), &n, |b: &mut Bencher, _| {
            b.iter(|| {
                let v: Vec<Candidate> = serde_json::from_slice(black_box(&encoded)).unwrap();
                black_box(v)
            })
        });
    }
    group.finish();
}

fn bench_best_score_precedence(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_score_precedence");
    let candidates: Vec<_> = (0..10_000).map(gen_candidate).collect();

    group.throughput(Throughput::Elements(candidates.len() as u64));
    group.bench_function("best_score", |b| {
        b.iter(|| {
            let total: f64 = candidates.iter().map(|c| c.best_score()).sum();
            black_box(total)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_candidate_creation, bench_json_serde, bench_best_score_precedence);
criterion_main!(benches);
