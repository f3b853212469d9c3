use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use docmatch::similarity::{TermProfile, score, score_profiles};

const LEFT: &str = "memorandum for the record subject quarterly procurement review northern \
    district office vendor assessments budget allocations staffing recommendations prepared \
    by the oversight committee following the site visit of the regional inspector";

const RIGHT: &str = "quarterly procurement review memorandum northern district vendor \
    assessments and budget allocations with staffing recommendations from the oversight \
    committee after the regional inspector site visit redacted pursuant to exemption";

fn bench_score(c: &mut Criterion) {
    c.bench_function("similarity_score_pair", |b| {
        b.iter(|| black_box(score(black_box(LEFT), black_box(RIGHT))));
    });
}

fn bench_profiles(c: &mut Criterion) {
    let left = TermProfile::new(LEFT);
    let others: Vec<TermProfile> = (0..1_000)
        .map(|i| TermProfile::new(&format!("{RIGHT} appendix{i}")))
        .collect();

    c.bench_function("similarity_profile_1000_pairs", |b| {
        b.iter(|| {
            let kept = others
                .iter()
                .filter(|other| score_profiles(&left, other) >= 0.6)
                .count();
            black_box(kept);
        });
    });
}

criterion_group!(benches, bench_score, bench_profiles);
criterion_main!(benches);
