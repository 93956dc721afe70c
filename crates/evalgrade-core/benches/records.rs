use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use evalgrade_core::ca::CaCalculator;
use evalgrade_core::evaluator::StudentComponentSet;
use evalgrade_core::model::{Component, CourseType};
use evalgrade_core::record::RecordCodec;
use evalgrade_core::scale::ScaleRegistry;
use evalgrade_core::weights::{PartWeights, WeightConfig};

fn full_set(registry: &ScaleRegistry, course_type: CourseType) -> StudentComponentSet {
    let weights = PartWeights::uniform();
    let mut set = StudentComponentSet::empty("bench", "2024-25", registry, course_type);
    for (component, score) in set.ca.iter_mut() {
        let scale = registry.component_scale(course_type, *component);
        let calc = CaCalculator::new(&weights, &scale);
        for (key, max) in weights.iter() {
            calc.set_part(score, key, max * 0.8);
        }
    }
    if let Some(lab) = set.lab.as_mut() {
        for _ in 0..10 {
            lab.add_session(None);
        }
        for index in 1..=12 {
            let _ = lab.set_marks(index, 7.5);
        }
    }
    set
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_codec");
    let registry = ScaleRegistry::builtin();
    let weights: BTreeMap<Component, WeightConfig> = Component::CA
        .into_iter()
        .map(|c| (c, WeightConfig::configured(PartWeights::uniform())))
        .collect();
    let codec = RecordCodec::new(&registry, CourseType::PgIntegrated, &weights);
    let set = full_set(&registry, CourseType::PgIntegrated);
    let record = codec.encode(&set);

    group.bench_function("encode", |b| b.iter(|| codec.encode(black_box(&set))));
    group.bench_function("decode", |b| b.iter(|| codec.decode(black_box(&record))));

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
