use criterion::{criterion_group, criterion_main, Criterion};
use pstmodel::_internal_test_data::{RANDOM_MODEL, RANDOM_SEQUENCES};
use pstmodel::fragment::SequenceFragment;
use pstmodel::model::Model;

fn score_automaton(c: &mut Criterion) {
    let sequence = RANDOM_SEQUENCES[0].clone();

    c.bench_function("Score 1k symbols with automaton", |b| {
        b.iter(|| RANDOM_MODEL.score_bytes(&sequence, true).unwrap())
    });
}

fn score_tree(c: &mut Criterion) {
    let model = Model::Tree(RANDOM_MODEL.tree().clone());
    let sequence = RANDOM_SEQUENCES[0].clone();

    c.bench_function("Score 1k symbols with tree", |b| {
        b.iter(|| model.score_bytes(&sequence, true).unwrap())
    });
}

fn score_all_fragments(c: &mut Criterion) {
    let fragments: Vec<_> = RANDOM_SEQUENCES
        .iter()
        .enumerate()
        .map(|(i, sequence)| SequenceFragment::new(format!("seq{}", i), sequence.clone()))
        .collect();

    c.bench_function("Score 32 fragments in parallel", |b| {
        b.iter(|| RANDOM_MODEL.score_all(&fragments, false))
    });
}

criterion_group!(benches, score_automaton, score_tree, score_all_fragments);
criterion_main!(benches);
