use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use pstmodel::_internal_test_data::{
    abcd_spectrum, RANDOM_MODEL, RANDOM_MODEL_DEPTH, RANDOM_SEQUENCES, RANDOM_SPECTRUM,
};
use pstmodel::alphabet::Alphabet;
use pstmodel::fragment::SequenceFragment;
use pstmodel::learner::{learn, LearnParams};
use pstmodel::model::{CombineOp, Model, UnsupportedOperation};
use pstmodel::scorer::ScoringError;
use pstmodel::smoothing::{BackoffSmoother, FloorSmoother, ModelProcessor, ProcessorChain};
use pstmodel::spectrum::{KmerSpectrum, SpectrumSource};

fn learn_random(automaton: bool) -> Model {
    let params = LearnParams::builder()
        .max_depth(RANDOM_MODEL_DEPTH)
        .automaton(automaton)
        .build();
    learn(&params, &*RANDOM_SPECTRUM, None).unwrap()
}

#[test_log::test]
fn test_learned_model_is_nontrivial() {
    let model = &*RANDOM_MODEL;

    assert!(model.is_automaton());
    assert!(model.size() > 1 + 4);
    assert!(model.depth() >= 2);
    assert!(model.depth() <= RANDOM_MODEL_DEPTH);
    assert_eq!(model.alphabet(), &Alphabet::nucleotides());
}

#[test_log::test]
fn test_learned_tree_matches_spectrum() {
    let model = learn_random(false);
    let tree = model.tree();

    for id in tree.breadth_first() {
        let node = tree.node(id);
        for &symbol in tree.alphabet().symbols() {
            let expected = RANDOM_SPECTRUM
                .conditional_probability(symbol, node.context())
                .unwrap_or(0.0);
            assert_abs_diff_eq!(
                tree.conditional_probability(symbol, node.context()).unwrap(),
                expected,
                epsilon = 1e-9
            );
        }
    }
}

#[test_log::test]
fn test_automaton_agrees_with_tree() {
    let tree_model = learn_random(false);
    let automaton_model = learn_random(true);
    let tree = tree_model.tree();

    assert!(tree_model.equal_value(&automaton_model));
    for id in tree.breadth_first() {
        let context = tree.node(id).context();
        for &symbol in tree.alphabet().symbols() {
            assert_abs_diff_eq!(
                automaton_model
                    .conditional_probability(symbol, context)
                    .unwrap(),
                tree_model.conditional_probability(symbol, context).unwrap(),
                epsilon = 1e-9
            );
        }
    }
}

#[test_log::test]
fn test_tree_and_automaton_score_the_same() {
    let tree_model = learn_random(false);

    for sequence in RANDOM_SEQUENCES.iter() {
        let expected = RANDOM_MODEL.score_bytes(sequence, true).unwrap();
        let actual = tree_model.score_bytes(sequence, true).unwrap();
        assert_abs_diff_eq!(expected, actual, epsilon = 1e-9);
    }
}

#[test_log::test]
fn test_learned_model_prefers_its_own_data() {
    let model = &*RANDOM_MODEL;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let uniform: Vec<u8> = {
        let params = LearnParams::builder().max_depth(0).build();
        let spectrum = KmerSpectrum::from_sequences(Alphabet::nucleotides(), 1, &["ACGT"]);
        learn(&params, &spectrum, None)
            .unwrap()
            .generate(RANDOM_SEQUENCES[0].len(), &mut rng)
    };

    let own = model.score_bytes(&RANDOM_SEQUENCES[0], true).unwrap();
    let random = model.score_bytes(&uniform, true).unwrap();
    assert!(own > random, "{} <= {}", own, random);
}

#[test_log::test]
fn test_smoothed_model() {
    let chain = ProcessorChain::new()
        .with(BackoffSmoother::new(0.1))
        .with(FloorSmoother::new(0.01));
    let params = LearnParams::builder().max_depth(RANDOM_MODEL_DEPTH).build();
    let model = learn(&params, &*RANDOM_SPECTRUM, Some(&chain)).unwrap();
    let tree = model.tree();

    for id in tree.breadth_first() {
        let distribution = tree.node(id).distribution();
        assert!(distribution.min() >= 0.01 - 1e-12);
        assert_abs_diff_eq!(distribution.total(), 1.0, epsilon = 1e-9);
    }

    // with no zero probabilities left, every in-alphabet sequence has a
    // finite score
    let score = model.score_bytes(b"TTTTTTTTTTTTTTTTGGGGGGGGGG", false).unwrap();
    assert!(score.is_finite());
}

#[test_log::test]
fn test_backoff_smoothing_keeps_distributions_normalized() {
    let mut model = learn_random(true);
    BackoffSmoother::new(0.5).process(&mut model).unwrap();
    let tree = model.tree();

    for id in tree.breadth_first() {
        assert!(tree.node(id).distribution().is_normalized());
    }
}

#[test_log::test]
fn test_score_fragments_with_unknown_symbols() {
    let fragments: Vec<_> = RANDOM_SEQUENCES
        .iter()
        .enumerate()
        .map(|(i, sequence)| SequenceFragment::new(format!("seq{}", i), sequence.clone()))
        .chain(std::iter::once(SequenceFragment::new("unknown", "NNNN")))
        .collect();

    let scores = RANDOM_MODEL.score_all(&fragments, true);

    assert_eq!(scores.len(), RANDOM_SEQUENCES.len() + 1);
    let summary = RANDOM_MODEL.score_summary(&fragments[3]).unwrap();
    assert_eq!(summary.skipped, 5);
    assert_eq!(summary.scored, RANDOM_SEQUENCES[3].len() as u64 - 5);
    for score in &scores[..RANDOM_SEQUENCES.len()] {
        assert!(score.unwrap() < 0.0);
    }
    assert_eq!(scores.last(), Some(&Err(ScoringError::NothingScored)));
}

#[test]
fn test_abcd_end_to_end() {
    let spectrum = abcd_spectrum();
    let params = LearnParams::builder()
        .branch_absolute_min(0.05)
        .branch_conditional_min(0.3)
        .p_ratio_min_max(1.05)
        .max_depth(2)
        .automaton(false)
        .build();

    let model = learn(&params, &spectrum, None).unwrap();

    assert_eq!(model.size(), 2);
    assert_abs_diff_eq!(
        model.conditional_probability(b'd', b"b").unwrap(),
        0.36,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        model.conditional_probability(b'd', b"").unwrap(),
        0.4,
        epsilon = 1e-9
    );
    assert!(model.conditional_probability(b'd', b"a").is_err());
    assert_abs_diff_eq!(
        model.total_probability(b"bd").unwrap(),
        0.2 * 0.36,
        epsilon = 1e-9
    );
}

#[test]
fn test_generate_is_reproducible() {
    let first = RANDOM_MODEL.generate(500, &mut Xoshiro256PlusPlus::seed_from_u64(7));
    let second = RANDOM_MODEL.generate(500, &mut Xoshiro256PlusPlus::seed_from_u64(7));

    assert_eq!(first.len(), 500);
    assert_eq!(first, second);
    assert!(Alphabet::nucleotides().contains_all(&first));
}

#[test]
fn test_identifier() {
    let tree_model = learn_random(false);
    let automaton_model = learn_random(true);

    assert_eq!(automaton_model.identifier(), RANDOM_MODEL.identifier());
    assert_ne!(tree_model.identifier(), automaton_model.identifier());
    assert_eq!(
        Model::Tree(automaton_model.tree().clone()).identifier(),
        tree_model.identifier()
    );
}

#[test]
fn test_combine_is_unsupported() {
    assert_eq!(
        RANDOM_MODEL.combine(CombineOp::Plus, &RANDOM_MODEL).unwrap_err(),
        UnsupportedOperation(CombineOp::Plus)
    );
}
