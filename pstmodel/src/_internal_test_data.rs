use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::alphabet::Alphabet;
use crate::automaton::SuffixAutomaton;
use crate::learner::{learn, LearnParams};
use crate::model::Model;
use crate::spectrum::{KmerSpectrum, SpectrumSource, TableSpectrum};
use crate::tree::ContextTree;

pub const RANDOM_SEQUENCE_NUM: usize = 32;
pub const RANDOM_SEQUENCE_LEN: usize = 1000;
pub const RANDOM_SPECTRUM_ORDER: usize = 6;
pub const RANDOM_MODEL_DEPTH: usize = 5;

lazy_static! {
    pub static ref RANDOM_SEQUENCES: Vec<Vec<u8>> =
        make_markov_sequences(RANDOM_SEQUENCE_NUM, RANDOM_SEQUENCE_LEN);
    pub static ref RANDOM_SPECTRUM: KmerSpectrum = KmerSpectrum::from_sequences(
        Alphabet::nucleotides(),
        RANDOM_SPECTRUM_ORDER,
        RANDOM_SEQUENCES.as_slice(),
    );
    pub static ref RANDOM_MODEL: Model = create_random_model();
}

/// Alphabet `abcd` with known conditionals after the empty context and after
/// `b` only.
pub fn abcd_spectrum() -> TableSpectrum {
    let mut spectrum = TableSpectrum::new(Alphabet::new(*b"abcd").unwrap());
    spectrum.set_all(b"", &[0.1, 0.2, 0.3, 0.4]).unwrap();
    spectrum.set_all(b"b", &[0.11, 0.22, 0.31, 0.36]).unwrap();
    spectrum.set_original_sequence_length(1000);

    spectrum
}

/// Automaton over contexts `bc`, `ba` and `a`, filled from
/// [`abcd_spectrum`].
pub fn abcd_automaton_model() -> Model {
    let spectrum = abcd_spectrum();
    let mut tree = ContextTree::new(spectrum.alphabet().clone());
    tree.insert(b"bc").unwrap();
    tree.insert(b"ba").unwrap();
    tree.insert(b"a").unwrap();
    tree.fill_from(&spectrum).unwrap();

    Model::Automaton(SuffixAutomaton::from_tree(tree))
}

fn create_random_model() -> Model {
    let params = LearnParams::builder()
        .max_depth(RANDOM_MODEL_DEPTH)
        .build();

    learn(&params, &*RANDOM_SPECTRUM, None).unwrap()
}

/// Sequences sampled from a random order-2 Markov chain over `ACGT`. Every
/// eighth sequence, starting with the fourth one, has a run of `N`s in the
/// middle.
fn make_markov_sequences(num: usize, len: usize) -> Vec<Vec<u8>> {
    const SYMBOLS: &[u8; 4] = b"ACGT";
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1337);
    let chain: Vec<Vec<f64>> = (0..16).map(|_| make_random_probs(&mut rng, 4)).collect();

    (0..num)
        .map(|i| {
            let mut state = rng.gen_range(0..16);
            let mut sequence: Vec<u8> = (0..len)
                .map(|_| {
                    let next = sample_index(&mut rng, &chain[state]);
                    state = (state * 4 + next) % 16;
                    SYMBOLS[next]
                })
                .collect();

            if i % 8 == 3 {
                sequence[len / 2..len / 2 + 5].fill(b'N');
            }
            sequence
        })
        .collect()
}

fn sample_index<T: Rng>(rng: &mut T, probs: &[f64]) -> usize {
    let mut point: f64 = rng.gen();
    for (index, &prob) in probs.iter().enumerate() {
        if point < prob {
            return index;
        }
        point -= prob;
    }

    probs.len() - 1
}

fn make_random_probs<T: Rng>(rng: &mut T, num: usize) -> Vec<f64> {
    // squaring makes the chain less uniform, so there is something to learn
    let mut probs: Vec<f64> = (0..num).map(|_| rng.gen::<f64>().powi(2)).collect();
    let sum: f64 = probs.iter().sum();
    for prob in &mut probs {
        *prob /= sum;
    }

    probs
}
