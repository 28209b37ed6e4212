use std::error::Error;
use std::fmt::{Display, Formatter};

use log::trace;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::alphabet::{Alphabet, TranslationError};
use crate::automaton::SuffixAutomaton;
use crate::distribution::Distribution;
use crate::fragment::{FragmentReadError, PoisonedReader, SequenceFragment, SequenceReader};
use crate::model::Model;
use crate::tree::{ContextTree, NodeId};

/// Error occurring when scoring a sequence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScoringError {
    /// The reader of the fragment is unusable.
    ReaderPoisoned,
    /// An average score was requested, but no symbol could be scored.
    NothingScored,
}

impl From<PoisonedReader> for ScoringError {
    fn from(_: PoisonedReader) -> Self {
        Self::ReaderPoisoned
    }
}

impl Display for ScoringError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::ReaderPoisoned => write!(f, "Sequence reader lock poisoned"),
            ScoringError::NothingScored => write!(f, "No symbol could be scored"),
        }
    }
}

impl Error for ScoringError {}

/// Result of scoring a single sequence.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ScoreSummary {
    /// Sum of the natural logarithms of the probabilities of scored symbols.
    pub log_probability: f64,
    /// Number of symbols scored.
    pub scored: u64,
    /// Number of symbols skipped for not being a part of the alphabet.
    pub skipped: u64,
}

impl ScoreSummary {
    /// Returns the total log probability, or its average per scored symbol.
    pub fn value(&self, per_sample: bool) -> Result<f64, ScoringError> {
        if !per_sample {
            return Ok(self.log_probability);
        }
        if self.scored == 0 {
            return Err(ScoringError::NothingScored);
        }

        Ok(self.log_probability / self.scored as f64)
    }
}

/// Position within a model while reading a sequence.
pub trait ModelState {
    fn alphabet(&self) -> &Alphabet;

    /// Distribution of the next symbol.
    fn distribution(&self) -> &Distribution;

    /// Natural logarithm of the probability of the symbol at `index` being
    /// next.
    fn log_probability(&self, index: usize) -> f64 {
        self.distribution().get(index).ln()
    }

    /// Moves on after reading the symbol at `index`.
    fn advance(&mut self, index: usize);

    /// Goes back to the root, forgetting everything read so far.
    fn reset(&mut self);
}

/// Reads sequences in constant time per symbol using an automaton's
/// transition table.
#[derive(Debug, Clone)]
pub struct AutomatonScorer<'a> {
    automaton: &'a SuffixAutomaton,
    current: NodeId,
}

impl<'a> AutomatonScorer<'a> {
    #[must_use]
    pub fn new(automaton: &'a SuffixAutomaton) -> Self {
        Self {
            automaton,
            current: NodeId::ROOT,
        }
    }

    #[must_use]
    pub fn current(&self) -> NodeId {
        self.current
    }
}

impl<'a> ModelState for AutomatonScorer<'a> {
    fn alphabet(&self) -> &Alphabet {
        self.automaton.alphabet()
    }

    fn distribution(&self) -> &Distribution {
        self.automaton.tree().node(self.current).distribution()
    }

    #[inline]
    fn log_probability(&self, index: usize) -> f64 {
        self.automaton.log_probability(self.current, index)
    }

    #[inline]
    fn advance(&mut self, index: usize) {
        self.current = self.automaton.transition(self.current, index);
    }

    fn reset(&mut self) {
        self.current = NodeId::ROOT;
    }
}

/// Reads sequences with a plain tree, looking up the longest matching
/// context for every symbol.
///
/// Since every node brings its prefixes along, the next context is always a
/// suffix of the current one followed by the new symbol, so only that much
/// history is searched.
#[derive(Debug, Clone)]
pub struct TreeScorer<'a> {
    tree: &'a ContextTree,
    history: Vec<u8>,
    current: NodeId,
}

impl<'a> TreeScorer<'a> {
    #[must_use]
    pub fn new(tree: &'a ContextTree) -> Self {
        Self {
            tree,
            history: Vec::with_capacity(tree.depth() + 1),
            current: NodeId::ROOT,
        }
    }
}

impl<'a> ModelState for TreeScorer<'a> {
    fn alphabet(&self) -> &Alphabet {
        self.tree.alphabet()
    }

    fn distribution(&self) -> &Distribution {
        self.tree.node(self.current).distribution()
    }

    fn advance(&mut self, index: usize) {
        self.history.clear();
        self.history
            .extend_from_slice(self.tree.node(self.current).context());
        self.history.push(self.tree.alphabet().symbol(index));
        self.current = self.tree.longest_suffix_id(&self.history);
    }

    fn reset(&mut self) {
        self.history.clear();
        self.current = NodeId::ROOT;
    }
}

fn accumulate<S, I>(state: &mut S, symbols: I) -> ScoreSummary
where
    S: ModelState + ?Sized,
    I: Iterator<Item = Result<usize, TranslationError>>,
{
    let mut summary = ScoreSummary::default();

    for symbol in symbols {
        match symbol {
            Ok(index) => {
                summary.log_probability += state.log_probability(index);
                summary.scored += 1;
                state.advance(index);
            }
            Err(e) => {
                trace!("{}, starting over from the root", e);
                summary.skipped += 1;
                state.reset();
            }
        }
    }

    summary
}

/// Reads the whole fragment through `state`, accumulating log probabilities.
///
/// Symbols outside the alphabet are skipped, and the state goes back to the
/// root after each of them.
pub fn score_fragment<S, R>(
    state: &mut S,
    fragment: &SequenceFragment<R>,
) -> Result<ScoreSummary, ScoringError>
where
    S: ModelState + ?Sized,
    R: SequenceReader,
{
    let mut reader = fragment.lock()?;
    reader.set_translation_alphabet(state.alphabet().clone());
    state.reset();

    let symbols = std::iter::from_fn(|| match reader.read_translated() {
        Ok(index) => Some(Ok(index)),
        Err(FragmentReadError::Translation(e)) => Some(Err(e)),
        Err(FragmentReadError::EndOfSequence) => None,
    });
    Ok(accumulate(state, symbols))
}

/// Same as [`score_fragment`], but reads from a byte slice.
pub fn score_bytes<S>(state: &mut S, bytes: &[u8]) -> ScoreSummary
where
    S: ModelState + ?Sized,
{
    state.reset();
    let alphabet = state.alphabet().clone();
    accumulate(state, bytes.iter().map(|&symbol| alphabet.translate(symbol)))
}

/// Scores many fragments in parallel.
pub fn score_all<R>(
    model: &Model,
    fragments: &[SequenceFragment<R>],
    per_sample: bool,
) -> Vec<Result<f64, ScoringError>>
where
    R: SequenceReader,
{
    fragments
        .par_iter()
        .map(|fragment| model.score(fragment, per_sample))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use approx::assert_abs_diff_eq;

    use crate::_internal_test_data::{abcd_automaton_model, RANDOM_MODEL, RANDOM_SEQUENCES};
    use crate::fragment::SequenceFragment;
    use crate::scorer::{
        score_all, score_bytes, score_fragment, AutomatonScorer, ModelState, ScoreSummary,
        ScoringError, TreeScorer,
    };

    #[test]
    fn test_score_summary_value() {
        let summary = ScoreSummary {
            log_probability: -6.0,
            scored: 3,
            skipped: 1,
        };

        assert_eq!(summary.value(false), Ok(-6.0));
        assert_eq!(summary.value(true), Ok(-2.0));
        assert_eq!(ScoreSummary::default().value(false), Ok(0.0));
        assert_eq!(
            ScoreSummary::default().value(true),
            Err(ScoringError::NothingScored)
        );
    }

    #[test]
    fn test_score_abcd() {
        let model = abcd_automaton_model();
        let automaton = model.automaton().unwrap();
        let mut scorer = AutomatonScorer::new(automaton);

        let summary = score_bytes(&mut scorer, b"dbd");

        assert_eq!(summary.scored, 3);
        assert_abs_diff_eq!(
            summary.log_probability,
            (0.4f64 * 0.2 * 0.36).ln(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_translation_error_resets_to_root() {
        let model = abcd_automaton_model();
        let automaton = model.automaton().unwrap();
        let mut scorer = AutomatonScorer::new(automaton);

        let whole = score_bytes(&mut scorer, b"bdxbd");
        let part = score_bytes(&mut scorer, b"bd");

        assert_eq!(whole.scored, 4);
        assert_eq!(whole.skipped, 1);
        assert_abs_diff_eq!(whole.log_probability, 2.0 * part.log_probability);
    }

    #[test]
    fn test_score_fragment() {
        let model = abcd_automaton_model();
        let mut scorer = AutomatonScorer::new(model.automaton().unwrap());
        let fragment = SequenceFragment::new("abcd", "dbd");

        let summary = score_fragment(&mut scorer, &fragment).unwrap();

        assert_eq!(summary, score_bytes(&mut scorer, b"dbd"));
        assert_eq!(
            model.score(&SequenceFragment::new("empty", ""), true),
            Err(ScoringError::NothingScored)
        );
        assert_eq!(model.score(&SequenceFragment::new("empty", ""), false), Ok(0.0));
    }

    #[test]
    fn test_tree_scorer_equals_automaton_scorer() {
        let automaton = RANDOM_MODEL.automaton().unwrap();
        let mut automaton_scorer = AutomatonScorer::new(automaton);
        let mut tree_scorer = TreeScorer::new(automaton.tree());

        for sequence in RANDOM_SEQUENCES.iter().take(10) {
            let expected = score_bytes(&mut automaton_scorer, sequence);
            let actual = score_bytes(&mut tree_scorer, sequence);

            assert_eq!(expected.scored, actual.scored);
            assert_abs_diff_eq!(expected.log_probability, actual.log_probability, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_tree_scorer_follows_nodes() {
        let automaton = RANDOM_MODEL.automaton().unwrap();
        let mut automaton_scorer = AutomatonScorer::new(automaton);
        let mut tree_scorer = TreeScorer::new(automaton.tree());

        for &symbol in &RANDOM_SEQUENCES[0][..200] {
            let index = automaton.alphabet().index_of(symbol).unwrap();
            automaton_scorer.advance(index);
            tree_scorer.advance(index);
            assert_eq!(automaton_scorer.current(), tree_scorer.current);
        }
    }

    #[test]
    fn test_tree_scorer_searches_only_current_context() {
        let tree = RANDOM_MODEL.tree();
        let mut scorer = TreeScorer::new(tree);

        for &symbol in &RANDOM_SEQUENCES[0][..200] {
            let index = tree.alphabet().index_of(symbol).unwrap();
            let previous = tree.node(scorer.current).depth();
            scorer.advance(index);

            assert_eq!(scorer.history.len(), previous + 1);
            assert!(tree.node(scorer.current).depth() <= previous + 1);
        }
    }

    #[test]
    fn test_concurrent_scoring_of_one_fragment() {
        let fragment = Arc::new(SequenceFragment::new("seq", RANDOM_SEQUENCES[1].clone()));
        let expected = RANDOM_MODEL.score(&*fragment, true).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let fragment = fragment.clone();
                thread::spawn(move || {
                    (0..5)
                        .map(|_| RANDOM_MODEL.score(&*fragment, true).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for score in handle.join().unwrap() {
                assert_eq!(score, expected);
            }
        }
    }

    #[test_log::test]
    fn test_score_all() {
        let fragments: Vec<_> = RANDOM_SEQUENCES
            .iter()
            .take(8)
            .enumerate()
            .map(|(i, sequence)| SequenceFragment::new(format!("seq{}", i), sequence.clone()))
            .collect();

        let scores = score_all(&RANDOM_MODEL, &fragments, false);

        assert_eq!(scores.len(), 8);
        for (score, fragment) in scores.into_iter().zip(fragments.iter()) {
            assert_eq!(score, RANDOM_MODEL.score(fragment, false));
            assert!(score.unwrap() < 0.0);
        }
    }
}
