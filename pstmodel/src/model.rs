use std::error::Error;
use std::fmt::{Display, Formatter};

use byteorder::{BigEndian, WriteBytesExt};
use rand::Rng;
use sha3::{Digest, Sha3_256};

use crate::alphabet::Alphabet;
use crate::automaton::SuffixAutomaton;
use crate::distribution::{Distribution, Entropy};
use crate::fragment::{SequenceFragment, SequenceReader};
use crate::scorer::{
    score_bytes, score_fragment, AutomatonScorer, ModelState, ScoreSummary, ScoringError,
    TreeScorer,
};
use crate::spectrum::UnknownProbability;
use crate::tree::ContextTree;

/// An automatically-generated identifier of a model.
///
/// The model identifier is an SHA-3 256-bit checksum of the entire model
/// contents: the model variant, the alphabet, and then every node (its
/// context and distribution) in breadth-first order.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct ModelIdentifier([u8; 32]);

impl ModelIdentifier {
    /// Creates a new instance of `ModelIdentifier`.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::model::ModelIdentifier;
    ///
    /// let identifier = ModelIdentifier::new([1; 32]);
    /// assert_eq!(identifier.to_string(), "01010101");
    /// ```
    #[must_use]
    pub fn new(value: [u8; 32]) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<ModelIdentifier> for [u8; 32] {
    fn from(model_identifier: ModelIdentifier) -> Self {
        model_identifier.0
    }
}

impl From<[u8; 32]> for ModelIdentifier {
    fn from(value: [u8; 32]) -> Self {
        Self::new(value)
    }
}

impl Display for ModelIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for val in &self.0[..4] {
            write!(f, "{:02x}", val)?;
        }
        Ok(())
    }
}

/// Arithmetic operation combining two models.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CombineOp {
    Increment,
    Decrement,
    Plus,
    Minus,
}

impl Display for CombineOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CombineOp::Increment => write!(f, "increment"),
            CombineOp::Decrement => write!(f, "decrement"),
            CombineOp::Plus => write!(f, "plus"),
            CombineOp::Minus => write!(f, "minus"),
        }
    }
}

/// The operation is not defined for suffix tree models.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UnsupportedOperation(pub CombineOp);

impl Display for UnsupportedOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation `{}` is not supported for suffix models", self.0)
    }
}

impl Error for UnsupportedOperation {}

/// A learned variable-order Markov model.
#[derive(Debug, Clone)]
pub enum Model {
    /// A plain suffix tree; lookups descend the tree.
    Tree(ContextTree),
    /// A suffix tree with precomputed backoff transitions.
    Automaton(SuffixAutomaton),
}

impl Model {
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &ContextTree {
        match self {
            Model::Tree(tree) => tree,
            Model::Automaton(automaton) => automaton.tree(),
        }
    }

    pub(crate) fn tree_mut(&mut self) -> &mut ContextTree {
        match self {
            Model::Tree(tree) => tree,
            Model::Automaton(automaton) => automaton.tree_mut(),
        }
    }

    pub(crate) fn refresh_log_probs(&mut self) {
        if let Model::Automaton(automaton) = self {
            automaton.refresh_log_probs();
        }
    }

    #[must_use]
    pub fn automaton(&self) -> Option<&SuffixAutomaton> {
        match self {
            Model::Tree(_) => None,
            Model::Automaton(automaton) => Some(automaton),
        }
    }

    /// Converts a tree model into an automaton. Automata are returned as
    /// they are.
    #[must_use]
    pub fn into_automaton(self) -> SuffixAutomaton {
        match self {
            Model::Tree(tree) => SuffixAutomaton::from_tree(tree),
            Model::Automaton(automaton) => automaton,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_automaton(&self) -> bool {
        matches!(self, Model::Automaton(_))
    }

    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        self.tree().alphabet()
    }

    /// Returns the number of nodes in this model.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::model::Model;
    /// use pstmodel::tree::ContextTree;
    ///
    /// let model = Model::Tree(ContextTree::new(Alphabet::nucleotides()));
    /// assert_eq!(model.size(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree().size()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree().depth()
    }

    /// Probability of `symbol` following `context`.
    ///
    /// Tree models fail for contexts that have no node; automata back off to
    /// the longest known suffix of the context.
    pub fn conditional_probability(
        &self,
        symbol: u8,
        context: &[u8],
    ) -> Result<f64, UnknownProbability> {
        match self {
            Model::Tree(tree) => tree.conditional_probability(symbol, context),
            Model::Automaton(automaton) => automaton.conditional_probability(symbol, context),
        }
    }

    pub fn conditionals_from(&self, context: &[u8]) -> Result<&Distribution, UnknownProbability> {
        match self {
            Model::Tree(tree) => tree.conditionals_from(context),
            Model::Automaton(automaton) => automaton.conditionals_from(context),
        }
    }

    pub fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        match self {
            Model::Tree(tree) => tree.total_probability(bytes),
            Model::Automaton(automaton) => automaton.total_probability(bytes),
        }
    }

    /// Draws the symbol following `context`. Returns `None` if nothing is
    /// known to follow it. A context without a node is an error, even if the
    /// tree has a default probability.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        context: &[u8],
        rng: &mut R,
    ) -> Result<Option<u8>, UnknownProbability> {
        let distribution = self.conditionals_from(context)?;
        Ok(distribution
            .sample(rng)
            .map(|index| self.alphabet().symbol(index)))
    }

    /// Generates a random sequence of given length by repeatedly sampling
    /// the model. When a state has nothing to sample from, generation starts
    /// over from the root; the result is shorter than `length` only if the
    /// root itself is empty.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::learner::{learn, LearnParams};
    /// use pstmodel::spectrum::KmerSpectrum;
    /// use rand::SeedableRng;
    /// use rand_xoshiro::Xoshiro256PlusPlus;
    ///
    /// let spectrum = KmerSpectrum::from_sequences(Alphabet::nucleotides(), 2, &["GATTACA"]);
    /// let model = learn(&LearnParams::default(), &spectrum, None).unwrap();
    ///
    /// let mut rng = Xoshiro256PlusPlus::seed_from_u64(1337);
    /// let sequence = model.generate(16, &mut rng);
    /// assert_eq!(sequence.len(), 16);
    /// assert!(Alphabet::nucleotides().contains_all(&sequence));
    /// ```
    pub fn generate<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> Vec<u8> {
        match self {
            Model::Tree(tree) => generate_with(&mut TreeScorer::new(tree), length, rng),
            Model::Automaton(automaton) => {
                generate_with(&mut AutomatonScorer::new(automaton), length, rng)
            }
        }
    }

    /// Scores the sequence read from `fragment`: the sum of natural
    /// logarithms of the probabilities of its symbols, or their mean if
    /// `per_sample` is set.
    pub fn score<R: SequenceReader>(
        &self,
        fragment: &SequenceFragment<R>,
        per_sample: bool,
    ) -> Result<f64, ScoringError> {
        self.score_summary(fragment)?.value(per_sample)
    }

    pub fn score_summary<R: SequenceReader>(
        &self,
        fragment: &SequenceFragment<R>,
    ) -> Result<ScoreSummary, ScoringError> {
        match self {
            Model::Tree(tree) => score_fragment(&mut TreeScorer::new(tree), fragment),
            Model::Automaton(automaton) => {
                score_fragment(&mut AutomatonScorer::new(automaton), fragment)
            }
        }
    }

    /// Same as [`Model::score`], but reads the symbols from a byte slice.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::model::Model;
    /// use pstmodel::spectrum::TableSpectrum;
    /// use pstmodel::tree::ContextTree;
    ///
    /// let mut spectrum = TableSpectrum::new(Alphabet::nucleotides());
    /// spectrum.set_all(b"", &[0.5, 0.25, 0.125, 0.125]).unwrap();
    /// let mut tree = ContextTree::new(Alphabet::nucleotides());
    /// tree.fill_from(&spectrum).unwrap();
    /// let model = Model::Tree(tree);
    ///
    /// let score = model.score_bytes(b"AC", false).unwrap();
    /// assert!((score - 0.125f64.ln()).abs() < 1e-12);
    /// assert!(model.score_bytes(b"NNN", true).is_err());
    /// ```
    pub fn score_bytes(&self, bytes: &[u8], per_sample: bool) -> Result<f64, ScoringError> {
        let summary = match self {
            Model::Tree(tree) => score_bytes(&mut TreeScorer::new(tree), bytes),
            Model::Automaton(automaton) => score_bytes(&mut AutomatonScorer::new(automaton), bytes),
        };
        summary.value(per_sample)
    }

    /// Scores many fragments in parallel.
    pub fn score_all<R: SequenceReader>(
        &self,
        fragments: &[SequenceFragment<R>],
        per_sample: bool,
    ) -> Vec<Result<f64, ScoringError>> {
        crate::scorer::score_all(self, fragments, per_sample)
    }

    /// Compares the trees of two models by value. Automaton data is not
    /// compared, so a tree model equals its automaton.
    #[must_use]
    pub fn equal_value(&self, other: &Model) -> bool {
        self.tree().equal_value(other.tree())
    }

    /// Returns the identifier of this model.
    ///
    /// See the [`ModelIdentifier`] docs for more information on how the
    /// identifier is generated.
    #[must_use]
    pub fn identifier(&self) -> ModelIdentifier {
        let tree = self.tree();
        let mut hasher = Sha3_256::new();

        hasher.write_u8(self.is_automaton() as u8).unwrap();
        hasher.write_u32::<BigEndian>(tree.alphabet().len() as u32).unwrap();
        hasher.update(tree.alphabet().symbols());

        for id in tree.breadth_first() {
            let node = tree.node(id);
            hasher.write_u32::<BigEndian>(node.depth() as u32).unwrap();
            hasher.update(node.context());
            for &prob in node.distribution().as_slice() {
                hasher.write_f64::<BigEndian>(prob).unwrap();
            }
        }

        ModelIdentifier::new(hasher.finalize().into())
    }

    /// Mean entropy of the distributions of all the nodes.
    #[must_use]
    pub fn mean_entropy(&self) -> Entropy {
        let tree = self.tree();
        let total: f64 = tree
            .breadth_first()
            .map(|id| tree.node(id).distribution().entropy().get())
            .sum();

        Entropy::new(total / tree.size() as f64)
    }

    /// Combines two models arithmetically. None of the operations is defined
    /// for suffix models.
    pub fn combine(&self, op: CombineOp, _other: &Model) -> Result<Model, UnsupportedOperation> {
        Err(UnsupportedOperation(op))
    }
}

fn generate_with<S, R>(state: &mut S, length: usize, rng: &mut R) -> Vec<u8>
where
    S: ModelState + ?Sized,
    R: Rng + ?Sized,
{
    let mut sequence = Vec::with_capacity(length);

    while sequence.len() < length {
        let index = match state.distribution().sample(rng) {
            Some(index) => index,
            None => {
                state.reset();
                match state.distribution().sample(rng) {
                    Some(index) => index,
                    None => break,
                }
            }
        };

        sequence.push(state.alphabet().symbol(index));
        state.advance(index);
    }

    sequence
}
