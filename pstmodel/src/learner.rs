use std::collections::{BTreeSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::alphabet::TranslationError;
use crate::automaton::SuffixAutomaton;
use crate::distribution::DistributionError;
use crate::model::Model;
use crate::progress::{DummyProgressNotifier, ProgressNotifier};
use crate::smoothing::{ModelProcessor, ProcessError};
use crate::spectrum::SpectrumSource;
use crate::tree::ContextTree;

/// Error occurring when learning a model.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnError {
    /// A threshold is negative, infinite or NaN.
    InvalidThreshold(&'static str, f64),
    /// A context to build the tree from contains a symbol outside the
    /// alphabet.
    Translation(TranslationError),
    /// The spectrum produced values that do not form a distribution.
    Distribution(DistributionError),
    /// The completion processor failed.
    Process(ProcessError),
}

impl From<TranslationError> for LearnError {
    fn from(e: TranslationError) -> Self {
        Self::Translation(e)
    }
}

impl From<DistributionError> for LearnError {
    fn from(e: DistributionError) -> Self {
        Self::Distribution(e)
    }
}

impl From<ProcessError> for LearnError {
    fn from(e: ProcessError) -> Self {
        Self::Process(e)
    }
}

impl Display for LearnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LearnError::InvalidThreshold(name, value) => {
                write!(f, "Invalid value of `{}`: {}", name, value)
            }
            LearnError::Translation(e) => write!(f, "Invalid context: {}", e),
            LearnError::Distribution(e) => write!(f, "Invalid distribution: {}", e),
            LearnError::Process(e) => write!(f, "Could not process the model: {}", e),
        }
    }
}

impl Error for LearnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LearnError::Translation(e) => Some(e),
            LearnError::Distribution(e) => Some(e),
            LearnError::Process(e) => Some(e),
            LearnError::InvalidThreshold(..) => None,
        }
    }
}

/// Thresholds that decide which contexts are significant enough to get their
/// own node.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnThresholds {
    /// Minimum total probability of a context to be considered at all.
    pub branch_absolute_min: f64,
    /// Minimum conditional probability of a symbol for a context to be
    /// considered informative.
    pub branch_conditional_min: f64,
    /// Minimum ratio between the conditional probability given a context and
    /// given its one symbol shorter suffix (either way round).
    pub p_ratio_min_max: f64,
    /// Maximum context length.
    pub max_depth: usize,
}

impl LearnThresholds {
    /// Reads the thresholds from a JSON object. Missing fields take their
    /// default values.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::learner::LearnThresholds;
    ///
    /// let json = r#"{"max_depth": 3, "p_ratio_min_max": 1.2}"#;
    /// let thresholds = LearnThresholds::from_json_reader(json.as_bytes()).unwrap();
    /// assert_eq!(thresholds.max_depth, 3);
    /// assert_eq!(thresholds.p_ratio_min_max, 1.2);
    /// assert_eq!(thresholds.branch_absolute_min, 0.001);
    /// ```
    pub fn from_json_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let thresholds: Self =
            serde_json::from_reader(reader).context("Could not parse the thresholds")?;
        thresholds.validate()?;

        Ok(thresholds)
    }

    /// Checks that every threshold is a non-negative number.
    pub fn validate(&self) -> Result<(), LearnError> {
        for (name, value) in [
            ("branch_absolute_min", self.branch_absolute_min),
            ("branch_conditional_min", self.branch_conditional_min),
            ("p_ratio_min_max", self.p_ratio_min_max),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LearnError::InvalidThreshold(name, value));
            }
        }

        Ok(())
    }
}

impl Default for LearnThresholds {
    fn default() -> Self {
        Self {
            branch_absolute_min: 0.001,
            branch_conditional_min: 0.01,
            p_ratio_min_max: 1.05,
            max_depth: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LearnParams {
    thresholds: LearnThresholds,
    automaton: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl LearnParams {
    pub fn builder() -> LearnParamsBuilder {
        LearnParamsBuilder::new()
    }

    #[must_use]
    pub fn thresholds(&self) -> &LearnThresholds {
        &self.thresholds
    }

    /// Whether the learned tree is converted into an automaton.
    #[must_use]
    pub fn automaton(&self) -> bool {
        self.automaton
    }
}

impl Default for LearnParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct LearnParamsBuilder {
    thresholds: LearnThresholds,
    automaton: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl LearnParamsBuilder {
    pub fn new() -> Self {
        Self {
            thresholds: LearnThresholds::default(),
            automaton: true,
            progress_notifier: Arc::new(DummyProgressNotifier),
        }
    }

    pub fn thresholds(&mut self, thresholds: LearnThresholds) -> &mut Self {
        let mut new = self;
        new.thresholds = thresholds;
        new
    }

    pub fn branch_absolute_min(&mut self, branch_absolute_min: f64) -> &mut Self {
        let mut new = self;
        new.thresholds.branch_absolute_min = branch_absolute_min;
        new
    }

    pub fn branch_conditional_min(&mut self, branch_conditional_min: f64) -> &mut Self {
        let mut new = self;
        new.thresholds.branch_conditional_min = branch_conditional_min;
        new
    }

    pub fn p_ratio_min_max(&mut self, p_ratio_min_max: f64) -> &mut Self {
        let mut new = self;
        new.thresholds.p_ratio_min_max = p_ratio_min_max;
        new
    }

    pub fn max_depth(&mut self, max_depth: usize) -> &mut Self {
        let mut new = self;
        new.thresholds.max_depth = max_depth;
        new
    }

    pub fn automaton(&mut self, automaton: bool) -> &mut Self {
        let mut new = self;
        new.automaton = automaton;
        new
    }

    pub fn progress_notifier(&mut self, progress_notifier: Arc<dyn ProgressNotifier>) -> &mut Self {
        let mut new = self;
        new.progress_notifier = progress_notifier;
        new
    }

    pub fn build(&mut self) -> LearnParams {
        LearnParams {
            thresholds: self.thresholds,
            automaton: self.automaton,
            progress_notifier: self.progress_notifier.clone(),
        }
    }
}

impl Default for LearnParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Learns a probabilistic suffix tree from `source`.
///
/// The contexts that pass the thresholds (along with all their suffixes and
/// prefixes) become the nodes of the tree, whose distributions are then
/// copied from the source. The tree is converted into a [`SuffixAutomaton`]
/// unless disabled in `params`, and finally passed through `processor`.
///
/// # Examples
/// ```
/// use pstmodel::alphabet::Alphabet;
/// use pstmodel::learner::{learn, LearnParams};
/// use pstmodel::spectrum::KmerSpectrum;
///
/// let spectrum = KmerSpectrum::from_sequences(
///     Alphabet::nucleotides(),
///     4,
///     &["ACGTACGTACGTTTTTACGA", "ACGTAAAACGT"],
/// );
/// let params = LearnParams::builder().max_depth(3).build();
/// let model = learn(&params, &spectrum, None).unwrap();
/// assert!(model.is_automaton());
/// assert!(model.depth() <= 3);
/// ```
pub fn learn<S>(
    params: &LearnParams,
    source: &S,
    processor: Option<&dyn ModelProcessor>,
) -> Result<Model, LearnError>
where
    S: SpectrumSource + ?Sized,
{
    params.thresholds.validate()?;
    let start_time = Instant::now();
    info!(
        "Learning a model over `{}` from {} symbols (max depth: {})",
        source.alphabet(),
        source.original_sequence_length(),
        params.thresholds.max_depth
    );

    let retained = select_contexts(
        &params.thresholds,
        source,
        params.progress_notifier.as_ref(),
    );
    let tree = build_tree(source, &retained)?;
    debug!(
        "Built a tree with {} nodes and {} leaves",
        tree.size(),
        tree.leaves().count()
    );

    let mut model = if params.automaton {
        Model::Automaton(SuffixAutomaton::from_tree(tree))
    } else {
        Model::Tree(tree)
    };
    if let Some(processor) = processor {
        debug!("Running completion processor: {:?}", processor);
        processor.process(&mut model)?;
    }

    info!(
        "Learned a model with {} nodes ({} contexts retained, depth {}) in {:?}",
        model.size(),
        retained.len(),
        model.depth(),
        start_time.elapsed()
    );
    Ok(model)
}

/// Decides which contexts are significant.
///
/// Every context whose total probability reaches `branch_absolute_min` is
/// visited, starting with the single-symbol ones and growing them to the
/// left. A visited context is retained, along with all its suffixes, if the
/// conditional probability of some symbol is at least
/// `branch_conditional_min` and differs from the probability given the one
/// symbol shorter suffix by a factor of at least `p_ratio_min_max`.
/// Probabilities the source does not know are treated as 0.
pub fn select_contexts<S, P>(
    thresholds: &LearnThresholds,
    source: &S,
    progress_notifier: &P,
) -> BTreeSet<Vec<u8>>
where
    S: SpectrumSource + ?Sized,
    P: ProgressNotifier + ?Sized,
{
    select_contexts_with_order(thresholds, source, progress_notifier, WorklistOrder::Fifo)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum WorklistOrder {
    Fifo,
    Lifo,
}

pub(crate) fn select_contexts_with_order<S, P>(
    thresholds: &LearnThresholds,
    source: &S,
    progress_notifier: &P,
    order: WorklistOrder,
) -> BTreeSet<Vec<u8>>
where
    S: SpectrumSource + ?Sized,
    P: ProgressNotifier + ?Sized,
{
    let alphabet = source.alphabet();
    let is_frequent = |context: &[u8]| {
        source
            .total_probability(context)
            .map_or(false, |probability| {
                probability >= thresholds.branch_absolute_min
            })
    };

    let mut worklist: VecDeque<Vec<u8>> = VecDeque::new();
    if thresholds.max_depth > 0 {
        worklist.extend(
            alphabet
                .symbols()
                .iter()
                .map(|&symbol| vec![symbol])
                .filter(|context| is_frequent(context.as_slice())),
        );
    }
    debug!("Selecting contexts, starting with {}", worklist.len());

    let mut processed = 0;
    let mut retained = BTreeSet::new();
    while let Some(context) = match order {
        WorklistOrder::Fifo => worklist.pop_front(),
        WorklistOrder::Lifo => worklist.pop_back(),
    } {
        if is_significant(thresholds, source, &context) {
            trace!("Retaining context `{}`", context.escape_ascii());
            for start in 0..context.len() {
                retained.insert(context[start..].to_vec());
            }
        }

        if context.len() < thresholds.max_depth {
            for &symbol in alphabet.symbols() {
                let mut extended = Vec::with_capacity(context.len() + 1);
                extended.push(symbol);
                extended.extend_from_slice(&context);
                if is_frequent(extended.as_slice()) {
                    worklist.push_back(extended);
                }
            }
        }

        processed += 1;
        progress_notifier.set_iter_num((processed + worklist.len()) as u64);
        progress_notifier.inc_iter();
    }

    debug!(
        "Visited {} contexts, {} retained",
        processed,
        retained.len()
    );
    retained
}

fn is_significant<S>(thresholds: &LearnThresholds, source: &S, context: &[u8]) -> bool
where
    S: SpectrumSource + ?Sized,
{
    let suffix = &context[1..];

    source.alphabet().symbols().iter().any(|&symbol| {
        let conditional = source
            .conditional_probability(symbol, context)
            .unwrap_or(0.0);
        let backoff = source
            .conditional_probability(symbol, suffix)
            .unwrap_or(0.0);

        // NaN (0/0) never passes the comparison
        conditional >= thresholds.branch_conditional_min
            && (conditional / backoff >= thresholds.p_ratio_min_max
                || backoff / conditional >= thresholds.p_ratio_min_max)
    })
}

/// Creates a tree containing given contexts (and all their prefixes), with
/// the distributions copied from `source`.
pub fn build_tree<'a, S, I>(source: &S, contexts: I) -> Result<ContextTree, LearnError>
where
    S: SpectrumSource + ?Sized,
    I: IntoIterator<Item = &'a Vec<u8>>,
{
    let mut tree = ContextTree::new(source.alphabet().clone());
    for context in contexts {
        tree.insert(context)?;
    }
    tree.fill_from(source)?;

    Ok(tree)
}
