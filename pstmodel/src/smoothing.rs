use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use log::debug;

use crate::distribution::{Distribution, DistributionError};
use crate::model::Model;
use crate::tree::NodeId;

/// Error occurring when post-processing a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// The processor cannot be applied to this kind of model.
    Unsupported,
    /// The processor was configured with values that cannot be applied to
    /// the model's distributions.
    Distribution(DistributionError),
}

impl From<DistributionError> for ProcessError {
    fn from(e: DistributionError) -> Self {
        Self::Distribution(e)
    }
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Unsupported => write!(f, "Operation not supported for this model"),
            ProcessError::Distribution(e) => write!(f, "Distribution error: {}", e),
        }
    }
}

impl Error for ProcessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProcessError::Distribution(e) => Some(e),
            ProcessError::Unsupported => None,
        }
    }
}

/// A pass that modifies the distributions of a learned model in place.
pub trait ModelProcessor: Debug + Send + Sync {
    fn process(&self, model: &mut Model) -> Result<(), ProcessError>;
}

/// Makes sure no symbol has probability lower than `floor`.
///
/// The probabilities below the floor are raised to it, and the rest are
/// scaled down to keep the total at 1. Distributions that are entirely zero
/// become uniform.
///
/// # Examples
/// ```
/// use pstmodel::alphabet::Alphabet;
/// use pstmodel::model::Model;
/// use pstmodel::smoothing::{FloorSmoother, ModelProcessor};
/// use pstmodel::tree::ContextTree;
///
/// let mut model = Model::Tree(ContextTree::new(Alphabet::nucleotides()));
/// FloorSmoother::new(0.1).process(&mut model).unwrap();
/// assert_eq!(model.conditional_probability(b'A', b""), Ok(0.25));
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FloorSmoother {
    floor: f64,
}

impl FloorSmoother {
    #[must_use]
    pub fn new(floor: f64) -> Self {
        Self { floor }
    }

    #[must_use]
    pub fn floor(&self) -> f64 {
        self.floor
    }
}

impl ModelProcessor for FloorSmoother {
    fn process(&self, model: &mut Model) -> Result<(), ProcessError> {
        debug!("Applying probability floor of {}", self.floor);

        let tree = model.tree_mut();
        let order: Vec<NodeId> = tree.breadth_first().collect();
        for id in order {
            tree.node_mut(id)
                .distribution_mut()
                .redistribute_with_minimum(self.floor)?;
        }

        model.refresh_log_probs();
        Ok(())
    }
}

/// Interpolates every distribution with the (already smoothed) distribution
/// of its backoff node, and the root's one with the uniform distribution.
///
/// Each distribution `p` becomes `(p + w * b) / (1 + w)` where `b` is the
/// backoff's distribution and `w = 4 * smooth_factor`. Nodes with all-zero
/// distributions end up with the backoff's distribution. Only applicable to
/// automata, since plain trees have no backoff links.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BackoffSmoother {
    smooth_factor: f64,
}

impl BackoffSmoother {
    #[must_use]
    pub fn new(smooth_factor: f64) -> Self {
        Self { smooth_factor }
    }

    #[must_use]
    pub fn smooth_factor(&self) -> f64 {
        self.smooth_factor
    }

    #[must_use]
    pub fn weight(&self) -> f64 {
        self.smooth_factor * 4.0
    }
}

impl ModelProcessor for BackoffSmoother {
    fn process(&self, model: &mut Model) -> Result<(), ProcessError> {
        let automaton = match model {
            Model::Automaton(automaton) => automaton,
            Model::Tree(_) => return Err(ProcessError::Unsupported),
        };
        let weight = self.weight();
        debug!("Applying backoff smoothing with weight {}", weight);

        let uniform = Distribution::uniform(automaton.alphabet().len());
        let order: Vec<NodeId> = automaton.tree().breadth_first().collect();
        for id in order {
            let backoff = match automaton.backoff(id) {
                Some(backoff) => automaton.tree().node(backoff).distribution().clone(),
                None => uniform.clone(),
            };

            let distribution = automaton.tree_mut().node_mut(id).distribution_mut();
            distribution.mix_in(&backoff, weight)?;
            distribution.normalize()?;
        }

        automaton.refresh_log_probs();
        Ok(())
    }
}

/// Runs several processors, one after another.
#[derive(Debug, Default)]
pub struct ProcessorChain(Vec<Box<dyn ModelProcessor>>);

impl ProcessorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<P: ModelProcessor + 'static>(mut self, processor: P) -> Self {
        self.0.push(Box::new(processor));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ModelProcessor for ProcessorChain {
    fn process(&self, model: &mut Model) -> Result<(), ProcessError> {
        for processor in &self.0 {
            processor.process(model)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::_internal_test_data::{abcd_automaton_model, RANDOM_MODEL};
    use crate::distribution::DistributionError;
    use crate::model::Model;
    use crate::smoothing::{
        BackoffSmoother, FloorSmoother, ModelProcessor, ProcessError, ProcessorChain,
    };
    use crate::tree::NodeId;

    fn assert_all_normalized(model: &Model) {
        let tree = model.tree();
        for id in tree.breadth_first() {
            assert!(tree.node(id).distribution().is_normalized());
        }
    }

    #[test_log::test]
    fn test_floor_smoothing() {
        let mut model = RANDOM_MODEL.clone();

        FloorSmoother::new(0.05).process(&mut model).unwrap();

        let tree = model.tree();
        for id in tree.breadth_first() {
            let distribution = tree.node(id).distribution();
            assert!(distribution.min() >= 0.05 - 1e-12);
            assert!(distribution.is_normalized());
        }
    }

    #[test]
    fn test_floor_smoothing_refreshes_log_probs() {
        let mut model = abcd_automaton_model();
        let a = model.tree().find(b"a").unwrap();
        assert_eq!(
            model.automaton().unwrap().log_probability(a, 0),
            f64::NEG_INFINITY
        );

        FloorSmoother::new(0.01).process(&mut model).unwrap();

        assert_abs_diff_eq!(model.automaton().unwrap().log_probability(a, 0), 0.25f64.ln());
        assert_all_normalized(&model);
    }

    #[test]
    fn test_floor_smoothing_tree() {
        let mut model = Model::Tree(abcd_automaton_model().tree().clone());

        FloorSmoother::new(0.15).process(&mut model).unwrap();

        assert_abs_diff_eq!(model.conditional_probability(b'a', b"").unwrap(), 0.15);
        assert_all_normalized(&model);
    }

    #[test]
    fn test_floor_smoothing_impossible_floor() {
        let mut model = abcd_automaton_model();

        assert_eq!(
            FloorSmoother::new(0.5).process(&mut model),
            Err(ProcessError::Distribution(DistributionError::ImpossibleFloor(
                0.5, 4
            )))
        );
        assert!(model.equal_value(&abcd_automaton_model()));
    }

    #[test]
    fn test_backoff_smoothing() {
        let mut model = abcd_automaton_model();

        BackoffSmoother::new(0.25).process(&mut model).unwrap();

        let root = model.tree().root().distribution();
        assert_abs_diff_eq!(root.get(0), 0.175, epsilon = 1e-9);
        assert_abs_diff_eq!(root.get(3), 0.325, epsilon = 1e-9);
        let b = model.conditionals_from(b"b").unwrap();
        assert_abs_diff_eq!(b.get(0), 0.1425, epsilon = 1e-9);
        assert_abs_diff_eq!(b.get(3), 0.3425, epsilon = 1e-9);
        // "a" had nothing known, so it takes over the root's distribution
        let a = model.tree().get(b"a").unwrap().distribution();
        assert_eq!(a, model.tree().root().distribution());
        assert_all_normalized(&model);
    }

    #[test_log::test]
    fn test_backoff_smoothing_keeps_normalized() {
        let mut model = RANDOM_MODEL.clone();

        BackoffSmoother::new(0.1).process(&mut model).unwrap();

        assert_all_normalized(&model);
        let automaton = model.automaton().unwrap();
        for index in 0..automaton.alphabet().len() {
            assert!(automaton.log_probability(NodeId::ROOT, index).is_finite());
        }
    }

    #[test]
    fn test_backoff_smoothing_tree_unsupported() {
        let mut model = Model::Tree(RANDOM_MODEL.tree().clone());

        assert_eq!(
            BackoffSmoother::new(0.1).process(&mut model),
            Err(ProcessError::Unsupported)
        );
    }

    #[test]
    fn test_backoff_smoothing_invalid_factor() {
        let mut model = abcd_automaton_model();

        assert!(matches!(
            BackoffSmoother::new(-1.0).process(&mut model),
            Err(ProcessError::Distribution(DistributionError::InvalidWeight(_)))
        ));
    }

    #[test]
    fn test_processor_chain() {
        let chain = ProcessorChain::new()
            .with(BackoffSmoother::new(0.25))
            .with(FloorSmoother::new(0.2));
        let mut model = abcd_automaton_model();

        chain.process(&mut model).unwrap();

        assert_eq!(chain.len(), 2);
        let tree = model.tree();
        for id in tree.breadth_first() {
            assert!(tree.node(id).distribution().min() >= 0.2 - 1e-12);
        }
        assert_abs_diff_eq!(
            model.conditional_probability(b'a', b"").unwrap(),
            0.2,
            epsilon = 1e-9
        );
    }
}
