use log::debug;

use crate::alphabet::{Alphabet, TranslationError};
use crate::distribution::Distribution;
use crate::spectrum::UnknownProbability;
use crate::tree::{ContextTree, NodeId};

/// A probabilistic suffix automaton: a [`ContextTree`] where every node has a
/// transition defined for every symbol of the alphabet.
///
/// A missing child is replaced with the transition of the node's backoff,
/// i.e. the deepest node whose context is a suffix of the node's context with
/// its oldest symbol dropped. The root transitions to itself on symbols it
/// has no child for. Reading a symbol is then a single table lookup.
///
/// The natural logarithms of all the probabilities are cached, so scoring
/// does not need to compute them.
#[derive(Debug, Clone)]
pub struct SuffixAutomaton {
    tree: ContextTree,
    backoff: Vec<Option<NodeId>>,
    transitions: Vec<NodeId>,
    log_probs: Vec<f64>,
}

impl SuffixAutomaton {
    /// Converts a tree into an automaton.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::automaton::SuffixAutomaton;
    /// use pstmodel::tree::{ContextTree, NodeId};
    ///
    /// let mut tree = ContextTree::new(Alphabet::nucleotides());
    /// tree.insert(b"A").unwrap();
    /// tree.insert(b"CA").unwrap();
    /// let automaton = SuffixAutomaton::from_tree(tree);
    ///
    /// let ca = automaton.walk(b"CA").unwrap();
    /// assert_eq!(automaton.backoff(ca), automaton.tree().find(b"A"));
    /// assert_eq!(automaton.walk(b"GGG"), Ok(NodeId::ROOT));
    /// ```
    #[must_use]
    pub fn from_tree(tree: ContextTree) -> Self {
        let size = tree.size();
        let alphabet_size = tree.alphabet().len();
        let mut automaton = Self {
            tree,
            backoff: vec![None; size],
            transitions: vec![NodeId::ROOT; size * alphabet_size],
            log_probs: vec![0.0; size * alphabet_size],
        };

        let order: Vec<NodeId> = automaton.tree.breadth_first().collect();
        for id in order {
            automaton.resolve_node(id);
        }
        automaton.refresh_log_probs();

        debug!(
            "Converted a tree with {} nodes into an automaton",
            automaton.size()
        );
        automaton
    }

    /// Fills the backoff and transitions of given node. All the nodes with
    /// shorter contexts must already be resolved.
    fn resolve_node(&mut self, id: NodeId) {
        let node = self.tree.node(id);
        let backoff = if id == NodeId::ROOT {
            None
        } else {
            // contexts only consist of alphabet symbols, so the walk cannot fail
            Some(self.walk(&node.context()[1..]).unwrap_or(NodeId::ROOT))
        };

        let alphabet_size = self.tree.alphabet().len();
        let transitions: Vec<NodeId> = (0..alphabet_size)
            .map(|index| match (node.child(index), backoff) {
                (Some(child), _) => child,
                (None, Some(backoff)) => self.transition(backoff, index),
                (None, None) => NodeId::ROOT,
            })
            .collect();

        self.backoff[id.index()] = backoff;
        let offset = id.index() * alphabet_size;
        self.transitions[offset..offset + alphabet_size].copy_from_slice(&transitions);
    }

    /// Recomputes the cached log probabilities after the distributions have
    /// changed.
    pub fn refresh_log_probs(&mut self) {
        let alphabet_size = self.tree.alphabet().len();
        for index in 0..self.tree.size() {
            let id = NodeId::new(index);
            let offset = index * alphabet_size;
            let log_probs = self.tree.node(id).distribution().log_probabilities();
            self.log_probs[offset..offset + alphabet_size].copy_from_slice(&log_probs);
        }
    }

    #[inline]
    #[must_use]
    pub fn tree(&self) -> &ContextTree {
        &self.tree
    }

    /// Gives access to the distributions. [`SuffixAutomaton::refresh_log_probs`]
    /// must be called after modifying them.
    #[inline]
    pub(crate) fn tree_mut(&mut self) -> &mut ContextTree {
        &mut self.tree
    }

    /// Returns a copy of the underlying tree, without the automaton data.
    #[must_use]
    pub fn to_tree(&self) -> ContextTree {
        self.tree.clone()
    }

    #[must_use]
    pub fn into_tree(self) -> ContextTree {
        self.tree
    }

    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        self.tree.alphabet()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Returns the backoff of given node; `None` for the root only.
    #[inline]
    #[must_use]
    pub fn backoff(&self, id: NodeId) -> Option<NodeId> {
        self.backoff[id.index()]
    }

    /// Returns the node reached from `id` by reading the symbol at `index`.
    #[inline]
    #[must_use]
    pub fn transition(&self, id: NodeId, index: usize) -> NodeId {
        self.transitions[id.index() * self.alphabet().len() + index]
    }

    /// Natural logarithm of the probability of the symbol at `index`
    /// following the node; `-inf` for impossible symbols.
    #[inline]
    #[must_use]
    pub fn log_probability(&self, id: NodeId, index: usize) -> f64 {
        self.log_probs[id.index() * self.alphabet().len() + index]
    }

    /// Returns the state after reading `context` from the root.
    pub fn walk(&self, context: &[u8]) -> Result<NodeId, TranslationError> {
        context.iter().try_fold(NodeId::ROOT, |current, &symbol| {
            let index = self.alphabet().translate(symbol)?;
            Ok(self.transition(current, index))
        })
    }

    /// Probability of `symbol` following `context`. Unlike
    /// [`ContextTree::conditional_probability`] this backs off to shorter
    /// contexts, so it only fails for symbols outside the alphabet.
    pub fn conditional_probability(
        &self,
        symbol: u8,
        context: &[u8],
    ) -> Result<f64, UnknownProbability> {
        let unknown = |_| UnknownProbability::for_symbol(context, symbol);

        let index = self.alphabet().translate(symbol).map_err(unknown)?;
        let id = self.walk(context).map_err(unknown)?;
        Ok(self.tree.node(id).distribution().get(index))
    }

    /// Returns the distribution of the state reached after reading `context`.
    pub fn conditionals_from(&self, context: &[u8]) -> Result<&Distribution, UnknownProbability> {
        let id = self
            .walk(context)
            .map_err(|_| UnknownProbability::for_context(context))?;
        Ok(self.tree.node(id).distribution())
    }

    /// Probability of `bytes`, read symbol by symbol starting at the root.
    pub fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        let mut current = NodeId::ROOT;
        let mut probability = 1.0;
        for &symbol in bytes {
            let index = self
                .alphabet()
                .translate(symbol)
                .map_err(|_| UnknownProbability::for_context(bytes))?;
            probability *= self.tree.node(current).distribution().get(index);
            current = self.transition(current, index);
        }

        Ok(probability)
    }
}
