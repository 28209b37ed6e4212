use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use crate::alphabet::{Alphabet, TranslationError};
use crate::distribution::{Distribution, DistributionError};
use crate::spectrum::{SpectrumSource, UnknownProbability};

/// Index of a node inside a [`ContextTree`] (or a
/// [`SuffixAutomaton`](crate::automaton::SuffixAutomaton)) arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The root node, identified by the empty context.
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    #[must_use]
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("Too many nodes in a tree"))
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single context along with the distribution of the symbols that follow
/// it.
#[derive(Debug, Clone)]
pub struct Node {
    context: Vec<u8>,
    distribution: Distribution,
    children: Vec<Option<NodeId>>,
}

impl Node {
    #[must_use]
    fn new(context: Vec<u8>, alphabet_size: usize) -> Self {
        Self {
            context,
            distribution: Distribution::new(alphabet_size),
            children: vec![None; alphabet_size],
        }
    }

    /// The most recently read symbols, oldest first.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &[u8] {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.context.len()
    }

    #[inline]
    #[must_use]
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    #[inline]
    pub(crate) fn distribution_mut(&mut self) -> &mut Distribution {
        &mut self.distribution
    }

    /// Returns the child reached by appending the symbol at `index`.
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> Option<NodeId> {
        self.children[index]
    }

    /// Iterates over all explicit children, in alphabet order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().flatten().copied()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// A probabilistic suffix tree: an arena of context nodes.
///
/// The child of context `c` through symbol `σ` has the context `c σ`, so the
/// path from the root to a node spells its context oldest symbol first. Every
/// node that is inserted brings all its prefixes along.
#[derive(Debug, Clone)]
pub struct ContextTree {
    alphabet: Alphabet,
    nodes: Vec<Node>,
    depth: usize,
    default_probability: Option<f64>,
    original_sequence_length: u64,
}

impl ContextTree {
    /// Creates a tree that only contains the root, with an all-zero
    /// distribution.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::tree::ContextTree;
    ///
    /// let tree = ContextTree::new(Alphabet::nucleotides());
    /// assert_eq!(tree.size(), 1);
    /// assert_eq!(tree.depth(), 0);
    /// ```
    #[must_use]
    pub fn new(alphabet: Alphabet) -> Self {
        let root = Node::new(Vec::new(), alphabet.len());

        Self {
            alphabet,
            nodes: vec![root],
            depth: 0,
            default_probability: None,
            original_sequence_length: 0,
        }
    }

    /// Makes [`ContextTree::conditional_probability`] return `probability`
    /// for contexts that have no node, instead of failing.
    #[must_use]
    pub fn with_default_probability(mut self, probability: f64) -> Self {
        self.default_probability = Some(probability);
        self
    }

    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Returns the number of nodes, including the root.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.nodes[NodeId::ROOT.index()]
    }

    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Returns the length of the longest context in the tree.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Iterates over the nodes that have no children.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_leaf())
            .map(|(index, _)| NodeId::new(index))
    }

    /// Iterates over all node ids, root first, shallower nodes before deeper
    /// ones, siblings in alphabet order.
    #[must_use]
    pub fn breadth_first(&self) -> BreadthFirst<'_> {
        BreadthFirst::new(self)
    }

    /// Adds a node for `context`, along with all its missing ancestors.
    /// Returns the id of the node, which may have already existed.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::tree::ContextTree;
    ///
    /// let mut tree = ContextTree::new(Alphabet::nucleotides());
    /// let id = tree.insert(b"GAT").unwrap();
    /// assert_eq!(tree.size(), 4);
    /// assert_eq!(tree.node(id).context(), b"GAT");
    /// assert!(tree.get(b"GA").is_some());
    /// assert!(tree.insert(b"GAN").is_err());
    /// ```
    pub fn insert(&mut self, context: &[u8]) -> Result<NodeId, TranslationError> {
        let indices = self.alphabet.translate_all(context)?;

        let mut current = NodeId::ROOT;
        for (depth, index) in indices.into_iter().enumerate() {
            current = match self.node(current).child(index) {
                Some(child) => child,
                None => {
                    let child = NodeId::new(self.nodes.len());
                    self.nodes
                        .push(Node::new(context[..=depth].to_vec(), self.alphabet.len()));
                    self.node_mut(current).children[index] = Some(child);
                    child
                }
            };
        }
        self.depth = self.depth.max(context.len());

        Ok(current)
    }

    /// Returns the id of the node with exactly given context.
    #[must_use]
    pub fn find(&self, context: &[u8]) -> Option<NodeId> {
        let mut current = NodeId::ROOT;
        for &symbol in context {
            let index = self.alphabet.index_of(symbol)?;
            current = self.node(current).child(index)?;
        }

        Some(current)
    }

    /// Returns the node with exactly given context. There is no backoff.
    #[must_use]
    pub fn get(&self, context: &[u8]) -> Option<&Node> {
        self.find(context).map(|id| self.node(id))
    }

    /// Returns the id of the deepest node whose context is a prefix of
    /// `context`.
    #[must_use]
    pub fn longest_prefix_id(&self, context: &[u8]) -> NodeId {
        let mut current = NodeId::ROOT;
        for &symbol in context {
            let child = self
                .alphabet
                .index_of(symbol)
                .and_then(|index| self.node(current).child(index));
            match child {
                Some(child) => current = child,
                None => break,
            }
        }

        current
    }

    /// Descends along `context` as far as the nodes exist. Returns the root
    /// if not even the first symbol matches.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::tree::ContextTree;
    ///
    /// let mut tree = ContextTree::new(Alphabet::nucleotides());
    /// tree.insert(b"GA").unwrap();
    /// assert_eq!(tree.get_longest_prefix(b"GATT").context(), b"GA");
    /// assert_eq!(tree.get_longest_prefix(b"TT").context(), b"");
    /// ```
    #[must_use]
    pub fn get_longest_prefix(&self, context: &[u8]) -> &Node {
        self.node(self.longest_prefix_id(context))
    }

    /// Returns the id of the node with the longest context that is a suffix
    /// of `history`. Only the last [`ContextTree::depth`] bytes are
    /// considered.
    #[must_use]
    pub fn longest_suffix_id(&self, history: &[u8]) -> NodeId {
        let start = history.len().saturating_sub(self.depth());
        (start..history.len())
            .find_map(|i| self.find(&history[i..]))
            .unwrap_or(NodeId::ROOT)
    }

    /// Probability of `symbol` following `context`.
    ///
    /// Fails if there is no node for the context (and no default probability
    /// has been set), or if the symbol is not in the alphabet.
    pub fn conditional_probability(
        &self,
        symbol: u8,
        context: &[u8],
    ) -> Result<f64, UnknownProbability> {
        let index = self
            .alphabet
            .index_of(symbol)
            .ok_or_else(|| UnknownProbability::for_symbol(context, symbol))?;

        match self.find(context) {
            Some(id) => Ok(self.node(id).distribution().get(index)),
            None => self
                .default_probability
                .ok_or_else(|| UnknownProbability::for_symbol(context, symbol)),
        }
    }

    /// Returns the whole distribution following `context`.
    ///
    /// Unlike [`ContextTree::conditional_probability`], this does not fall
    /// back to the default probability: a context without a node is always
    /// an error, since a single per-symbol default does not make up a
    /// distribution.
    pub fn conditionals_from(&self, context: &[u8]) -> Result<&Distribution, UnknownProbability> {
        self.get(context)
            .map(Node::distribution)
            .ok_or_else(|| UnknownProbability::for_context(context))
    }

    /// Probability of `bytes`: the product of the probabilities of each
    /// symbol given all the symbols before it.
    pub fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        (0..bytes.len())
            .map(|i| self.conditional_probability(bytes[i], &bytes[..i]))
            .product()
    }

    /// Fills the distribution of every node with the conditional
    /// probabilities given by `source`, and normalizes it. Probabilities
    /// that the source does not know are assumed to be 0.
    pub fn fill_from<S: SpectrumSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<(), DistributionError> {
        if source.alphabet().len() != self.alphabet.len() {
            return Err(DistributionError::SizeMismatch(
                self.alphabet.len(),
                source.alphabet().len(),
            ));
        }

        self.original_sequence_length = source.original_sequence_length();
        self.fill_node(NodeId::ROOT, source)
    }

    fn fill_node<S: SpectrumSource + ?Sized>(
        &mut self,
        id: NodeId,
        source: &S,
    ) -> Result<(), DistributionError> {
        let node = self.node(id);
        let values = self
            .alphabet
            .symbols()
            .iter()
            .map(|&symbol| {
                source
                    .conditional_probability(symbol, node.context())
                    .unwrap_or(0.0)
            });
        let mut distribution = Distribution::from_probabilities(values)?;
        distribution.normalize()?;

        let children: Vec<NodeId> = node.children().collect();
        self.node_mut(id).distribution = distribution;
        for child in children {
            self.fill_node(child, source)?;
        }

        Ok(())
    }

    /// Compares two trees by value: alphabet, node layout, contexts and
    /// distributions (within [`Distribution::EQ_THRESHOLD`]). Node ids are
    /// not compared.
    #[must_use]
    pub fn equal_value(&self, other: &ContextTree) -> bool {
        self.alphabet == other.alphabet && self.equal_subtree(NodeId::ROOT, other, NodeId::ROOT)
    }

    fn equal_subtree(&self, id: NodeId, other: &ContextTree, other_id: NodeId) -> bool {
        let node = self.node(id);
        let other_node = other.node(other_id);

        node.context == other_node.context
            && node.distribution == other_node.distribution
            && node
                .children
                .iter()
                .zip(other_node.children.iter())
                .all(|(child, other_child)| match (child, other_child) {
                    (Some(child), Some(other_child)) => {
                        self.equal_subtree(*child, other, *other_child)
                    }
                    (None, None) => true,
                    _ => false,
                })
    }
}

impl SpectrumSource for ContextTree {
    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn conditional_probability(
        &self,
        symbol: u8,
        prefix: &[u8],
    ) -> Result<f64, UnknownProbability> {
        ContextTree::conditional_probability(self, symbol, prefix)
    }

    fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        ContextTree::total_probability(self, bytes)
    }

    fn original_sequence_length(&self) -> u64 {
        self.original_sequence_length
    }
}

/// Breadth-first iterator over the nodes of a [`ContextTree`].
#[derive(Debug)]
pub struct BreadthFirst<'a> {
    tree: &'a ContextTree,
    queue: VecDeque<NodeId>,
}

impl<'a> BreadthFirst<'a> {
    fn new(tree: &'a ContextTree) -> Self {
        Self {
            tree,
            queue: VecDeque::from([NodeId::ROOT]),
        }
    }
}

impl<'a> Iterator for BreadthFirst<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        self.queue.extend(self.tree.node(id).children());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::_internal_test_data::abcd_spectrum;
    use crate::alphabet::{Alphabet, TranslationError};
    use crate::spectrum::{SpectrumSource, UnknownProbability};
    use crate::tree::{ContextTree, NodeId};

    fn abcd_tree() -> ContextTree {
        let spectrum = abcd_spectrum();
        let mut tree = ContextTree::new(spectrum.alphabet().clone());
        tree.insert(b"bc").unwrap();
        tree.insert(b"ba").unwrap();
        tree.insert(b"a").unwrap();
        tree.fill_from(&spectrum).unwrap();
        tree
    }

    #[test]
    fn test_conditional_probability() {
        let tree = abcd_tree();

        assert_abs_diff_eq!(tree.conditional_probability(b'd', b"").unwrap(), 0.4);
        assert_abs_diff_eq!(tree.conditional_probability(b'd', b"b").unwrap(), 0.36);
        assert_abs_diff_eq!(tree.conditional_probability(b'd', b"a").unwrap(), 0.0);
        assert_eq!(
            tree.conditional_probability(b'd', b"c"),
            Err(UnknownProbability::for_symbol(b"c", b'd'))
        );
        assert_eq!(
            tree.conditional_probability(b'e', b""),
            Err(UnknownProbability::for_symbol(b"", b'e'))
        );
    }

    #[test]
    fn test_total_probability() {
        let tree = abcd_tree();

        assert_abs_diff_eq!(tree.total_probability(b"").unwrap(), 1.0);
        assert_abs_diff_eq!(tree.total_probability(b"b").unwrap(), 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(tree.total_probability(b"ba").unwrap(), 0.022, epsilon = 1e-9);
        assert_abs_diff_eq!(tree.total_probability(b"bc").unwrap(), 0.062, epsilon = 1e-9);
        assert!(tree.total_probability(b"badd").is_err());
    }

    #[test]
    fn test_default_probability() {
        let tree = abcd_tree().with_default_probability(0.25);

        assert_abs_diff_eq!(tree.conditional_probability(b'd', b"cc").unwrap(), 0.25);
        assert_abs_diff_eq!(tree.conditional_probability(b'd', b"b").unwrap(), 0.36);
    }

    #[test]
    fn test_depth_follows_inserts() {
        let mut tree = ContextTree::new(Alphabet::nucleotides());

        tree.insert(b"GA").unwrap();
        assert_eq!(tree.depth(), 2);
        tree.insert(b"TTTT").unwrap();
        tree.insert(b"C").unwrap();
        assert_eq!(tree.depth(), 4);
        assert!(tree.insert(b"AAAAAAN").is_err());
        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.clone().depth(), 4);
        assert_eq!(
            tree.depth(),
            tree.breadth_first()
                .map(|id| tree.node(id).depth())
                .max()
                .unwrap()
        );
    }

    #[test]
    fn test_default_probability_does_not_make_distributions() {
        let tree = abcd_tree().with_default_probability(0.25);

        assert_abs_diff_eq!(tree.conditional_probability(b'a', b"dd").unwrap(), 0.25);
        assert_eq!(
            tree.conditionals_from(b"dd"),
            Err(UnknownProbability::for_context(b"dd"))
        );
    }

    #[test]
    fn test_structure() {
        let tree = abcd_tree();

        assert_eq!(tree.size(), 5);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.leaves().count(), 3);
        assert!(tree.root().child(2).is_none());
        assert_eq!(tree.get(b"b").unwrap().children().count(), 2);
        assert!(tree.get(b"ab").is_none());
        assert!(tree.get(b"x").is_none());
    }

    #[test]
    fn test_breadth_first_order() {
        let tree = abcd_tree();

        let contexts: Vec<&[u8]> = tree
            .breadth_first()
            .map(|id| tree.node(id).context())
            .collect();

        assert_eq!(contexts, [&b""[..], b"a", b"b", b"ba", b"bc"]);
    }

    #[test]
    fn test_longest_prefix_and_suffix() {
        let tree = abcd_tree();

        assert_eq!(tree.get_longest_prefix(b"bcd").context(), b"bc");
        assert_eq!(tree.get_longest_prefix(b"bd").context(), b"b");
        assert_eq!(tree.get_longest_prefix(b"d").context(), b"");
        assert_eq!(tree.get_longest_prefix(b"").context(), b"");

        assert_eq!(tree.node(tree.longest_suffix_id(b"ddba")).context(), b"ba");
        assert_eq!(tree.node(tree.longest_suffix_id(b"ddb")).context(), b"b");
        assert_eq!(tree.longest_suffix_id(b"dd"), NodeId::ROOT);
        assert_eq!(tree.longest_suffix_id(b""), NodeId::ROOT);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut tree = ContextTree::new(Alphabet::nucleotides());

        let first = tree.insert(b"ACG").unwrap();
        let second = tree.insert(b"ACG").unwrap();

        assert_eq!(first, second);
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.insert(b""), Ok(NodeId::ROOT));
        assert_eq!(tree.insert(b"AXG"), Err(TranslationError(b'X')));
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn test_clone_equal_value() {
        let empty = ContextTree::new(Alphabet::nucleotides());
        assert!(empty.clone().equal_value(&empty));

        let tree = abcd_tree();
        let mut cloned = tree.clone();
        assert!(cloned.equal_value(&tree));

        let id = cloned.find(b"ba").unwrap();
        cloned.node_mut(id).distribution_mut().put(0, 0.5).unwrap();
        assert!(!cloned.equal_value(&tree));
        assert!(tree.equal_value(&abcd_tree()));
    }

    #[test]
    fn test_equal_value_compares_layout() {
        let mut first = ContextTree::new(Alphabet::nucleotides());
        let mut second = ContextTree::new(Alphabet::nucleotides());
        first.insert(b"A").unwrap();
        first.insert(b"C").unwrap();
        second.insert(b"C").unwrap();

        assert!(!first.equal_value(&second));
        second.insert(b"A").unwrap();
        assert!(first.equal_value(&second));
        assert!(!first.equal_value(&ContextTree::new(Alphabet::new(*b"ACGU").unwrap())));
    }

    #[test]
    fn test_tree_as_spectrum_source() {
        let tree = abcd_tree();
        let source: &dyn SpectrumSource = &tree;

        assert_abs_diff_eq!(source.conditional_probability(b'a', b"b").unwrap(), 0.11);
        assert_eq!(source.original_sequence_length(), 1000);
    }
}
