use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

use log::debug;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::alphabet::{Alphabet, TranslationError};
use crate::progress::{ByteNum, DummyProgressNotifier, ProgressNotifier};

/// There is no known probability for a symbol after a context (or for a whole
/// byte string).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnknownProbability {
    context: Vec<u8>,
    symbol: Option<u8>,
}

impl UnknownProbability {
    #[must_use]
    pub fn for_symbol(context: &[u8], symbol: u8) -> Self {
        Self {
            context: context.to_vec(),
            symbol: Some(symbol),
        }
    }

    #[must_use]
    pub fn for_context(context: &[u8]) -> Self {
        Self {
            context: context.to_vec(),
            symbol: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> &[u8] {
        &self.context
    }

    #[must_use]
    pub fn symbol(&self) -> Option<u8> {
        self.symbol
    }
}

impl Display for UnknownProbability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.symbol {
            Some(symbol) => write!(
                f,
                "Unknown probability of `{}` after `{}`",
                symbol.escape_ascii(),
                self.context.escape_ascii()
            ),
            None => write!(
                f,
                "Unknown probability of `{}`",
                self.context.escape_ascii()
            ),
        }
    }
}

impl Error for UnknownProbability {}

/// A source of empirical probabilities that a model can be learned from.
pub trait SpectrumSource {
    /// The alphabet all the probabilities are defined over.
    fn alphabet(&self) -> &Alphabet;

    /// Probability of `symbol` directly following `prefix`.
    fn conditional_probability(&self, symbol: u8, prefix: &[u8])
        -> Result<f64, UnknownProbability>;

    /// Probability of encountering `bytes` in the source.
    fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability>;

    /// Number of symbols the source was built from (0 if not known).
    fn original_sequence_length(&self) -> u64;
}

impl<T: SpectrumSource + ?Sized> SpectrumSource for &T {
    fn alphabet(&self) -> &Alphabet {
        T::alphabet(self)
    }

    fn conditional_probability(
        &self,
        symbol: u8,
        prefix: &[u8],
    ) -> Result<f64, UnknownProbability> {
        T::conditional_probability(self, symbol, prefix)
    }

    fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        T::total_probability(self, bytes)
    }

    fn original_sequence_length(&self) -> u64 {
        T::original_sequence_length(self)
    }
}

/// A counter for symbols. Allows to calculate how often does a certain symbol
/// follow a context.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContextCounter {
    counts: Vec<u64>,
}

impl ContextCounter {
    /// Creates a new `ContextCounter` for an alphabet of `size` symbols.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::spectrum::ContextCounter;
    ///
    /// let counter = ContextCounter::new(4);
    /// assert_eq!(counter.count(), 0);
    /// ```
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            counts: vec![0; size],
        }
    }

    /// Adds a symbol (given as its alphabet index) to the counter.
    pub fn add(&mut self, index: usize) {
        self.counts[index] += 1;
    }

    /// Returns how many times the symbol at `index` has been added.
    #[must_use]
    pub fn get(&self, index: usize) -> u64 {
        self.counts[index]
    }

    /// Gets the fraction of all symbols added that were `index`.
    ///
    /// # Examples
    /// ```
    /// use approx::assert_abs_diff_eq;
    /// use pstmodel::spectrum::ContextCounter;
    ///
    /// let mut counter = ContextCounter::new(4);
    /// counter.add(0);
    /// counter.add(0);
    /// counter.add(1);
    /// assert_abs_diff_eq!(counter.percentage(0), 0.6666666666666666);
    /// assert_abs_diff_eq!(counter.percentage(1), 0.3333333333333333);
    /// ```
    #[must_use]
    pub fn percentage(&self, index: usize) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.counts[index] as f64 / count as f64
    }

    /// Returns the total number of symbols added so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn merge(&mut self, other: &ContextCounter) {
        for (count, other_count) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += other_count;
        }
    }
}

#[derive(Debug, Clone)]
struct SpectrumCounts {
    counters: HashMap<Vec<u8>, ContextCounter>,
    window_totals: Vec<u64>,
    sequence_length: u64,
}

impl SpectrumCounts {
    #[must_use]
    fn new(max_order: usize) -> Self {
        Self {
            counters: HashMap::new(),
            window_totals: vec![0; max_order + 2],
            sequence_length: 0,
        }
    }

    fn add_sequence(&mut self, alphabet: &Alphabet, max_order: usize, sequence: &[u8]) {
        let mut run_start = 0;

        for (i, &symbol) in sequence.iter().enumerate() {
            let index = match alphabet.index_of(symbol) {
                Some(index) => index,
                None => {
                    run_start = i + 1;
                    continue;
                }
            };

            let max_len = (i - run_start).min(max_order);
            for len in 0..=max_len {
                let context = &sequence[i - len..i];
                match self.counters.get_mut(context) {
                    Some(counter) => counter.add(index),
                    None => {
                        let mut counter = ContextCounter::new(alphabet.len());
                        counter.add(index);
                        self.counters.insert(context.to_vec(), counter);
                    }
                }
                self.window_totals[len + 1] += 1;
            }
            self.sequence_length += 1;
        }
    }

    #[must_use]
    fn merge(mut self, other: SpectrumCounts) -> Self {
        for (context, counter) in other.counters {
            match self.counters.get_mut(&context) {
                Some(existing) => existing.merge(&counter),
                None => {
                    self.counters.insert(context, counter);
                }
            }
        }
        for (total, other_total) in self.window_totals.iter_mut().zip(other.window_totals) {
            *total += other_total;
        }
        self.sequence_length += other.sequence_length;

        self
    }
}

/// Empirical k-mer spectrum of a set of training sequences.
///
/// For every context of length `0..=max_order` the spectrum counts how many
/// times each alphabet symbol follows it. Bytes outside the alphabet break
/// the context, i.e. no window spans over them.
#[derive(Debug, Clone)]
pub struct KmerSpectrum {
    alphabet: Alphabet,
    max_order: usize,
    counts: SpectrumCounts,
}

impl KmerSpectrum {
    /// Creates an empty `KmerSpectrum` instance.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::spectrum::{KmerSpectrum, SpectrumSource};
    ///
    /// let mut spectrum = KmerSpectrum::new(Alphabet::nucleotides(), 2);
    /// spectrum.add_sequence(b"ACGTACGT");
    /// assert_eq!(spectrum.original_sequence_length(), 8);
    /// assert_eq!(spectrum.conditional_probability(b'G', b"AC"), Ok(1.0));
    /// ```
    #[must_use]
    pub fn new(alphabet: Alphabet, max_order: usize) -> Self {
        Self {
            alphabet,
            max_order,
            counts: SpectrumCounts::new(max_order),
        }
    }

    /// Counts all given sequences, using all the available threads.
    #[must_use]
    pub fn from_sequences<S>(alphabet: Alphabet, max_order: usize, sequences: &[S]) -> Self
    where
        S: AsRef<[u8]> + Sync,
    {
        Self::from_sequences_with_progress(alphabet, max_order, sequences, &DummyProgressNotifier)
    }

    /// Same as [`KmerSpectrum::from_sequences`], reporting the number of bytes
    /// processed to given notifier.
    #[must_use]
    pub fn from_sequences_with_progress<S, P>(
        alphabet: Alphabet,
        max_order: usize,
        sequences: &[S],
        progress_notifier: &P,
    ) -> Self
    where
        S: AsRef<[u8]> + Sync,
        P: ProgressNotifier + ?Sized,
    {
        let counts = sequences
            .par_iter()
            .fold(
                || SpectrumCounts::new(max_order),
                |mut counts, sequence| {
                    let sequence = sequence.as_ref();
                    counts.add_sequence(&alphabet, max_order, sequence);
                    progress_notifier.processed_bytes(ByteNum::new(sequence.len()));
                    counts
                },
            )
            .reduce(|| SpectrumCounts::new(max_order), SpectrumCounts::merge);

        debug!(
            "Counted {} contexts over {} symbols in {} sequences",
            counts.counters.len(),
            counts.sequence_length,
            sequences.len()
        );

        Self {
            alphabet,
            max_order,
            counts,
        }
    }

    /// Adds a single sequence to the spectrum.
    pub fn add_sequence(&mut self, sequence: &[u8]) {
        self.counts
            .add_sequence(&self.alphabet, self.max_order, sequence);
    }

    /// Longest context the spectrum keeps the counts for.
    #[must_use]
    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// Returns the number of distinct contexts encountered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.counters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.counters.is_empty()
    }

    /// Returns the follower counter of given context, if it has been seen.
    #[must_use]
    pub fn counter(&self, context: &[u8]) -> Option<&ContextCounter> {
        self.counts.counters.get(context)
    }
}

impl SpectrumSource for KmerSpectrum {
    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn conditional_probability(
        &self,
        symbol: u8,
        prefix: &[u8],
    ) -> Result<f64, UnknownProbability> {
        let unknown = || UnknownProbability::for_symbol(prefix, symbol);

        let index = self.alphabet.index_of(symbol).ok_or_else(unknown)?;
        let counter = self.counter(prefix).ok_or_else(unknown)?;
        if counter.count() == 0 {
            return Err(unknown());
        }

        Ok(counter.percentage(index))
    }

    fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        let unknown = || UnknownProbability::for_context(bytes);

        let (last, context) = match bytes.split_last() {
            Some(split) => split,
            None => return Ok(1.0),
        };
        if bytes.len() > self.max_order + 1 {
            return Err(unknown());
        }

        let windows = self.counts.window_totals[bytes.len()];
        if windows == 0 {
            return Err(unknown());
        }
        let index = self.alphabet.index_of(*last).ok_or_else(unknown)?;
        let occurrences = self.counter(context).map_or(0, |counter| counter.get(index));

        Ok(occurrences as f64 / windows as f64)
    }

    fn original_sequence_length(&self) -> u64 {
        self.counts.sequence_length
    }
}

/// A spectrum given as an explicit table of conditional probabilities.
///
/// The total probability of a byte string is the product of the conditional
/// probabilities of its symbols, each given all the preceding ones.
#[derive(Debug, Clone)]
pub struct TableSpectrum {
    alphabet: Alphabet,
    table: HashMap<Vec<u8>, Vec<Option<f64>>>,
    sequence_length: u64,
}

impl TableSpectrum {
    #[must_use]
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            table: HashMap::new(),
            sequence_length: 0,
        }
    }

    /// Sets `P(symbol | context)`.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    /// use pstmodel::spectrum::{SpectrumSource, TableSpectrum};
    ///
    /// let mut spectrum = TableSpectrum::new(Alphabet::new(*b"ab").unwrap());
    /// spectrum.set(b"", b'a', 0.5).unwrap();
    /// spectrum.set(b"a", b'b', 0.25).unwrap();
    /// assert_eq!(spectrum.total_probability(b"ab"), Ok(0.125));
    /// assert!(spectrum.conditional_probability(b'b', b"b").is_err());
    /// ```
    pub fn set(
        &mut self,
        context: &[u8],
        symbol: u8,
        probability: f64,
    ) -> Result<(), TranslationError> {
        let index = self.alphabet.translate(symbol)?;
        if let Some(&invalid) = context.iter().find(|&&x| !self.alphabet.contains(x)) {
            return Err(TranslationError(invalid));
        }

        let size = self.alphabet.len();
        self.table
            .entry(context.to_vec())
            .or_insert_with(|| vec![None; size])[index] = Some(probability);
        Ok(())
    }

    /// Sets the whole distribution following `context`, in alphabet order.
    pub fn set_all(&mut self, context: &[u8], probabilities: &[f64]) -> Result<(), TranslationError> {
        for (index, &probability) in probabilities.iter().enumerate() {
            let symbol = self.alphabet.symbol(index);
            self.set(context, symbol, probability)?;
        }
        Ok(())
    }

    pub fn set_original_sequence_length(&mut self, length: u64) {
        self.sequence_length = length;
    }
}

impl SpectrumSource for TableSpectrum {
    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn conditional_probability(
        &self,
        symbol: u8,
        prefix: &[u8],
    ) -> Result<f64, UnknownProbability> {
        self.alphabet
            .index_of(symbol)
            .and_then(|index| self.table.get(prefix).and_then(|row| row[index]))
            .ok_or_else(|| UnknownProbability::for_symbol(prefix, symbol))
    }

    fn total_probability(&self, bytes: &[u8]) -> Result<f64, UnknownProbability> {
        (0..bytes.len())
            .map(|i| self.conditional_probability(bytes[i], &bytes[..i]))
            .product()
    }

    fn original_sequence_length(&self) -> u64 {
        self.sequence_length
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::alphabet::{Alphabet, TranslationError};
    use crate::progress::tests::CountingProgressNotifier;
    use crate::spectrum::{KmerSpectrum, SpectrumSource, TableSpectrum, UnknownProbability};

    #[test]
    fn test_kmer_spectrum_counts() {
        let mut spectrum = KmerSpectrum::new(Alphabet::nucleotides(), 1);
        spectrum.add_sequence(b"ACGTAC");

        assert_eq!(spectrum.original_sequence_length(), 6);
        assert_abs_diff_eq!(spectrum.conditional_probability(b'A', b"").unwrap(), 2.0 / 6.0);
        assert_abs_diff_eq!(spectrum.conditional_probability(b'G', b"").unwrap(), 1.0 / 6.0);
        assert_abs_diff_eq!(spectrum.conditional_probability(b'C', b"A").unwrap(), 1.0);
        assert_abs_diff_eq!(spectrum.conditional_probability(b'T', b"A").unwrap(), 0.0);
        assert_abs_diff_eq!(spectrum.total_probability(b"").unwrap(), 1.0);
        assert_abs_diff_eq!(spectrum.total_probability(b"A").unwrap(), 2.0 / 6.0);
        assert_abs_diff_eq!(spectrum.total_probability(b"AC").unwrap(), 2.0 / 5.0);
        assert_abs_diff_eq!(spectrum.total_probability(b"CA").unwrap(), 0.0);
    }

    #[test]
    fn test_kmer_spectrum_unknown() {
        let mut spectrum = KmerSpectrum::new(Alphabet::nucleotides(), 1);
        spectrum.add_sequence(b"ACGTAC");

        assert_eq!(
            spectrum.conditional_probability(b'A', b"AC"),
            Err(UnknownProbability::for_symbol(b"AC", b'A'))
        );
        assert_eq!(
            spectrum.conditional_probability(b'N', b""),
            Err(UnknownProbability::for_symbol(b"", b'N'))
        );
        assert_eq!(
            spectrum.total_probability(b"ACG"),
            Err(UnknownProbability::for_context(b"ACG"))
        );
    }

    #[test]
    fn test_kmer_spectrum_breaks_at_unknown_symbols() {
        let mut spectrum = KmerSpectrum::new(Alphabet::nucleotides(), 1);
        spectrum.add_sequence(b"ACNAC");

        assert_eq!(spectrum.original_sequence_length(), 4);
        assert_abs_diff_eq!(spectrum.total_probability(b"AC").unwrap(), 1.0);
        assert_eq!(spectrum.counter(b"C"), None);
    }

    #[test]
    fn test_kmer_spectrum_parallel_equals_sequential() {
        let sequences = [
            b"GATTTGGGGTTCAAAGCAGTATCGATCAAATAGTAAATCC".to_vec(),
            b"ATTTGTTCAACTCACAGTTTNNGATTACA".to_vec(),
            b"CCCCGGGGAAAATTTT".to_vec(),
        ];
        let notifier = CountingProgressNotifier::default();

        let parallel = KmerSpectrum::from_sequences_with_progress(
            Alphabet::nucleotides(),
            3,
            &sequences,
            &notifier,
        );
        let mut sequential = KmerSpectrum::new(Alphabet::nucleotides(), 3);
        for sequence in &sequences {
            sequential.add_sequence(sequence);
        }

        assert_eq!(parallel.len(), sequential.len());
        assert_eq!(
            parallel.original_sequence_length(),
            sequential.original_sequence_length()
        );
        for context in [&b""[..], b"A", b"GA", b"TTT", b"CAA"] {
            assert_eq!(parallel.counter(context), sequential.counter(context));
            assert_eq!(
                parallel.total_probability(context),
                sequential.total_probability(context)
            );
        }
        assert_eq!(
            notifier.bytes.load(std::sync::atomic::Ordering::Relaxed),
            sequences.iter().map(|x| x.len()).sum::<usize>()
        );
    }

    #[test]
    fn test_table_spectrum() {
        let mut spectrum = TableSpectrum::new(Alphabet::new(*b"abcd").unwrap());
        spectrum.set_all(b"", &[0.1, 0.2, 0.3, 0.4]).unwrap();
        spectrum.set(b"b", b'a', 0.11).unwrap();

        assert_eq!(spectrum.conditional_probability(b'd', b""), Ok(0.4));
        assert_abs_diff_eq!(spectrum.total_probability(b"ba").unwrap(), 0.022);
        assert!(spectrum.total_probability(b"bb").is_err());
        assert_eq!(spectrum.set(b"x", b'a', 0.5), Err(TranslationError(b'x')));
        assert_eq!(spectrum.set(b"a", b'e', 0.5), Err(TranslationError(b'e')));
    }

    #[test]
    fn test_unknown_probability_display() {
        assert_eq!(
            UnknownProbability::for_symbol(b"AC", b'G').to_string(),
            "Unknown probability of `G` after `AC`"
        );
        assert_eq!(
            UnknownProbability::for_context(b"ACG").to_string(),
            "Unknown probability of `ACG`"
        );
    }
}
