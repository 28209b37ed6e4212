use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use itertools::Itertools;

const INVALID_INDEX: u8 = u8::MAX;

/// Maximum number of symbols an [`Alphabet`] can hold.
pub const MAX_ALPHABET_SIZE: usize = INVALID_INDEX as usize;

/// Error occurring when constructing an [`Alphabet`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AlphabetError {
    /// No symbols were given.
    Empty,
    /// The same symbol was given more than once.
    DuplicateSymbol(u8),
    /// More than [`MAX_ALPHABET_SIZE`] symbols were given.
    TooManySymbols(usize),
}

impl Display for AlphabetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AlphabetError::Empty => write!(f, "Alphabet cannot be empty"),
            AlphabetError::DuplicateSymbol(symbol) => {
                write!(f, "Duplicate alphabet symbol: `{}`", *symbol as char)
            }
            AlphabetError::TooManySymbols(num) => write!(
                f,
                "Too many alphabet symbols (got: {}, limit: {})",
                num, MAX_ALPHABET_SIZE
            ),
        }
    }
}

impl Error for AlphabetError {}

/// A symbol was read that is not a part of the alphabet.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TranslationError(pub u8);

impl TranslationError {
    /// Returns the byte that could not be translated.
    #[must_use]
    pub fn symbol(&self) -> u8 {
        self.0
    }
}

impl Display for TranslationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol outside the alphabet: `{}`", self.0.escape_ascii())
    }
}

impl Error for TranslationError {}

/// An ordered, fixed set of byte symbols.
///
/// Every distribution and transition table in a model is a dense array
/// indexed by the position of a symbol in its alphabet. Translating a byte to
/// that position is a single table lookup.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Alphabet {
    symbols: Vec<u8>,
    indices: [u8; 256],
}

impl Alphabet {
    /// Creates a new `Alphabet` out of given symbols, keeping their order.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    ///
    /// let alphabet = Alphabet::new(*b"abcd").unwrap();
    /// assert_eq!(alphabet.len(), 4);
    /// assert_eq!(alphabet.index_of(b'c'), Some(2));
    /// assert!(Alphabet::new(*b"aa").is_err());
    /// ```
    pub fn new<T: Into<Vec<u8>>>(symbols: T) -> Result<Self, AlphabetError> {
        let symbols = symbols.into();
        if symbols.is_empty() {
            return Err(AlphabetError::Empty);
        }
        if symbols.len() > MAX_ALPHABET_SIZE {
            return Err(AlphabetError::TooManySymbols(symbols.len()));
        }

        let mut indices = [INVALID_INDEX; 256];
        for (index, &symbol) in symbols.iter().enumerate() {
            if indices[symbol as usize] != INVALID_INDEX {
                return Err(AlphabetError::DuplicateSymbol(symbol));
            }
            indices[symbol as usize] = index as u8;
        }

        Ok(Self { symbols, indices })
    }

    /// The four-letter nucleotide alphabet, `ACGT`.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::Alphabet;
    ///
    /// let alphabet = Alphabet::nucleotides();
    /// assert_eq!(alphabet.to_string(), "ACGT");
    /// ```
    #[must_use]
    pub fn nucleotides() -> Self {
        Self::new(*b"ACGT").expect("Nucleotide alphabet is valid")
    }

    /// Returns the number of symbols in this alphabet.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always `false`; an alphabet cannot be empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Returns the symbol at given position.
    ///
    /// # Panics
    /// This function panics if `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn symbol(&self, index: usize) -> u8 {
        self.symbols[index]
    }

    /// Returns the position of given symbol, or `None` if it is not a part of
    /// the alphabet.
    #[inline]
    #[must_use]
    pub fn index_of(&self, symbol: u8) -> Option<usize> {
        match self.indices[symbol as usize] {
            INVALID_INDEX => None,
            index => Some(index as usize),
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, symbol: u8) -> bool {
        self.index_of(symbol).is_some()
    }

    /// Same as [`Alphabet::index_of`], but returns a [`TranslationError`]
    /// for unknown symbols.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::alphabet::{Alphabet, TranslationError};
    ///
    /// let alphabet = Alphabet::nucleotides();
    /// assert_eq!(alphabet.translate(b'T'), Ok(3));
    /// assert_eq!(alphabet.translate(b'N'), Err(TranslationError(b'N')));
    /// ```
    #[inline]
    pub fn translate(&self, symbol: u8) -> Result<usize, TranslationError> {
        self.index_of(symbol).ok_or(TranslationError(symbol))
    }

    /// Translates a whole byte string, failing on the first unknown symbol.
    pub fn translate_all(&self, symbols: &[u8]) -> Result<Vec<usize>, TranslationError> {
        symbols.iter().map(|&symbol| self.translate(symbol)).collect()
    }

    /// Returns whether every byte of `symbols` belongs to this alphabet.
    #[must_use]
    pub fn contains_all(&self, symbols: &[u8]) -> bool {
        symbols.iter().all(|&symbol| self.contains(symbol))
    }
}

impl Debug for Alphabet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Alphabet").field(&self.to_string()).finish()
    }
}

impl Display for Alphabet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.symbols.iter().map(|x| x.escape_ascii()).join("")
        )
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::nucleotides()
    }
}

#[cfg(test)]
mod tests {
    use crate::alphabet::{Alphabet, AlphabetError, TranslationError};

    #[test]
    fn test_nucleotides() {
        let alphabet = Alphabet::nucleotides();

        assert_eq!(alphabet.symbols(), b"ACGT");
        assert_eq!(alphabet.index_of(b'A'), Some(0));
        assert_eq!(alphabet.index_of(b'C'), Some(1));
        assert_eq!(alphabet.index_of(b'G'), Some(2));
        assert_eq!(alphabet.index_of(b'T'), Some(3));
        assert_eq!(alphabet.index_of(b'N'), None);
        assert_eq!(alphabet.index_of(b'a'), None);
    }

    #[test]
    fn test_order_is_kept() {
        let alphabet = Alphabet::new(*b"TGCA").unwrap();

        assert_eq!(alphabet.symbol(0), b'T');
        assert_eq!(alphabet.translate(b'A'), Ok(3));
        assert_eq!(alphabet.translate_all(b"GAT"), Ok(vec![1, 3, 0]));
        assert_eq!(alphabet.translate_all(b"GXT"), Err(TranslationError(b'X')));
    }

    #[test]
    fn test_invalid_alphabets() {
        assert_eq!(Alphabet::new(Vec::new()), Err(AlphabetError::Empty));
        assert_eq!(
            Alphabet::new(*b"ACGA"),
            Err(AlphabetError::DuplicateSymbol(b'A'))
        );
        assert_eq!(
            Alphabet::new((0..=255).collect::<Vec<u8>>()),
            Err(AlphabetError::TooManySymbols(256))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Alphabet::new(*b"abcd").unwrap().to_string(), "abcd");
        assert_eq!(format!("{:?}", Alphabet::nucleotides()), "Alphabet(\"ACGT\")");
        assert_eq!(
            TranslationError(b'\n').to_string(),
            "Symbol outside the alphabet: `\\n`"
        );
    }

    #[test]
    fn test_contains_all() {
        let alphabet = Alphabet::nucleotides();

        assert!(alphabet.contains_all(b"GATTACA"));
        assert!(alphabet.contains_all(b""));
        assert!(!alphabet.contains_all(b"GANTACA"));
    }
}
