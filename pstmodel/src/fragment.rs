use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::alphabet::{Alphabet, TranslationError};

/// Error occurring when reading a symbol from a [`SequenceReader`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FragmentReadError {
    /// There are no more symbols to read.
    EndOfSequence,
    /// A symbol has been read, but it is not a part of the translation
    /// alphabet.
    Translation(TranslationError),
}

impl From<TranslationError> for FragmentReadError {
    fn from(e: TranslationError) -> Self {
        Self::Translation(e)
    }
}

impl Display for FragmentReadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentReadError::EndOfSequence => write!(f, "End of sequence"),
            FragmentReadError::Translation(e) => write!(f, "Translation error: {}", e),
        }
    }
}

impl Error for FragmentReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FragmentReadError::Translation(e) => Some(e),
            FragmentReadError::EndOfSequence => None,
        }
    }
}

/// A stateful, resettable reader of sequence symbols.
pub trait SequenceReader: Debug + Send {
    /// Reads the next raw byte.
    fn read(&mut self) -> Result<u8, FragmentReadError>;

    /// Reads the next byte and translates it to its position in the
    /// translation alphabet. A byte that cannot be translated is still
    /// consumed.
    fn read_translated(&mut self) -> Result<usize, FragmentReadError> {
        let symbol = self.read()?;
        Ok(self.translation_alphabet().translate(symbol)?)
    }

    fn set_translation_alphabet(&mut self, alphabet: Alphabet);

    fn translation_alphabet(&self) -> &Alphabet;

    /// Moves back to the beginning of the sequence.
    fn reset(&mut self);
}

/// [`SequenceReader`] over an in-memory byte string.
///
/// # Examples
/// ```
/// use pstmodel::fragment::{FragmentReadError, FragmentReader, SequenceReader};
///
/// let mut reader = FragmentReader::new("GAN");
/// assert_eq!(reader.read_translated(), Ok(2));
/// assert_eq!(reader.read(), Ok(b'A'));
/// assert!(matches!(reader.read_translated(), Err(FragmentReadError::Translation(_))));
/// assert_eq!(reader.read(), Err(FragmentReadError::EndOfSequence));
/// ```
#[derive(Debug, Clone)]
pub struct FragmentReader {
    data: Vec<u8>,
    position: usize,
    alphabet: Alphabet,
}

impl FragmentReader {
    /// Creates a reader translating to the nucleotide alphabet.
    #[must_use]
    pub fn new<T: Into<Vec<u8>>>(data: T) -> Self {
        Self {
            data: data.into(),
            position: 0,
            alphabet: Alphabet::nucleotides(),
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

impl SequenceReader for FragmentReader {
    fn read(&mut self) -> Result<u8, FragmentReadError> {
        let symbol = *self
            .data
            .get(self.position)
            .ok_or(FragmentReadError::EndOfSequence)?;
        self.position += 1;

        Ok(symbol)
    }

    fn set_translation_alphabet(&mut self, alphabet: Alphabet) {
        self.alphabet = alphabet;
    }

    fn translation_alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

/// Identifier (title/name) of a sequence fragment.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Default)]
pub struct FragmentIdentifier(pub String);

impl FragmentIdentifier {
    #[inline]
    #[must_use]
    pub fn str(&self) -> &str {
        &self.0
    }
}

impl Display for FragmentIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FragmentIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FragmentIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The reader of a fragment was left in an unknown state by a thread that
/// panicked while holding it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PoisonedReader;

impl Display for PoisonedReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sequence reader lock poisoned")
    }
}

impl Error for PoisonedReader {}

/// A named sequence whose reader can be shared between threads.
///
/// The reader's position is shared state, so it can only be accessed through
/// [`SequenceFragment::lock`].
#[derive(Debug)]
pub struct SequenceFragment<R: SequenceReader = FragmentReader> {
    identifier: FragmentIdentifier,
    reader: Mutex<R>,
}

impl SequenceFragment<FragmentReader> {
    /// Creates a fragment reading from an in-memory byte string.
    #[must_use]
    pub fn new<I, T>(identifier: I, data: T) -> Self
    where
        I: Into<FragmentIdentifier>,
        T: Into<Vec<u8>>,
    {
        Self::with_reader(identifier, FragmentReader::new(data))
    }
}

impl<R: SequenceReader> SequenceFragment<R> {
    #[must_use]
    pub fn with_reader<I: Into<FragmentIdentifier>>(identifier: I, reader: R) -> Self {
        Self {
            identifier: identifier.into(),
            reader: Mutex::new(reader),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &FragmentIdentifier {
        &self.identifier
    }

    /// Acquires exclusive access to the reader. The reader is reset both when
    /// acquired and when the returned guard is dropped.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::fragment::{SequenceFragment, SequenceReader};
    ///
    /// let fragment = SequenceFragment::new("seq1", "ACGT");
    /// {
    ///     let mut reader = fragment.lock().unwrap();
    ///     assert_eq!(reader.read(), Ok(b'A'));
    /// }
    /// assert_eq!(fragment.lock().unwrap().read(), Ok(b'A'));
    /// ```
    pub fn lock(&self) -> Result<FragmentReaderGuard<'_, R>, PoisonedReader> {
        let guard = self.reader.lock().map_err(|_| PoisonedReader)?;
        Ok(FragmentReaderGuard::new(guard))
    }

    pub fn into_reader(self) -> Result<R, PoisonedReader> {
        self.reader.into_inner().map_err(|_| PoisonedReader)
    }
}

/// Exclusive access to the reader of a [`SequenceFragment`].
#[derive(Debug)]
#[must_use]
pub struct FragmentReaderGuard<'a, R: SequenceReader> {
    reader: MutexGuard<'a, R>,
}

impl<'a, R: SequenceReader> FragmentReaderGuard<'a, R> {
    fn new(mut reader: MutexGuard<'a, R>) -> Self {
        reader.reset();
        Self { reader }
    }
}

impl<'a, R: SequenceReader> Deref for FragmentReaderGuard<'a, R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<'a, R: SequenceReader> DerefMut for FragmentReaderGuard<'a, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

impl<'a, R: SequenceReader> Drop for FragmentReaderGuard<'a, R> {
    fn drop(&mut self) {
        self.reader.reset();
    }
}
