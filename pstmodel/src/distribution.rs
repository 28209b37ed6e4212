use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Add;

use derive_more::Deref;
use rand::Rng;

/// Shannon Entropy, as a non-negative float representing the number of entropy
/// bits.
///
/// # See also
/// * [Entropy on Wikipedia](https://en.wikipedia.org/wiki/Entropy_%28information_theory%29)
#[derive(Deref, Copy, Debug, PartialEq, PartialOrd, Clone, Default)]
#[repr(transparent)]
pub struct Entropy(f64);

impl Entropy {
    /// Creates a new `Entropy` object.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::distribution::Entropy;
    ///
    /// let entropy = Entropy::new(0.5);
    /// assert_eq!(entropy.get(), 0.5);
    /// ```
    ///
    /// # Panics
    /// This function panics if the value is negative, or is not finite.
    #[must_use]
    pub fn new(value: f64) -> Self {
        assert!(value.is_finite());
        assert!(value == 0.0 || value.is_sign_positive());

        Self(value)
    }

    /// Value of this `Entropy` object, as a float.
    #[must_use]
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Add for Entropy {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(*self + *rhs)
    }
}

impl From<f64> for Entropy {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Display for Entropy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} bits", self.0)
    }
}

/// Malformed probability table passed to a [`Distribution`].
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionError {
    /// Two distributions (or a distribution and an alphabet) have different
    /// number of symbols.
    SizeMismatch(usize, usize),
    /// A value is negative, infinite or NaN.
    InvalidValue(f64),
    /// The requested floor cannot be satisfied by any distribution of this
    /// size.
    ImpossibleFloor(f64, usize),
    /// Mixing weight is negative, infinite or NaN.
    InvalidWeight(f64),
}

impl Display for DistributionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionError::SizeMismatch(expected, actual) => write!(
                f,
                "Distribution size mismatch (expected: {}, actual: {})",
                expected, actual
            ),
            DistributionError::InvalidValue(value) => {
                write!(f, "Invalid probability value: {}", value)
            }
            DistributionError::ImpossibleFloor(floor, size) => write!(
                f,
                "Probability floor {} cannot be applied to {} symbols",
                floor, size
            ),
            DistributionError::InvalidWeight(weight) => {
                write!(f, "Invalid mixing weight: {}", weight)
            }
        }
    }
}

impl Error for DistributionError {}

/// Categorical distribution over the symbols of an alphabet.
///
/// Probabilities are stored densely, indexed by the alphabet position of a
/// symbol. A distribution that has never been filled is all zeros; such
/// distribution stays all zeros after [`Distribution::normalize`].
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    probs: Vec<f64>,
}

impl Distribution {
    /// Maximum absolute difference between two probabilities that are still
    /// considered equal.
    pub const EQ_THRESHOLD: f64 = 1e-9;
    const ZERO_THRESHOLD: f64 = 1e-12;

    /// Creates new all-zero distribution over `size` symbols.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::distribution::Distribution;
    ///
    /// let distribution = Distribution::new(4);
    /// assert_eq!(distribution.len(), 4);
    /// assert!(distribution.is_zero());
    /// ```
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            probs: vec![0.0; size],
        }
    }

    /// Creates a distribution that assigns the same probability to all
    /// symbols.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::distribution::Distribution;
    ///
    /// let distribution = Distribution::uniform(4);
    /// assert_eq!(distribution.get(2), 0.25);
    /// assert!(distribution.is_normalized());
    /// ```
    #[must_use]
    pub fn uniform(size: usize) -> Self {
        Self {
            probs: vec![1.0 / size as f64; size],
        }
    }

    /// Creates a distribution out of raw values. The values are validated but
    /// not normalized.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::distribution::Distribution;
    ///
    /// let distribution = Distribution::from_probabilities([0.1, 0.2, 0.3, 0.4]).unwrap();
    /// assert_eq!(distribution.get(3), 0.4);
    /// assert!(Distribution::from_probabilities([0.1, -0.2]).is_err());
    /// ```
    pub fn from_probabilities<I>(values: I) -> Result<Self, DistributionError>
    where
        I: IntoIterator<Item = f64>,
    {
        let probs: Vec<f64> = values.into_iter().collect();
        if let Some(&value) = probs.iter().find(|x| !Self::is_valid_value(**x)) {
            return Err(DistributionError::InvalidValue(value));
        }

        Ok(Self { probs })
    }

    #[inline]
    fn is_valid_value(value: f64) -> bool {
        value.is_finite() && value >= 0.0
    }

    /// Returns the number of symbols this distribution is defined over.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Returns the probability of the symbol at given alphabet position.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> f64 {
        self.probs[index]
    }

    /// Sets the (unnormalized) value for the symbol at given alphabet
    /// position.
    pub fn put(&mut self, index: usize, value: f64) -> Result<(), DistributionError> {
        if index >= self.probs.len() {
            return Err(DistributionError::SizeMismatch(self.probs.len(), index + 1));
        }
        if !Self::is_valid_value(value) {
            return Err(DistributionError::InvalidValue(value));
        }

        self.probs[index] = value;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.probs.iter().sum()
    }

    /// Returns `true` if every probability is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.probs.iter().all(|&x| x == 0.0)
    }

    /// Returns `true` if the probabilities sum up to 1.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= Self::EQ_THRESHOLD
    }

    /// Scales the values so they sum up to 1. All-zero distributions are left
    /// untouched.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::distribution::Distribution;
    ///
    /// let mut distribution = Distribution::from_probabilities([1.0, 3.0]).unwrap();
    /// distribution.normalize().unwrap();
    /// assert_eq!(distribution.as_slice(), [0.25, 0.75]);
    /// ```
    pub fn normalize(&mut self) -> Result<(), DistributionError> {
        if let Some(&value) = self.probs.iter().find(|x| !Self::is_valid_value(**x)) {
            return Err(DistributionError::InvalidValue(value));
        }

        let total = self.total();
        if total == 0.0 {
            return Ok(());
        }
        if !total.is_finite() {
            return Err(DistributionError::InvalidValue(total));
        }

        for prob in &mut self.probs {
            *prob /= total;
        }
        Ok(())
    }

    /// Draws a random symbol index. Returns `None` for all-zero distributions.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let total = self.total();
        if total <= 0.0 {
            return None;
        }

        let mut point = rng.gen::<f64>() * total;
        let mut last_nonzero = None;
        for (index, &prob) in self.probs.iter().enumerate() {
            if prob <= 0.0 {
                continue;
            }
            if point < prob {
                return Some(index);
            }
            point -= prob;
            last_nonzero = Some(index);
        }

        // Rounding can leave a tiny remainder past the last bucket
        last_nonzero
    }

    /// Mixes `other` into this distribution: `p = (p + weight * o) / (1 +
    /// weight)`. The result stays normalized if both inputs are.
    ///
    /// # Examples
    /// ```
    /// use approx::assert_abs_diff_eq;
    /// use pstmodel::distribution::Distribution;
    ///
    /// let mut distribution = Distribution::from_probabilities([1.0, 0.0]).unwrap();
    /// distribution.mix_in(&Distribution::uniform(2), 1.0).unwrap();
    /// assert_abs_diff_eq!(distribution.get(0), 0.75);
    /// assert_abs_diff_eq!(distribution.get(1), 0.25);
    /// ```
    pub fn mix_in(&mut self, other: &Distribution, weight: f64) -> Result<(), DistributionError> {
        if self.len() != other.len() {
            return Err(DistributionError::SizeMismatch(self.len(), other.len()));
        }
        if !Self::is_valid_value(weight) {
            return Err(DistributionError::InvalidWeight(weight));
        }

        for (prob, &other_prob) in self.probs.iter_mut().zip(other.probs.iter()) {
            *prob = (*prob + weight * other_prob) / (1.0 + weight);
        }
        Ok(())
    }

    /// Raises every probability below `floor` up to `floor`, and shrinks the
    /// rest proportionally so that the distribution still sums up to 1.
    ///
    /// All-zero distributions become uniform.
    ///
    /// # Examples
    /// ```
    /// use approx::assert_abs_diff_eq;
    /// use pstmodel::distribution::Distribution;
    ///
    /// let mut distribution = Distribution::from_probabilities([0.0, 0.2, 0.8]).unwrap();
    /// distribution.redistribute_with_minimum(0.1).unwrap();
    /// assert_abs_diff_eq!(distribution.get(0), 0.1);
    /// assert_abs_diff_eq!(distribution.get(1), 0.18);
    /// assert_abs_diff_eq!(distribution.get(2), 0.72);
    /// ```
    pub fn redistribute_with_minimum(&mut self, floor: f64) -> Result<(), DistributionError> {
        let size = self.len();
        if !Self::is_valid_value(floor) || floor * size as f64 > 1.0 + Self::EQ_THRESHOLD {
            return Err(DistributionError::ImpossibleFloor(floor, size));
        }

        self.normalize()?;
        if self.is_zero() {
            *self = Self::uniform(size);
        }
        if floor == 0.0 {
            return Ok(());
        }

        let mut pinned = vec![false; size];
        let scale = loop {
            let pinned_num = pinned.iter().filter(|&&x| x).count();
            let free_mass = 1.0 - pinned_num as f64 * floor;
            let free_total: f64 = self
                .probs
                .iter()
                .zip(pinned.iter())
                .filter(|(_, &is_pinned)| !is_pinned)
                .map(|(&prob, _)| prob)
                .sum();
            let scale = if free_total > 0.0 {
                free_mass / free_total
            } else {
                0.0
            };

            let mut changed = false;
            for (prob, is_pinned) in self.probs.iter().zip(pinned.iter_mut()) {
                if !*is_pinned && prob * scale < floor {
                    *is_pinned = true;
                    changed = true;
                }
            }

            if !changed {
                break scale;
            }
        };

        // a floor within rounding of 1/size pins every symbol
        if pinned.iter().all(|&is_pinned| is_pinned) {
            *self = Self::uniform(size);
            return Ok(());
        }

        for (prob, is_pinned) in self.probs.iter_mut().zip(pinned.iter()) {
            *prob = if *is_pinned { floor } else { *prob * scale };
        }
        Ok(())
    }

    /// Returns the natural logarithm of every probability (`-inf` for zero).
    #[must_use]
    pub fn log_probabilities(&self) -> Vec<f64> {
        self.probs.iter().map(|x| x.ln()).collect()
    }

    /// Returns the entropy of this distribution.
    ///
    /// # Examples
    /// ```
    /// use pstmodel::distribution::Distribution;
    ///
    /// let distribution = Distribution::uniform(4);
    /// assert_eq!(distribution.entropy().get(), 2.0);
    /// ```
    #[must_use]
    pub fn entropy(&self) -> Entropy {
        self.probs
            .iter()
            .filter(|&&x| x >= Self::ZERO_THRESHOLD)
            .map(|&x| Entropy::new(-x * x.log2()))
            .reduce(|x, y| x + y)
            .unwrap_or_default()
    }

    /// Returns the smallest probability.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.probs.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .probs
                .iter()
                .zip(other.probs.iter())
                .all(|(x, y)| x == y || (x - y).abs() <= Self::EQ_THRESHOLD)
    }
}
