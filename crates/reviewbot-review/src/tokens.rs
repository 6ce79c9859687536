//! Token counting for the pre-request budget check.

use reviewbot_core::ReviewError;
use tiktoken_rs::CoreBPE;

/// Counts tokens with the `cl100k_base` byte-pair encoding used by the
/// GPT-3.5 and GPT-4 model families.
///
/// Text is encoded as ordinary text: special-token literals such as
/// `<|endoftext|>` are split into their parts rather than collapsed, so a
/// count never comes out lower than what the provider bills.
///
/// # Examples
///
/// ```
/// use reviewbot_review::tokens::TokenEstimator;
///
/// let estimator = TokenEstimator::new().unwrap();
/// assert_eq!(estimator.estimate_token_count(""), 0);
/// assert!(estimator.estimate_token_count("fn main() {}") > 0);
/// ```
pub struct TokenEstimator {
    bpe: CoreBPE,
}

impl TokenEstimator {
    /// Load the encoder.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Tokenizer`] if the vocabulary cannot be loaded.
    pub fn new() -> Result<Self, ReviewError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| ReviewError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }

    /// Number of tokens in `text`.
    pub fn estimate_token_count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Whether `text` needs more than `limit` tokens.
    ///
    /// # Examples
    ///
    /// ```
    /// use reviewbot_review::tokens::TokenEstimator;
    ///
    /// let estimator = TokenEstimator::new().unwrap();
    /// let text = "let answer = 42;";
    /// let count = estimator.estimate_token_count(text);
    /// assert!(!estimator.exceeds_limit(text, count));
    /// assert!(estimator.exceeds_limit(text, count - 1));
    /// ```
    pub fn exceeds_limit(&self, text: &str, limit: usize) -> bool {
        self.estimate_token_count(text) > limit
    }
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}
