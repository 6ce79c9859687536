//! Advisory model validation.
//!
//! Unknown model names are never rejected; OpenAI-compatible gateways
//! routinely serve models outside this list.

/// Model identifiers the prompt and token budget were tuned against.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4-1106-preview",
    "gpt-4-vision-preview",
    "gpt-4",
    "gpt-4-0314",
    "gpt-4-0613",
    "gpt-4-32k",
    "gpt-4-32k-0314",
    "gpt-4-32k-0613",
    "gpt-3.5-turbo-1106",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-3.5-turbo-0301",
    "gpt-3.5-turbo-0613",
    "gpt-3.5-turbo-16k-0613",
];

/// Result of checking a model name against [`SUPPORTED_MODELS`].
///
/// # Examples
///
/// ```
/// use reviewbot_review::models::{check_model_support, ModelSupport};
///
/// assert_eq!(check_model_support("gpt-4"), ModelSupport::Supported);
/// assert_eq!(
///     check_model_support("llama3:70b"),
///     ModelSupport::UnsupportedButProceeding
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSupport {
    /// The model is in the supported set.
    Supported,
    /// Unknown model; the review goes ahead with a warning.
    UnsupportedButProceeding,
}

impl ModelSupport {
    /// Whether a warning should be emitted.
    pub fn is_advisory(self) -> bool {
        matches!(self, ModelSupport::UnsupportedButProceeding)
    }
}

/// Classify `model`. Matching is exact.
pub fn check_model_support(model: &str) -> ModelSupport {
    if SUPPORTED_MODELS.contains(&model) {
        ModelSupport::Supported
    } else {
        ModelSupport::UnsupportedButProceeding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_model_is_supported() {
        for model in SUPPORTED_MODELS {
            assert_eq!(check_model_support(model), ModelSupport::Supported);
        }
    }

    #[test]
    fn unknown_model_proceeds() {
        let support = check_model_support("gpt-4o");
        assert_eq!(support, ModelSupport::UnsupportedButProceeding);
        assert!(support.is_advisory());
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(check_model_support("GPT-4").is_advisory());
        assert!(!check_model_support("gpt-4").is_advisory());
    }
}
