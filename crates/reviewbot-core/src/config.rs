use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";

/// Top-level configuration loaded from `.reviewbot.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use reviewbot_core::AppConfig;
///
/// let config = AppConfig::default();
/// assert_eq!(config.review.max_tokens, 4096);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Review behavior and model selection.
    #[serde(default)]
    pub review: ReviewConfig,
    /// Transport settings for the chat completion endpoint.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::FileNotFound`] if `path` does not exist,
    /// [`ReviewError::Io`] if it cannot be read, or [`ReviewError::Toml`] if
    /// the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reviewbot_core::AppConfig;
    /// use std::path::Path;
    ///
    /// let config = AppConfig::from_file(Path::new(".reviewbot.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ReviewError> {
        if !path.exists() {
            return Err(ReviewError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use reviewbot_core::AppConfig;
    ///
    /// let toml = r#"
    /// [review]
    /// model = "gpt-4"
    /// include_bugs = true
    /// "#;
    /// let config = AppConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.model, "gpt-4");
    /// assert!(config.review.include_bugs);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ReviewError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// What the reviewer is asked to look for, and which model answers.
///
/// Built once and handed to the review requester; it is never mutated after
/// that, so a single instance can back any number of concurrent reviews.
///
/// # Examples
///
/// ```
/// use reviewbot_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert!(!config.include_bugs);
/// assert!(config.additional_instructions.is_empty());
/// assert_eq!(config.api_endpoint, "https://api.openai.com/v1");
/// assert_eq!(config.max_tokens, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Ask the model to highlight bugs.
    #[serde(default)]
    pub include_bugs: bool,
    /// Ask the model to highlight major performance problems.
    #[serde(default)]
    pub include_performance: bool,
    /// Ask the model to point out missed best practices.
    #[serde(default)]
    pub include_best_practices: bool,
    /// Extra free-form instructions, one prompt bullet each.
    #[serde(default)]
    pub additional_instructions: Vec<String>,
    /// Model identifier sent with every request. Required.
    #[serde(default)]
    pub model: String,
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Token ceiling for system prompt plus diff.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.into()
}

fn default_max_tokens() -> usize {
    4096
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            include_bugs: false,
            include_performance: false,
            include_best_practices: false,
            additional_instructions: Vec::new(),
            model: String::new(),
            api_endpoint: default_api_endpoint(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ReviewConfig {
    /// Check the values a review cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Config`] if the model name is empty or
    /// `max_tokens` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use reviewbot_core::ReviewConfig;
    ///
    /// assert!(ReviewConfig::default().validate().is_err());
    ///
    /// let config = ReviewConfig {
    ///     model: "gpt-4".into(),
    ///     ..ReviewConfig::default()
    /// };
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.model.trim().is_empty() {
            return Err(ReviewError::Config("model name is required".into()));
        }
        if self.max_tokens == 0 {
            return Err(ReviewError::Config(
                "max_tokens must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Transport configuration for the chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; `OPENAI_API_KEY` is used when unset.
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Name of the environment variable consulted for the API key.
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    /// Resolve the API key from config, falling back to `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(Self::API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}
