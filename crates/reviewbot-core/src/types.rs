use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The literal a review returns when there is no actionable feedback.
///
/// The model is instructed to answer with exactly this string, and the
/// requester returns it when a diff is skipped or the request fails.
pub const NO_COMMENT: &str = "NO_COMMENT";

/// A single file's diff submitted for review.
///
/// # Examples
///
/// ```
/// use reviewbot_core::ReviewRequest;
///
/// let request = ReviewRequest::new("+let x = 1;\n", "src/lib.rs");
/// assert_eq!(request.file_name, "src/lib.rs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    /// Unified diff text for the file.
    pub diff_text: String,
    /// Name used in diagnostics.
    pub file_name: String,
}

impl ReviewRequest {
    /// Create a request from a diff and the file it belongs to.
    pub fn new(diff_text: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            diff_text: diff_text.into(),
            file_name: file_name.into(),
        }
    }
}

/// The review produced for one file, as reported by the CLI.
///
/// # Examples
///
/// ```
/// use reviewbot_core::FileReview;
///
/// let review = FileReview::new("src/lib.rs", "NO_COMMENT");
/// assert!(!review.actionable);
///
/// let review = FileReview::new("src/lib.rs", "- Possible off-by-one");
/// assert!(review.actionable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReview {
    /// Path of the reviewed file.
    pub file: String,
    /// Review text, the `NO_COMMENT` sentinel, or empty.
    pub review: String,
    /// Whether the text is feedback a human should read.
    pub actionable: bool,
}

impl FileReview {
    /// Classify a raw review string for `file`.
    pub fn new(file: impl Into<String>, review: impl Into<String>) -> Self {
        let review = review.into();
        let trimmed = review.trim();
        let actionable = !trimmed.is_empty() && trimmed != NO_COMMENT;
        Self {
            file: file.into(),
            review,
            actionable,
        }
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use reviewbot_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown, one section per file.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
