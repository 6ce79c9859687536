use std::path::PathBuf;

/// Errors that can occur across reviewbot.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary converts to a `miette` report at the boundary.
///
/// Transport failures are not represented here: a failed chat completion is
/// recovered inside the review requester and never reaches the caller.
///
/// # Examples
///
/// ```
/// use reviewbot_core::ReviewError;
///
/// let err = ReviewError::Config("missing model name".into());
/// assert!(err.to_string().contains("missing model name"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ReviewError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("set the value in .reviewbot.toml or pass it on the command line"))]
    Config(String),

    /// Unified diff parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// The token encoder could not be initialized.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// HTTP client construction failure.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
