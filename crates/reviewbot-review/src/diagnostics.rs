//! Severity-classified events emitted while reviewing.
//!
//! The requester only decides what happened and how serious it is; a
//! [`DiagnosticSink`] decides where it goes. [`TracingSink`] forwards to
//! `tracing`, and tests record events to assert on them directly.

use std::fmt;

use crate::llm::ChatMessage;

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Informational.
    Info,
    /// Unexpected but handled.
    Warning,
    /// A request failed.
    Error,
}

/// Something worth reporting during a review.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A requester was built.
    Initialized { api_endpoint: String, max_tokens: usize },
    /// The exact request about to be sent.
    RequestPayload {
        model: String,
        messages: Vec<ChatMessage>,
    },
    /// The endpoint the request goes to.
    EndpointInUse { api_endpoint: String },
    /// The configured model is not in the supported set.
    UnsupportedModel { model: String },
    /// Prompt plus diff is over budget; the file is skipped.
    TokenLimitExceeded {
        file_name: String,
        limit: usize,
        estimated: usize,
    },
    /// The request succeeded but returned no choices.
    EmptyResponse { file_name: String },
    /// The request failed.
    RequestFailed {
        file_name: String,
        message: String,
        payload: Option<serde_json::Value>,
    },
}

impl Diagnostic {
    /// Severity of this event.
    pub fn level(&self) -> Level {
        match self {
            Diagnostic::Initialized { .. }
            | Diagnostic::RequestPayload { .. }
            | Diagnostic::EndpointInUse { .. } => Level::Info,
            Diagnostic::UnsupportedModel { .. }
            | Diagnostic::TokenLimitExceeded { .. }
            | Diagnostic::EmptyResponse { .. } => Level::Warning,
            Diagnostic::RequestFailed { .. } => Level::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Initialized {
                api_endpoint,
                max_tokens,
            } => write!(
                f,
                "reviewer initialized with API URL: {api_endpoint} and max tokens: {max_tokens}"
            ),
            Diagnostic::RequestPayload { model, messages } => {
                let payload = serde_json::json!({ "model": model, "messages": messages });
                write!(f, "request payload: {payload}")
            }
            Diagnostic::EndpointInUse { api_endpoint } => {
                write!(f, "using API URL: {api_endpoint}")
            }
            Diagnostic::UnsupportedModel { model } => write!(
                f,
                "the specified model \"{model}\" is not officially supported, proceeding with caution"
            ),
            Diagnostic::TokenLimitExceeded {
                file_name, limit, ..
            } => write!(
                f,
                "the diff for file {file_name} exceeds the token limit of {limit}, skipping review"
            ),
            Diagnostic::EmptyResponse { file_name } => write!(
                f,
                "unable to process diff for file {file_name} as it exceeds token limits"
            ),
            Diagnostic::RequestFailed { message, .. } => {
                write!(f, "error during API call: {message}")
            }
        }
    }
}

/// Receiver for review diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Record one event.
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::TokenLimitExceeded {
                file_name,
                limit,
                estimated,
            } => {
                tracing::warn!(file = %file_name, limit, estimated, "{diagnostic}");
            }
            Diagnostic::EmptyResponse { file_name } => {
                tracing::warn!(file = %file_name, "{diagnostic}");
            }
            Diagnostic::RequestFailed {
                file_name, payload, ..
            } => {
                tracing::error!(file = %file_name, "{diagnostic}");
                if let Some(body) = payload {
                    tracing::error!(file = %file_name, "API response: {body}");
                }
            }
            _ => match diagnostic.level() {
                Level::Info => tracing::info!("{diagnostic}"),
                Level::Warning => tracing::warn!("{diagnostic}"),
                Level::Error => tracing::error!("{diagnostic}"),
            },
        }
    }
}
