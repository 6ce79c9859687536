//! Per-file AI code review requests.
//!
//! Provides the review requester and its parts: token budgeting, system
//! prompt construction, advisory model checks, diagnostics, and the
//! OpenAI-compatible chat transport.

pub mod diagnostics;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod requester;
pub mod tokens;

pub use requester::{NoCommentReason, ReviewOutcome, ReviewRequester};
