//! Core types, configuration, and error handling for reviewbot.
//!
//! This crate provides the shared foundation used by the other reviewbot crates:
//! - [`ReviewError`]: unified error type using `thiserror`
//! - [`AppConfig`]: configuration loaded from `.reviewbot.toml`
//! - Shared types: [`ReviewRequest`], [`FileReview`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AppConfig, LlmConfig, ReviewConfig, DEFAULT_API_ENDPOINT};
pub use error::ReviewError;
pub use types::{FileReview, OutputFormat, ReviewRequest, NO_COMMENT};
