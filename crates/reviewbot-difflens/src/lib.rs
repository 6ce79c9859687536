//! Unified diff splitting.
//!
//! Breaks the output of `git diff` into one section per file, so each
//! changed file can be reviewed with its own request.

pub mod parser;
