//! Compilation Errors
//!
//! Every failure raised while compiling a document. An error on any single
//! node aborts the whole document; there is no partial output.

use thiserror::Error;

/// Errors that can occur while reading notation and building a state machine.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Input shorthand has an unusable shape, or an operator/tag is unknown.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The resource resolver rejected a lookup.
    #[error("Failed to resolve '{reference}': {message}")]
    Resolution { reference: String, message: String },

    /// A compiled branch references states it does not contain.
    #[error("Invalid state machine:\n{}", .0.join("\n"))]
    Structural(Vec<String>),

    #[error("Failed to parse notation YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Shorthand for building a [`CompileError::Syntax`].
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CompileError>;
