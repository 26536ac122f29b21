//! Error types for the rule subsystem.

use thiserror::Error;

/// Errors that can occur while loading, compiling or evaluating rules.
#[derive(Error, Debug)]
pub enum RuleError {
    /// Rule pack directory not found
    #[error("rule pack directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// Failed to read a rule pack document
    #[error("failed to read rule pack {path}: {source}")]
    LoadError {
        /// Path to the document
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a rule pack document
    #[error("failed to parse rule pack {path}: {reason}")]
    ParseError {
        /// Path to the document
        path: String,
        /// Parser message
        reason: String,
    },

    /// Unsupported rule pack file extension
    #[error("unsupported rule pack format: {path}")]
    UnsupportedFormat {
        /// Path to the document
        path: String,
    },

    /// A rule's test failed to compile in its dialect
    #[error("rule {rule_id}: cannot compile test: {reason}")]
    Compile {
        /// Rule whose test failed
        rule_id: String,
        /// Compiler message
        reason: String,
    },

    /// Syntax error in a query or expression
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the source
        offset: usize,
        /// What went wrong
        message: String,
    },

    /// Predicate raised while being evaluated
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Rule pack failed validation
    #[error("invalid rule pack: {}", .problems.join("; "))]
    InvalidPack {
        /// Every problem found
        problems: Vec<String>,
    },

    /// I/O error while accessing rule packs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn eval(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
