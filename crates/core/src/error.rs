//! Error types for the Sage domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The set of failure kinds
//! is closed: knowledge loading, web search, text completion, and request
//! validation. Lower layers (loader, search) handle their own errors and
//! degrade; only completion and validation failures reach the caller.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Sage operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Knowledge base error: {0}")]
    Load(#[from] LoadError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Knowledge directory not found: {}", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("Failed to read {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Search provider returned status {status_code}: {message}")]
    Provider { status_code: u16, message: String },

    #[error("Failed to parse search results: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Completion service not configured: {0}")]
    NotConfigured(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message is {len} characters, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("invalid session_id: {0}")]
    InvalidSessionId(String),

    #[error("malformed request body: {0}")]
    Malformed(String),

    #[error("'{field}' is no longer supported, use '{replacement}' instead")]
    Deprecated {
        field: &'static str,
        replacement: &'static str,
    },
}
