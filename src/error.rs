//! Error types for the udm-mapgen crate.

use std::path::PathBuf;

/// Errors that can occur while loading a catalog, hydrating it, or preparing
/// mapping input.
///
/// Classification and generation have no error cases of their own: unknown
/// target paths degrade to best-effort output instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A catalog record violates a structural invariant.
    #[error("catalog record '{record}': {message}")]
    Catalog { record: String, message: String },

    /// A root record named by the catalog is not defined.
    #[error("root '{root}' refers to record '{record}', which is not defined")]
    MissingRoot { root: String, record: String },

    /// Hydration gave up on a subtree.
    #[error("hydration failed at '{path}': {message}")]
    Hydration { path: String, message: String },

    /// The input sample is not valid JSON.
    #[error("invalid sample: {0}")]
    Sample(String),

    /// A `source=target` mapping argument could not be parsed.
    #[error("invalid mapping: {0}")]
    Mapping(String),

    /// Failed to read a file from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write generated output.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON parse error with context.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
