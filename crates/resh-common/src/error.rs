//! Error types shared by the resh crates.
//!
//! Persistence and generation failures are kept apart from validation
//! failures: a validation error is fatal to the operation that raised it and
//! must reach the user unchanged, while transport errors may be retried.

use miette::Diagnostic;

/// Main error type for resh operations
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ReshError {
    /// Persisting a document failed
    #[error(transparent)]
    #[diagnostic_source]
    Store(#[from] StoreError),

    /// An AI generation call failed
    #[error(transparent)]
    #[diagnostic_source]
    Generation(#[from] GenerationError),

    /// Input rejected before any external call was made
    #[error(transparent)]
    #[diagnostic_source]
    Validation(#[from] ValidationError),

    /// Configuration could not be loaded or saved
    #[error(transparent)]
    #[diagnostic_source]
    Config(#[from] ConfigError),

    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure reported by the persistence collaborator.
///
/// Cloneable so the auto-save coordinator can keep the last failure around
/// for display while the pending content waits for a retry.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document {0} not found")]
    #[diagnostic(code(resh::store::not_found))]
    NotFound(String),

    #[error("failed to reach the document store: {0}")]
    #[diagnostic(
        code(resh::store::transport),
        help("unsaved changes are kept and will be retried on the next save")
    )]
    Transport(String),

    #[error("document store rejected the update: {0}")]
    #[diagnostic(code(resh::store::rejected))]
    Rejected(String),
}

/// Failure of an AI generation call (titles, outline, content, humanize,
/// translate).
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Request was invalid; never retried and never papered over
    #[error(transparent)]
    #[diagnostic_source]
    Validation(#[from] ValidationError),

    #[error("generation service unavailable: {0}")]
    #[diagnostic(code(resh::generation::transport))]
    Transport(String),

    #[error("generation service returned an unusable response: {0}")]
    #[diagnostic(code(resh::generation::invalid_response))]
    InvalidResponse(String),

    #[error("generation was cancelled")]
    #[diagnostic(code(resh::generation::cancelled))]
    Cancelled,
}

impl GenerationError {
    /// Whether a caller may fall back to an alternative path (another
    /// provider, a non-streaming endpoint) after this error.
    ///
    /// Only connection-level failures qualify.
    pub fn allows_fallback(&self) -> bool {
        matches!(self, GenerationError::Transport(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GenerationError::Validation(_))
    }
}

/// Input validation failures.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("translation to {language} is missing its target keyword")]
    #[diagnostic(
        code(resh::validation::missing_keyword),
        help("set the keyword for this language before translating")
    )]
    MissingKeyword { language: String },

    #[error("required field `{0}` is empty")]
    #[diagnostic(code(resh::validation::missing_field))]
    MissingField(&'static str),

    #[error("invalid language code `{0}`")]
    #[diagnostic(
        code(resh::validation::language),
        help("use a two-letter code, optionally with a region: `es`, `pt-br`")
    )]
    InvalidLanguage(String),

    #[error("invalid document id `{0}`")]
    #[diagnostic(code(resh::validation::document_id))]
    InvalidDocumentId(String),
}

/// Configuration loading/saving failures
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    #[diagnostic(code(resh::config::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(resh::config::json))]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0}")]
    #[diagnostic(code(resh::config::format), help("config files must end in .json"))]
    UnsupportedFormat(String),

    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(resh::config::invalid))]
    Invalid { key: &'static str, message: String },
}
