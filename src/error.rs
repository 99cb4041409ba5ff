use thiserror::Error;

/// Raised while compiling a raw schema definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported schema definition {definition}: definition is empty")]
    EmptyDefinition { definition: String },

    #[error("unsupported schema definition {definition}")]
    UnsupportedDefinition { definition: String },

    #[error("unsupported schema definition {{{key:?}: {found}}}")]
    UnsupportedEntry { key: String, found: String },

    #[error(
        "mixed schema definition: {key:?} is a {found} but the first entry made this a {expected}"
    )]
    MixedDefinition {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("duplicate key in schema definition: {key:?}")]
    DuplicateKey { key: String },
}

/// Operational failure while running a compiled schema.
///
/// These never describe invalid data; invalid data is reported through
/// [`ErrorReport`](crate::report::ErrorReport).
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("predicate for {message:?} failed: {source}")]
    Predicate {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("predicate for {message:?} timed out after {timeout_ms}ms")]
    Timeout { message: String, timeout_ms: u64 },
}

impl ValidationError {
    /// The message of the predicate that caused the failure
    pub fn message(&self) -> &str {
        match self {
            ValidationError::Predicate { message, .. } => message,
            ValidationError::Timeout { message, .. } => message,
        }
    }
}

/// Result type alias for schema compilation
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Result type alias for validation runs
pub type Result<T> = std::result::Result<T, ValidationError>;
