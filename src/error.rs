//! Error types for xsdc
//!
//! This module defines the error taxonomy surfaced by schema compilation.
//! The compiler reports the first error it meets, wrapped in
//! [`Error::Context`] layers naming the component being processed.

use std::fmt;
use thiserror::Error;

/// Result type alias using the xsdc Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for schema compilation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Preconditions from the resolved AST are violated
    #[error("schema structure: {0}")]
    SchemaStructural(String),

    /// Glushkov or subset construction cannot proceed
    #[error("content model: {0}")]
    ContentModel(String),

    /// Abstract head with blocked or missing members
    #[error("substitution group: {0}")]
    SubstitutionGroup(String),

    /// Attribute group or attribute wildcard problems
    #[error("attributes: {0}")]
    Attributes(String),

    /// Block/final violation or unknown derivation method
    #[error("derivation: {0}")]
    Derivation(String),

    /// A value fails to parse or canonicalize under its type
    #[error("lexical value: {0}")]
    LexicalValue(#[from] LexicalError),

    /// A configured limit was exceeded
    #[error("limit exceeded: {0}")]
    Limits(#[from] LimitError),

    /// A builder was misused or a table invariant was violated
    #[error("table integrity: {0}")]
    TableIntegrity(#[from] TableError),

    /// An error annotated with the component being processed
    #[error("{context}: {source}")]
    Context {
        /// Path such as `type foo` or `element bar default`
        context: String,
        /// Underlying error
        source: Box<Error>,
    },
}

/// Error categories, independent of context wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::SchemaStructural`]
    SchemaStructural,
    /// See [`Error::ContentModel`]
    ContentModel,
    /// See [`Error::SubstitutionGroup`]
    SubstitutionGroup,
    /// See [`Error::Attributes`]
    Attributes,
    /// See [`Error::Derivation`]
    Derivation,
    /// See [`Error::LexicalValue`]
    LexicalValue,
    /// See [`Error::Limits`]
    Limits,
    /// See [`Error::TableIntegrity`]
    TableIntegrity,
}

impl Error {
    /// Wrap this error with a context path segment
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the category of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SchemaStructural(_) => ErrorKind::SchemaStructural,
            Error::ContentModel(_) => ErrorKind::ContentModel,
            Error::SubstitutionGroup(_) => ErrorKind::SubstitutionGroup,
            Error::Attributes(_) => ErrorKind::Attributes,
            Error::Derivation(_) => ErrorKind::Derivation,
            Error::LexicalValue(_) => ErrorKind::LexicalValue,
            Error::Limits(_) => ErrorKind::Limits,
            Error::TableIntegrity(_) => ErrorKind::TableIntegrity,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// Get the innermost error, skipping context layers
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension trait adding lazy context to results
pub trait ResultExt<T> {
    /// Wrap an error with a context computed on failure
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

/// Lexical parse or canonicalization failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    /// Name of the primitive (or facet) that rejected the value
    pub primitive: &'static str,
    /// The offending lexical value
    pub value: String,
    /// Why the value was rejected
    pub reason: Option<String>,
}

impl LexicalError {
    /// Create a new lexical error
    pub fn new(primitive: &'static str, value: impl Into<String>) -> Self {
        Self {
            primitive,
            value: value.into(),
            reason: None,
        }
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid xs:{}", self.value, self.primitive)?;

        if let Some(ref reason) = self.reason {
            write!(f, " ({})", reason)?;
        }

        Ok(())
    }
}

impl std::error::Error for LexicalError {}

/// Limit violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// Occurrence arithmetic overflowed
    #[error("occurrence count overflow")]
    OccursOverflow,

    /// maxOccurs above the configured limit
    #[error("maxOccurs {value} exceeds limit {limit}")]
    OccursTooLarge {
        /// Declared value
        value: u32,
        /// Configured limit
        limit: u32,
    },

    /// Subset construction produced too many states; recovered locally
    #[error("DFA state count {states} exceeds cap {cap}")]
    DfaLimit {
        /// States built when the cap was hit
        states: usize,
        /// Configured cap
        cap: u32,
    },
}

/// Table and builder integrity violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// A builder was used after it was sealed
    #[error("builder used after seal")]
    UsedAfterSeal,

    /// A table bounds invariant failed
    #[error("malformed table: {0}")]
    MalformedTable(String),
}
