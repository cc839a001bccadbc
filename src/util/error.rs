//! Error types for nctree.

use std::fmt;
use thiserror::Error;

/// Kind of entity a name or path refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Dimension,
    Variable,
    Group,
    Attribute,
}

impl EntityKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dimension => "dimension",
            Self::Variable => "variable",
            Self::Group => "group",
            Self::Attribute => "attribute",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main error type for nctree operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Name or path does not resolve
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// Bare name matches more than one entity in a subtree search
    #[error("ambiguous {kind} name '{name}', candidates: {}", .candidates.join(", "))]
    AmbiguousName {
        kind: EntityKind,
        name: String,
        candidates: Vec<String>,
    },

    /// Registration collides with an existing name in the same namespace
    #[error("{kind} '{name}' already exists in group {group}")]
    DuplicateName {
        kind: EntityKind,
        name: String,
        group: String,
    },

    /// Complex parts disagree, or declared type/shape conflicts with data
    #[error("schema inconsistent: {0}")]
    SchemaInconsistent(String),

    /// Requested slice or drop would produce an invalid axis
    #[error("invalid truncation: {0}")]
    InvalidTruncation(String),

    /// The storage backend reported a definition or I/O failure
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// Dataset was opened read-only
    #[error("dataset is read-only")]
    ReadOnly,

    /// Handle was already closed
    #[error("dataset handle already closed")]
    AlreadyClosed,

    /// Write pass of a duplication failed for some variables
    #[error("copy incomplete, {} variable(s) failed (first: {first})", .failed.len())]
    IncompleteCopy {
        failed: Vec<String>,
        first: Box<Error>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted container could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(kind: EntityKind, name: impl Into<String>, group: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
            group: group.into(),
        }
    }

    /// Create a schema inconsistency error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaInconsistent(msg.into())
    }

    /// Create a backend failure error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// True for errors raised by (or on behalf of) the storage backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::Io(_) | Self::Json(_) | Self::ReadOnly | Self::AlreadyClosed
        )
    }
}

/// Result type alias for nctree operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::not_found(EntityKind::Dimension, "time");
        assert_eq!(e.to_string(), "dimension not found: time");

        let e = Error::AmbiguousName {
            kind: EntityKind::Variable,
            name: "t".into(),
            candidates: vec!["/a/t".into(), "/b/t".into()],
        };
        assert!(e.to_string().contains("/a/t, /b/t"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_backend_failure());
        assert!(!Error::schema("x").is_backend_failure());
    }
}
