//! Error handling for the election engine

/// Result type alias for the election engine
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the election engine
///
/// Every variant maps to a distinct [`ErrorKind`] so a consuming layer can
/// render an accurate message instead of a blanket failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed input (negative votes, missing fields)
    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    /// Referenced entity is missing or belongs to another parent
    #[error("{entity} {id} not found")]
    Reference { entity: String, id: String },

    /// Invariant violation (duplicate round number, second open round)
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Deletion refused because dependent rows still exist
    #[error("Cannot delete {entity} {id}: {dependents} still reference it")]
    DependencyExists {
        entity: String,
        id: String,
        dependents: String,
    },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Reference,
    Conflict,
    DependencyExists,
    Serialization,
    Internal,
}

impl Error {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new reference error
    pub fn reference(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::Reference {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new dependency error
    pub fn dependency_exists(
        entity: impl Into<String>,
        id: impl ToString,
        dependents: impl Into<String>,
    ) -> Self {
        Self::DependencyExists {
            entity: entity.into(),
            id: id.to_string(),
            dependents: dependents.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Reference { .. } => ErrorKind::Reference,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::DependencyExists { .. } => ErrorKind::DependencyExists,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $msg:expr) => {
        $crate::Error::validation($field, $msg)
    };
    ($field:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::Error::validation($field, format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! conflict_error {
    ($msg:expr) => {
        $crate::Error::conflict($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::conflict(format!($fmt, $($arg)*))
    };
}

/// Maps a poisoned lock into an internal error naming the table
#[macro_export]
macro_rules! lock_error {
    ($table:expr) => {
        |_| $crate::Error::internal(format!("{} lock poisoned", $table))
    };
}
