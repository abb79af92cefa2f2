//! Error taxonomy of the editing engine.
//!
//! Structural parse failures block a whole document; entry errors are
//! attached to individual rows and only block submission.

use confmap_types::{TextFormat, ViewMode};
use thiserror::Error;

use crate::secret::SecretSpecError;
use crate::validation::FieldError;

/// Message attached to a row that has a key but no value.
pub const VALUE_MISSING_MESSAGE: &str = "value must not be empty";

/// The text does not parse as the expected format, or its root is not a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Could not parse to valid {format}: {reason}")]
    Syntax { format: TextFormat, reason: String },

    #[error("Could not parse to valid {format}: expected a mapping at the document root, found {found}")]
    NonMappingRoot { format: TextFormat, found: &'static str },

    #[error("Could not parse to valid {format}: unsupported key {key}")]
    UnsupportedKey { format: TextFormat, key: String },
}

impl ParseError {
    pub fn syntax(format: TextFormat, reason: impl ToString) -> Self {
        Self::Syntax {
            format,
            reason: reason.to_string(),
        }
    }
}

/// A problem with a single row; the rest of the document stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("{message}")]
    KeyPattern { index: usize, key: String, message: String },

    #[error("value must not be empty (key '{key}')")]
    ValueMissing { index: usize, key: String },

    #[error("Duplicate key '{key}'; keys must be unique")]
    DuplicateKey { index: usize, key: String },
}

impl EntryError {
    /// Row index the error is attached to.
    pub fn index(&self) -> usize {
        match self {
            Self::KeyPattern { index, .. } | Self::ValueMissing { index, .. } | Self::DuplicateKey { index, .. } => *index,
        }
    }
}

/// Reasons a save action is refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Please resolve the errors before saving ({} invalid entries)", .errors.len())]
    InvalidEntries { errors: Vec<EntryError> },

    #[error("Please add {kind} data before saving.")]
    NoData { kind: &'static str },

    #[error("Value for key '{key}' is still masked; unlock the secret before saving")]
    MaskedValue { key: String },

    #[error("Sub-path keys can only be listed for externally managed data")]
    SubPathKeysRequireExternal,

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    SecretSpec(#[from] SecretSpecError),
}

/// An operation was invoked in the wrong view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("operation requires the {expected} view but the {actual} view is active")]
    WrongMode { expected: ViewMode, actual: ViewMode },
}
