//! Error types for school record operations.

use thiserror::Error;

use crate::model::EntityKind;

/// Result type for record operations.
pub type RecordsResult<T> = Result<T, RecordsError>;

/// Errors reported by the repository, relationship and transfer layers.
///
/// Every variant is a recoverable condition. Engine failures that have a
/// semantic counterpart (unique or foreign-key violations) are normalized into
/// the matching variant before they reach callers.
#[derive(Debug, Error)]
pub enum RecordsError {
    /// Input failed field-level validation.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A record with this id already exists.
    #[error("{kind} id already exists: {id}")]
    DuplicateId { kind: EntityKind, id: String },

    /// Another record of the same kind already uses this email.
    #[error("{kind} email already in use: {email}")]
    DuplicateEmail { kind: EntityKind, email: String },

    /// Record (or relation) not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// An update tried to change a record's id.
    #[error("id is immutable: cannot change {current} to {supplied}")]
    IdImmutable { current: String, supplied: String },

    /// The instructor already teaches a different course.
    #[error("instructor {instructor_id} is already assigned to course {course_id}")]
    AlreadyAssignedElsewhere {
        instructor_id: String,
        course_id: String,
    },

    /// The course already has a different instructor.
    #[error("course {course_id} already has instructor {instructor_id}")]
    CourseAlreadyHasInstructor {
        course_id: String,
        instructor_id: String,
    },

    /// Unmapped database error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding/decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A bulk file could not be read as a whole.
    #[error("import error: {0}")]
    Import(String),
}

impl RecordsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True for the validation and relationship-policy rejections, false for
    /// storage, IO and format failures.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::Io(_) | Self::Json(_) | Self::Csv(_) | Self::Import(_)
        )
    }
}
