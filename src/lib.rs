//! SQLite-backed school records: students, instructors, courses and the
//! relationships between them.
//!
//! # Intention
//!
//! - Keep one source of truth: rows with explicit ids, relationships as
//!   foreign keys and join-table rows.
//! - Enforce relationship integrity (enrollment as a set, one instructor per
//!   course and one course per instructor, cascades on delete) in one place,
//!   whatever front-end drives it.
//! - Validate every raw field supplied by a front-end before it is stored.
//!
//! # Architectural Boundaries
//!
//! - No presentation code here; front-ends call [`Repository`] and the
//!   relationship operations on [`SchoolDb`] and render the results.
//! - Bulk import/export lives in [`transfer`] and goes through the same
//!   operations as interactive edits.

pub mod config;
pub mod error;
pub mod model;
pub mod relations;
pub mod repository;
pub mod session;
pub mod sqlite;
pub mod transfer;
pub mod validate;

pub use config::AppConfig;
pub use error::{RecordsError, RecordsResult};
pub use model::{
    CourseFields, CourseRecord, EntityKind, InstructorRecord, PersonFields, StudentRecord,
};
pub use relations::{AssignOutcome, EnrollOutcome, InstructorSlot};
pub use repository::{Courses, Instructors, ListQuery, Listing, Repository, SortKey, Students};
pub use session::{Selection, Session};
pub use sqlite::{school_schema, SchoolDb, SqliteConfig};
pub use transfer::{ImportReport, SkippedEntry, Snapshot};
