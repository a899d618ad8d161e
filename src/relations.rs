//! Student/course enrollment and instructor/course assignment.
//!
//! Enrollment is a set relation: a `(student, course)` pair is stored at most
//! once, so enrolling twice or removing an absent pair are both harmless.
//!
//! Assignment follows a per-course slot state machine ([`InstructorSlot`]):
//!
//! ```text
//! Unassigned --assign(i)--> Assigned(i) --assign(i)--> Assigned(i)
//!      ^                         |
//!      +-------unassign----------+
//! ```
//!
//! Assigning a different instructor to an occupied slot is rejected; the slot
//! must be cleared first. On top of that, an instructor teaches at most one
//! course at a time.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{RecordsError, RecordsResult};
use crate::model::EntityKind;
use crate::repository::require;
use crate::sqlite::SchoolDb;
use crate::validate::validate_id;

/// Result of a successful [`SchoolDb::enroll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    /// The pair already existed; nothing changed.
    AlreadyEnrolled,
}

/// Result of a successful [`SchoolDb::assign_instructor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    /// The course already had this instructor; nothing changed.
    AlreadyAssigned,
}

/// The instructor slot of one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructorSlot {
    Unassigned,
    Assigned(String),
}

impl InstructorSlot {
    pub fn from_column(instructor_id: Option<String>) -> Self {
        match instructor_id {
            Some(id) => InstructorSlot::Assigned(id),
            None => InstructorSlot::Unassigned,
        }
    }

    pub fn instructor_id(&self) -> Option<&str> {
        match self {
            InstructorSlot::Assigned(id) => Some(id),
            InstructorSlot::Unassigned => None,
        }
    }

    /// Transition for assigning `instructor_id` to `course_id`.
    pub fn assign(&self, course_id: &str, instructor_id: &str) -> RecordsResult<AssignOutcome> {
        match self {
            InstructorSlot::Unassigned => Ok(AssignOutcome::Assigned),
            InstructorSlot::Assigned(current) if current == instructor_id => {
                Ok(AssignOutcome::AlreadyAssigned)
            }
            InstructorSlot::Assigned(current) => Err(RecordsError::CourseAlreadyHasInstructor {
                course_id: course_id.to_string(),
                instructor_id: current.clone(),
            }),
        }
    }
}

/// Slot of `course_id`, or `None` if the course does not exist.
pub(crate) fn course_slot(conn: &Connection, course_id: &str) -> RecordsResult<Option<InstructorSlot>> {
    let column: Option<Option<String>> = conn
        .query_row(
            "SELECT instructor_id FROM courses WHERE course_id = ?1",
            [course_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(column.map(InstructorSlot::from_column))
}

/// The course other than `except` that `instructor_id` teaches, if any.
fn course_taught_elsewhere(
    conn: &Connection,
    instructor_id: &str,
    except: &str,
) -> RecordsResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT course_id FROM courses WHERE instructor_id = ?1 AND course_id <> ?2 \
             ORDER BY course_id LIMIT 1",
            params![instructor_id, except],
            |row| row.get(0),
        )
        .optional()?)
}

/// Applies the assignment rules against the course's current `slot` and
/// writes the link when it changes.
pub(crate) fn apply_assignment(
    conn: &Connection,
    instructor_id: &str,
    course_id: &str,
    slot: &InstructorSlot,
) -> RecordsResult<AssignOutcome> {
    require(conn, EntityKind::Instructor, instructor_id)?;
    if slot.instructor_id() == Some(instructor_id) {
        return Ok(AssignOutcome::AlreadyAssigned);
    }
    if let Some(other) = course_taught_elsewhere(conn, instructor_id, course_id)? {
        return Err(RecordsError::AlreadyAssignedElsewhere {
            instructor_id: instructor_id.to_string(),
            course_id: other,
        });
    }
    let outcome = slot.assign(course_id, instructor_id)?;
    conn.execute(
        "UPDATE courses SET instructor_id = ?1 WHERE course_id = ?2",
        params![instructor_id, course_id],
    )?;
    Ok(outcome)
}

/// Empties the slot of `course_id`; returns whether it was occupied.
pub(crate) fn clear_assignment(conn: &Connection, course_id: &str) -> RecordsResult<bool> {
    let changed = conn.execute(
        "UPDATE courses SET instructor_id = NULL WHERE course_id = ?1 AND instructor_id IS NOT NULL",
        [course_id],
    )?;
    Ok(changed > 0)
}

impl SchoolDb {
    /// Enrolls a student in a course. Enrolling an existing pair succeeds with
    /// [`EnrollOutcome::AlreadyEnrolled`].
    pub fn enroll(&self, student_id: &str, course_id: &str) -> RecordsResult<EnrollOutcome> {
        let student_id = validate_id(student_id)?;
        let course_id = validate_id(course_id)?;
        let outcome = self.write(|tx| {
            require(tx, EntityKind::Student, &student_id)?;
            require(tx, EntityKind::Course, &course_id)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO registrations (student_id, course_id) VALUES (?1, ?2)",
                params![student_id, course_id],
            )?;
            Ok(if inserted > 0 {
                EnrollOutcome::Enrolled
            } else {
                EnrollOutcome::AlreadyEnrolled
            })
        })?;
        debug!(%student_id, %course_id, ?outcome, "enroll");
        Ok(outcome)
    }

    /// Removes an enrollment. Returns `false` if the pair did not exist.
    pub fn unenroll(&self, student_id: &str, course_id: &str) -> RecordsResult<bool> {
        let student_id = validate_id(student_id)?;
        let course_id = validate_id(course_id)?;
        let removed = self.write(|tx| {
            Ok(tx.execute(
                "DELETE FROM registrations WHERE student_id = ?1 AND course_id = ?2",
                params![student_id, course_id],
            )?)
        })?;
        debug!(%student_id, %course_id, removed, "unenroll");
        Ok(removed > 0)
    }

    /// Links an instructor to a course.
    ///
    /// Fails with [`RecordsError::AlreadyAssignedElsewhere`] if the instructor
    /// teaches another course, and with
    /// [`RecordsError::CourseAlreadyHasInstructor`] if the course is taught by
    /// someone else. Repeating the current assignment is a no-op.
    pub fn assign_instructor(&self, instructor_id: &str, course_id: &str) -> RecordsResult<AssignOutcome> {
        let instructor_id = validate_id(instructor_id)?;
        let course_id = validate_id(course_id)?;
        let outcome = self.write(|tx| {
            let slot = course_slot(tx, &course_id)?
                .ok_or_else(|| RecordsError::not_found(EntityKind::Course, &course_id))?;
            apply_assignment(tx, &instructor_id, &course_id, &slot)
        })?;
        debug!(%instructor_id, %course_id, ?outcome, "assign instructor");
        Ok(outcome)
    }

    /// Clears a course's instructor. Returns `false` if it had none.
    pub fn unassign_instructor(&self, course_id: &str) -> RecordsResult<bool> {
        let course_id = validate_id(course_id)?;
        let cleared = self.write(|tx| {
            require(tx, EntityKind::Course, &course_id)?;
            clear_assignment(tx, &course_id)
        })?;
        debug!(%course_id, cleared, "unassign instructor");
        Ok(cleared)
    }

    /// Current instructor slot of a course.
    pub fn instructor_slot(&self, course_id: &str) -> RecordsResult<InstructorSlot> {
        course_slot(self.connection(), course_id.trim())?
            .ok_or_else(|| RecordsError::not_found(EntityKind::Course, course_id.trim()))
    }
}
