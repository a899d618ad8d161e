//! Record and input types for students, instructors and courses.
//!
//! Input types carry the raw strings a presentation layer collected; nothing
//! in them is trusted until it passes through [`crate::validate`]. Record
//! types are what the repository reads back, including the derived
//! relationship ids.

use serde::Serialize;
use std::fmt;

use crate::error::RecordsResult;
use crate::validate::{validate_age, validate_email, validate_id, validate_name};

/// The three entity kinds stored by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Instructor,
    Course,
}

impl EntityKind {
    /// Table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Instructor => "instructors",
            EntityKind::Course => "courses",
        }
    }

    /// Primary key column of [`EntityKind::table`].
    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Student => "student_id",
            EntityKind::Instructor => "instructor_id",
            EntityKind::Course => "course_id",
        }
    }

    /// Column holding the display name.
    pub fn name_column(&self) -> &'static str {
        match self {
            EntityKind::Course => "course_name",
            _ => "name",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Student => write!(f, "student"),
            EntityKind::Instructor => write!(f, "instructor"),
            EntityKind::Course => write!(f, "course"),
        }
    }
}

/// Raw fields for a student or instructor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonFields {
    pub id: String,
    pub name: String,
    /// Age exactly as entered; parsed during validation.
    pub age: String,
    pub email: String,
}

impl PersonFields {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        age: impl ToString,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age: age.to_string(),
            email: email.into(),
        }
    }

    pub(crate) fn validate(&self) -> RecordsResult<ValidPerson> {
        Ok(ValidPerson {
            id: validate_id(&self.id)?,
            name: validate_name(&self.name)?,
            age: validate_age(&self.age)?,
            email: validate_email(&self.email)?,
        })
    }
}

/// Raw fields for a course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFields {
    pub id: String,
    pub name: String,
    /// Instructor to link; blank strings count as absent.
    pub instructor_id: Option<String>,
}

impl CourseFields {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instructor_id: None,
        }
    }

    pub fn with_instructor(mut self, instructor_id: impl Into<String>) -> Self {
        self.instructor_id = Some(instructor_id.into());
        self
    }

    pub(crate) fn validate(&self) -> RecordsResult<ValidCourse> {
        let instructor_id = match self.instructor_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        };
        Ok(ValidCourse {
            id: validate_id(&self.id)?,
            name: validate_name(&self.name)?,
            instructor_id,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ValidPerson {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub email: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidCourse {
    pub id: String,
    pub name: String,
    pub instructor_id: Option<String>,
}

/// A stored student with the ids of the courses they are enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    pub age: i64,
    pub email: String,
    pub course_ids: Vec<String>,
}

impl fmt::Display for StudentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "My name is {}, I'm {} years old. I'm a student and my ID is: {}",
            self.name, self.age, self.student_id
        )
    }
}

/// A stored instructor with the course they teach, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorRecord {
    pub instructor_id: String,
    pub name: String,
    pub age: i64,
    pub email: String,
    pub course_id: Option<String>,
}

impl fmt::Display for InstructorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "My name is {}, I'm {} years old. I'm an instructor and my ID is: {}",
            self.name, self.age, self.instructor_id
        )
    }
}

/// A stored course with its instructor link and enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseRecord {
    pub course_id: String,
    pub course_name: String,
    pub instructor_id: Option<String>,
    pub student_ids: Vec<String>,
}
