//! Bulk export and import of the whole record set.
//!
//! Export is a read-only projection into a [`Snapshot`]. Import upserts
//! instructors, then students, then courses (courses reference instructors),
//! then replays enrollments from every source that lists them. A bad entry is
//! skipped, logged and recorded in the [`ImportReport`]; only storage and IO
//! failures abort an import.

mod json;
mod tabular;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::{RecordsError, RecordsResult};
use crate::model::{CourseFields, PersonFields};
use crate::relations::EnrollOutcome;
use crate::repository::{ListQuery, Repository};
use crate::sqlite::SchoolDb;

pub use json::import_json;
pub use tabular::import_csv;

/// Structural snapshot of every record and relationship id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub students: Vec<StudentEntry>,
    #[serde(default)]
    pub instructors: Vec<InstructorEntry>,
    #[serde(default)]
    pub courses: Vec<CourseEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentEntry {
    pub student_id: String,
    pub name: String,
    #[serde(deserialize_with = "lenient_age")]
    pub age: i64,
    pub email: String,
    #[serde(default)]
    pub registered_course_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorEntry {
    pub instructor_id: String,
    pub name: String,
    #[serde(deserialize_with = "lenient_age")]
    pub age: i64,
    pub email: String,
    #[serde(default)]
    pub assigned_course_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEntry {
    pub course_id: String,
    pub course_name: String,
    #[serde(default)]
    pub instructor_id: Option<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
}

/// Ages may arrive as numbers or numeric strings.
fn lenient_age<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAge {
        Number(i64),
        Text(String),
    }

    match RawAge::deserialize(deserializer)? {
        RawAge::Number(n) => Ok(n),
        RawAge::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Snapshot {
    /// Every `(student_id, course_id)` pair named by either side, deduplicated
    /// and sorted.
    pub fn registrations(&self) -> Vec<(String, String)> {
        let mut pairs = BTreeSet::new();
        for student in &self.students {
            for course_id in &student.registered_course_ids {
                pairs.insert((student.student_id.clone(), course_id.clone()));
            }
        }
        for course in &self.courses {
            for student_id in &course.student_ids {
                pairs.insert((student_id.clone(), course.course_id.clone()));
            }
        }
        pairs.into_iter().collect()
    }
}

/// An entry that import could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Section the entry came from (`students`, `registrations`, ...).
    pub section: &'static str,
    /// The entry's id, or a description when no id could be read.
    pub key: String,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub enrolled: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl ImportReport {
    pub(crate) fn skip(&mut self, section: &'static str, key: impl Into<String>, reason: impl ToString) {
        let entry = SkippedEntry {
            section,
            key: key.into(),
            reason: reason.to_string(),
        };
        warn!(section = entry.section, key = %entry.key, reason = %entry.reason, "import entry skipped");
        self.skipped.push(entry);
    }
}

/// Reads the current state of `db` into a snapshot.
pub fn export(db: &SchoolDb) -> RecordsResult<Snapshot> {
    let students = db
        .students()
        .fetch(&ListQuery::new())?
        .into_iter()
        .map(|s| StudentEntry {
            student_id: s.student_id,
            name: s.name,
            age: s.age,
            email: s.email,
            registered_course_ids: s.course_ids,
        })
        .collect::<Vec<_>>();
    let instructors = db
        .instructors()
        .fetch(&ListQuery::new())?
        .into_iter()
        .map(|i| InstructorEntry {
            instructor_id: i.instructor_id,
            name: i.name,
            age: i.age,
            email: i.email,
            assigned_course_ids: i.course_id.into_iter().collect(),
        })
        .collect::<Vec<_>>();
    let courses = db
        .courses()
        .fetch(&ListQuery::new())?
        .into_iter()
        .map(|c| CourseEntry {
            course_id: c.course_id,
            course_name: c.course_name,
            instructor_id: c.instructor_id,
            student_ids: c.student_ids,
        })
        .collect::<Vec<_>>();
    info!(
        students = students.len(),
        instructors = instructors.len(),
        courses = courses.len(),
        "snapshot exported"
    );
    Ok(Snapshot {
        students,
        instructors,
        courses,
    })
}

/// Upserts every entry of `snapshot` into `db`.
pub fn import(db: &SchoolDb, snapshot: &Snapshot) -> RecordsResult<ImportReport> {
    apply(db, snapshot, &[], ImportReport::default())
}

/// Create, or update when the id already exists. Rejections are recorded
/// in `report`; anything else is returned.
fn upsert<R: Repository>(
    repo: &R,
    section: &'static str,
    id: &str,
    fields: &R::Fields,
    report: &mut ImportReport,
) -> RecordsResult<()> {
    let result = match repo.create(fields) {
        Ok(_) => {
            report.created += 1;
            Ok(())
        }
        Err(RecordsError::DuplicateId { .. }) => repo.update(id, fields).map(|()| report.updated += 1),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.is_rejection() => {
            report.skip(section, id, e);
            Ok(())
        }
        other => other,
    }
}

/// Shared import path. `extra_pairs` are registrations listed outside the
/// entities themselves; `report` may already hold entries skipped while decoding.
pub(crate) fn apply(
    db: &SchoolDb,
    snapshot: &Snapshot,
    extra_pairs: &[(String, String)],
    mut report: ImportReport,
) -> RecordsResult<ImportReport> {
    let instructors = db.instructors();
    for i in &snapshot.instructors {
        let fields = PersonFields::new(&i.instructor_id, &i.name, i.age, &i.email);
        upsert(&instructors, "instructors", &i.instructor_id, &fields, &mut report)?;
    }

    let students = db.students();
    for s in &snapshot.students {
        let fields = PersonFields::new(&s.student_id, &s.name, s.age, &s.email);
        upsert(&students, "students", &s.student_id, &fields, &mut report)?;
    }

    let courses = db.courses();
    for c in &snapshot.courses {
        let fields = CourseFields {
            id: c.course_id.clone(),
            name: c.course_name.clone(),
            instructor_id: c.instructor_id.clone(),
        };
        upsert(&courses, "courses", &c.course_id, &fields, &mut report)?;
    }

    let mut pairs: BTreeSet<(String, String)> = snapshot.registrations().into_iter().collect();
    pairs.extend(extra_pairs.iter().cloned());
    for (student_id, course_id) in pairs {
        match db.enroll(&student_id, &course_id) {
            Ok(EnrollOutcome::Enrolled) => report.enrolled += 1,
            Ok(EnrollOutcome::AlreadyEnrolled) => {}
            Err(e) if e.is_rejection() => {
                report.skip("registrations", format!("{student_id}/{course_id}"), e)
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        created = report.created,
        updated = report.updated,
        enrolled = report.enrolled,
        skipped = report.skipped.len(),
        "import finished"
    );
    Ok(report)
}
