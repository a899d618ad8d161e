//! Sectioned CSV: one block per table, each a label row, a header row and
//! data rows, separated by blank lines.
//!
//! ```text
//! students
//! student_id,name,age,email
//! S1,Ann,20,ann@x.com
//!
//! registrations
//! student_id,course_id
//! S1,C1
//! ```

use csv::StringRecord;
use std::io::{self, Write};

use super::{apply, CourseEntry, ImportReport, InstructorEntry, Snapshot, StudentEntry};
use crate::error::RecordsResult;
use crate::sqlite::SchoolDb;

const STUDENT_HEADERS: [&str; 4] = ["student_id", "name", "age", "email"];
const INSTRUCTOR_HEADERS: [&str; 4] = ["instructor_id", "name", "age", "email"];
const COURSE_HEADERS: [&str; 3] = ["course_id", "course_name", "instructor_id"];
const REGISTRATION_HEADERS: [&str; 2] = ["student_id", "course_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Students,
    Instructors,
    Courses,
    Registrations,
}

impl Section {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "students" => Some(Section::Students),
            "instructors" => Some(Section::Instructors),
            "courses" => Some(Section::Courses),
            "registrations" => Some(Section::Registrations),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Section::Students => "students",
            Section::Instructors => "instructors",
            Section::Courses => "courses",
            Section::Registrations => "registrations",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            Section::Students | Section::Registrations => "student_id",
            Section::Instructors => "instructor_id",
            Section::Courses => "course_id",
        }
    }
}

fn write_section<W: Write>(
    out: &mut W,
    label: &str,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> RecordsResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(&mut *out);
    wtr.write_record([label])?;
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    drop(wtr);
    // blank separator
    out.write_all(b"\n")?;
    Ok(())
}

impl Snapshot {
    /// Writes the snapshot as sectioned CSV. Registrations are written from
    /// [`Snapshot::registrations`].
    pub fn write_csv<W: Write>(&self, mut out: W) -> RecordsResult<()> {
        write_section(
            &mut out,
            "students",
            &STUDENT_HEADERS,
            self.students.iter().map(|s| {
                vec![
                    s.student_id.clone(),
                    s.name.clone(),
                    s.age.to_string(),
                    s.email.clone(),
                ]
            }),
        )?;
        write_section(
            &mut out,
            "instructors",
            &INSTRUCTOR_HEADERS,
            self.instructors.iter().map(|i| {
                vec![
                    i.instructor_id.clone(),
                    i.name.clone(),
                    i.age.to_string(),
                    i.email.clone(),
                ]
            }),
        )?;
        write_section(
            &mut out,
            "courses",
            &COURSE_HEADERS,
            self.courses.iter().map(|c| {
                vec![
                    c.course_id.clone(),
                    c.course_name.clone(),
                    c.instructor_id.clone().unwrap_or_default(),
                ]
            }),
        )?;
        write_section(
            &mut out,
            "registrations",
            &REGISTRATION_HEADERS,
            self.registrations()
                .into_iter()
                .map(|(student_id, course_id)| vec![student_id, course_id]),
        )?;
        out.flush()?;
        Ok(())
    }
}

/// A data row paired with its section's header.
struct Row<'a> {
    header: &'a [String],
    record: &'a StringRecord,
}

impl Row<'_> {
    fn field(&self, name: &str) -> Result<String, String> {
        let index = self
            .header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("missing column `{name}`"))?;
        Ok(self.record.get(index).unwrap_or("").to_string())
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.field(name).ok().filter(|v| !v.is_empty())
    }

    fn age(&self) -> Result<i64, String> {
        let raw = self.field("age")?;
        raw.parse().map_err(|_| format!("age is not an integer: {raw:?}"))
    }

    fn key(&self, section: Section) -> String {
        match self.optional(section.id_column()) {
            Some(id) => id,
            None => format!(
                "line {}",
                self.record.position().map(|p| p.line()).unwrap_or(0)
            ),
        }
    }
}

#[derive(Default)]
struct Decoded {
    snapshot: Snapshot,
    pairs: Vec<(String, String)>,
}

impl Decoded {
    fn push(&mut self, section: Section, row: &Row<'_>) -> Result<(), String> {
        match section {
            Section::Students => self.snapshot.students.push(StudentEntry {
                student_id: row.field("student_id")?,
                name: row.field("name")?,
                age: row.age()?,
                email: row.field("email")?,
                registered_course_ids: Vec::new(),
            }),
            Section::Instructors => self.snapshot.instructors.push(InstructorEntry {
                instructor_id: row.field("instructor_id")?,
                name: row.field("name")?,
                age: row.age()?,
                email: row.field("email")?,
                assigned_course_ids: Vec::new(),
            }),
            Section::Courses => self.snapshot.courses.push(CourseEntry {
                course_id: row.field("course_id")?,
                course_name: row.field("course_name")?,
                instructor_id: row.optional("instructor_id"),
                student_ids: Vec::new(),
            }),
            Section::Registrations => self
                .pairs
                .push((row.field("student_id")?, row.field("course_id")?)),
        }
        Ok(())
    }
}

/// Imports sectioned CSV as written by [`Snapshot::write_csv`].
pub fn import_csv<R: io::Read>(db: &SchoolDb, input: R) -> RecordsResult<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut report = ImportReport::default();
    let mut decoded = Decoded::default();
    let mut section: Option<Section> = None;
    let mut header: Option<Vec<String>> = None;

    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() == 1 {
            if let Some(next) = Section::from_label(&record[0]) {
                section = Some(next);
                header = None;
                continue;
            }
        }
        let Some(current) = section else {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            report.skip("csv", format!("line {line}"), "row outside of any section");
            continue;
        };
        if header.is_none() {
            header = Some(record.iter().map(str::to_string).collect());
            continue;
        }
        let columns = header.as_deref().unwrap_or_default();
        let row = Row {
            header: columns,
            record: &record,
        };
        if let Err(reason) = decoded.push(current, &row) {
            report.skip(current.label(), row.key(current), reason);
        }
    }

    apply(db, &decoded.snapshot, &decoded.pairs, report)
}
