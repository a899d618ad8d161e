//! Entity repositories for students, instructors and courses.
//!
//! All three share the [`Repository`] contract. Every write runs in a single
//! transaction through [`SchoolDb::write`], so a failed validation, policy
//! check or engine error leaves nothing behind.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{RecordsError, RecordsResult};
use crate::model::{
    CourseFields, CourseRecord, EntityKind, InstructorRecord, PersonFields, StudentRecord,
    ValidPerson,
};
use crate::relations::{self, InstructorSlot};
use crate::sqlite::{constraint_violation, SchoolDb};
use crate::validate::validate_id;

/// Ordering key for [`Repository::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Id,
    Name,
    /// Students and instructors only.
    Email,
    /// Courses only.
    Instructor,
}

/// Filter and ordering for a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Case-insensitive substring matched against id, name and email
    /// (instructor id for courses).
    pub search: Option<String>,
    pub order_by: SortKey,
    pub descending: bool,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }
    pub fn order_by(mut self, key: SortKey) -> Self {
        self.order_by = key;
        self
    }
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

/// A deferred listing. Nothing is queried until [`Listing::iter`] is called,
/// and every call re-runs the query against the current state.
pub struct Listing<'a, R: Repository> {
    repo: &'a R,
    query: ListQuery,
}

impl<'a, R: Repository> Listing<'a, R> {
    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn iter(&self) -> RecordsResult<std::vec::IntoIter<R::Record>> {
        Ok(self.repo.fetch(&self.query)?.into_iter())
    }

    pub fn to_vec(&self) -> RecordsResult<Vec<R::Record>> {
        self.repo.fetch(&self.query)
    }
}

/// The uniform CRUD contract shared by every entity kind.
pub trait Repository: Sized {
    /// Raw input accepted by `create` and `update`.
    type Fields;
    /// What `read` and `list` return.
    type Record;

    const KIND: EntityKind;

    /// Validates and stores a new record, returning its id.
    fn create(&self, fields: &Self::Fields) -> RecordsResult<String>;

    fn read(&self, id: &str) -> RecordsResult<Option<Self::Record>>;

    /// Replaces every mutable field of `id`. The id itself cannot change.
    fn update(&self, id: &str, fields: &Self::Fields) -> RecordsResult<()>;

    /// Removes `id` and resolves everything that referenced it.
    fn delete(&self, id: &str) -> RecordsResult<()>;

    /// Runs a listing query immediately.
    fn fetch(&self, query: &ListQuery) -> RecordsResult<Vec<Self::Record>>;

    fn db(&self) -> &SchoolDb;

    fn list(&self, query: ListQuery) -> Listing<'_, Self> {
        Listing { repo: self, query }
    }

    fn exists(&self, id: &str) -> RecordsResult<bool> {
        exists(self.db().connection(), Self::KIND, id)
    }
}

impl SchoolDb {
    pub fn students(&self) -> Students<'_> {
        Students { db: self }
    }
    pub fn instructors(&self) -> Instructors<'_> {
        Instructors { db: self }
    }
    pub fn courses(&self) -> Courses<'_> {
        Courses { db: self }
    }
}

pub(crate) fn exists(conn: &Connection, kind: EntityKind, id: &str) -> RecordsResult<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1",
        kind.table(),
        kind.id_column()
    );
    Ok(conn
        .query_row(&sql, [id], |row| row.get::<_, i64>(0))
        .optional()?
        .is_some())
}

pub(crate) fn require(conn: &Connection, kind: EntityKind, id: &str) -> RecordsResult<()> {
    if exists(conn, kind, id)? {
        Ok(())
    } else {
        Err(RecordsError::not_found(kind, id))
    }
}

/// Maps an engine error raised while writing `id` onto the error taxonomy.
fn normalize(kind: EntityKind, id: &str, email: Option<&str>, err: rusqlite::Error) -> RecordsError {
    let Some(msg) = constraint_violation(&err).map(str::to_owned) else {
        return err.into();
    };
    if msg.contains("UNIQUE") || msg.contains("PRIMARY KEY") {
        return match email {
            Some(email) if msg.ends_with(".email") => RecordsError::DuplicateEmail {
                kind,
                email: email.to_string(),
            },
            _ => RecordsError::DuplicateId {
                kind,
                id: id.to_string(),
            },
        };
    }
    if msg.contains("CHECK") {
        return RecordsError::invalid("age", "must be non-negative");
    }
    if msg.contains("FOREIGN KEY") {
        return RecordsError::not_found(kind, id);
    }
    err.into()
}

fn check_update_id(target: &str, supplied: &str) -> RecordsResult<String> {
    let target = validate_id(target)?;
    let supplied = supplied.trim();
    if !supplied.is_empty() && supplied != target {
        return Err(RecordsError::IdImmutable {
            current: target,
            supplied: supplied.to_string(),
        });
    }
    Ok(target)
}

fn like_pattern(search: &str) -> String {
    let mut pattern = String::from("%");
    for ch in search.trim().to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn order_clause(kind: EntityKind, query: &ListQuery) -> RecordsResult<String> {
    let column = match (kind, query.order_by) {
        (_, SortKey::Id) => kind.id_column(),
        (_, SortKey::Name) => kind.name_column(),
        (EntityKind::Course, SortKey::Instructor) => "instructor_id",
        (EntityKind::Student | EntityKind::Instructor, SortKey::Email) => "email",
        (_, key) => {
            return Err(RecordsError::invalid(
                "sort key",
                format!("{key:?} does not apply to {kind}"),
            ))
        }
    };
    let direction = if query.descending { "DESC" } else { "ASC" };
    Ok(format!(
        "ORDER BY {column} COLLATE NOCASE {direction}, {} {direction}",
        kind.id_column()
    ))
}

// ── People (students and instructors) ────────────────────────────

struct PersonRow {
    id: String,
    name: String,
    age: i64,
    email: String,
}

/// Whether another record of `kind` (other than `except`) uses `email`.
/// SQLite's `lower()` and `NOCASE` only fold ASCII, so the comparison is
/// done with Unicode lowercasing here.
fn email_taken(conn: &Connection, kind: EntityKind, email: &str, except: &str) -> RecordsResult<bool> {
    let sql = format!(
        "SELECT email FROM {} WHERE {} <> ?1",
        kind.table(),
        kind.id_column()
    );
    let wanted = email.to_lowercase();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([except], |row| row.get::<_, String>(0))?;
    for existing in rows {
        if existing?.to_lowercase() == wanted {
            return Ok(true);
        }
    }
    Ok(false)
}

fn insert_person(conn: &Connection, kind: EntityKind, person: &ValidPerson) -> RecordsResult<()> {
    if exists(conn, kind, &person.id)? {
        return Err(RecordsError::DuplicateId {
            kind,
            id: person.id.clone(),
        });
    }
    if email_taken(conn, kind, &person.email, "")? {
        return Err(RecordsError::DuplicateEmail {
            kind,
            email: person.email.clone(),
        });
    }
    let sql = format!(
        "INSERT INTO {} ({}, name, age, email) VALUES (?1, ?2, ?3, ?4)",
        kind.table(),
        kind.id_column()
    );
    conn.execute(
        &sql,
        params![person.id, person.name, person.age, person.email],
    )
    .map_err(|e| normalize(kind, &person.id, Some(&person.email), e))?;
    Ok(())
}

fn update_person(conn: &Connection, kind: EntityKind, person: &ValidPerson) -> RecordsResult<()> {
    require(conn, kind, &person.id)?;
    if email_taken(conn, kind, &person.email, &person.id)? {
        return Err(RecordsError::DuplicateEmail {
            kind,
            email: person.email.clone(),
        });
    }
    let sql = format!(
        "UPDATE {} SET name = ?1, age = ?2, email = ?3 WHERE {} = ?4",
        kind.table(),
        kind.id_column()
    );
    conn.execute(
        &sql,
        params![person.name, person.age, person.email, person.id],
    )
    .map_err(|e| normalize(kind, &person.id, Some(&person.email), e))?;
    Ok(())
}

fn read_person(conn: &Connection, kind: EntityKind, id: &str) -> RecordsResult<Option<PersonRow>> {
    let sql = format!(
        "SELECT {id}, name, age, email FROM {table} WHERE {id} = ?1",
        id = kind.id_column(),
        table = kind.table()
    );
    Ok(conn
        .query_row(&sql, [id], |row| {
            Ok(PersonRow {
                id: row.get(0)?,
                name: row.get(1)?,
                age: row.get(2)?,
                email: row.get(3)?,
            })
        })
        .optional()?)
}

fn fetch_people(conn: &Connection, kind: EntityKind, query: &ListQuery) -> RecordsResult<Vec<PersonRow>> {
    let order = order_clause(kind, query)?;
    let mut sql = format!(
        "SELECT {id}, name, age, email FROM {table}",
        id = kind.id_column(),
        table = kind.table()
    );
    let pattern = query.search.as_deref().map(like_pattern);
    if pattern.is_some() {
        sql.push_str(&format!(
            " WHERE lower({}) LIKE ?1 ESCAPE '\\' OR lower(name) LIKE ?1 ESCAPE '\\' \
             OR lower(email) LIKE ?1 ESCAPE '\\'",
            kind.id_column()
        ));
    }
    sql.push(' ');
    sql.push_str(&order);

    let mut stmt = conn.prepare(&sql)?;
    let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<PersonRow> {
        Ok(PersonRow {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            email: row.get(3)?,
        })
    };
    let rows = match &pattern {
        Some(p) => stmt.query_map([p], map)?,
        None => stmt.query_map([], map)?,
    };
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn course_ids_for_student(conn: &Connection, student_id: &str) -> RecordsResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT course_id FROM registrations WHERE student_id = ?1 ORDER BY course_id")?;
    let rows = stmt.query_map([student_id], |row| row.get(0))?;
    let mut out = Vec::new();
    for id in rows {
        out.push(id?);
    }
    Ok(out)
}

fn student_ids_for_course(conn: &Connection, course_id: &str) -> RecordsResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT student_id FROM registrations WHERE course_id = ?1 ORDER BY student_id")?;
    let rows = stmt.query_map([course_id], |row| row.get(0))?;
    let mut out = Vec::new();
    for id in rows {
        out.push(id?);
    }
    Ok(out)
}

fn assigned_course(conn: &Connection, instructor_id: &str) -> RecordsResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT course_id FROM courses WHERE instructor_id = ?1 ORDER BY course_id LIMIT 1",
            [instructor_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn to_student(conn: &Connection, row: PersonRow) -> RecordsResult<StudentRecord> {
    let course_ids = course_ids_for_student(conn, &row.id)?;
    Ok(StudentRecord {
        student_id: row.id,
        name: row.name,
        age: row.age,
        email: row.email,
        course_ids,
    })
}

fn to_instructor(conn: &Connection, row: PersonRow) -> RecordsResult<InstructorRecord> {
    let course_id = assigned_course(conn, &row.id)?;
    Ok(InstructorRecord {
        instructor_id: row.id,
        name: row.name,
        age: row.age,
        email: row.email,
        course_id,
    })
}

fn validated_for_update(id: &str, fields: &PersonFields) -> RecordsResult<ValidPerson> {
    let id = check_update_id(id, &fields.id)?;
    PersonFields {
        id,
        ..fields.clone()
    }
    .validate()
}

/// Student repository.
pub struct Students<'a> {
    db: &'a SchoolDb,
}

impl Repository for Students<'_> {
    type Fields = PersonFields;
    type Record = StudentRecord;

    const KIND: EntityKind = EntityKind::Student;

    fn create(&self, fields: &PersonFields) -> RecordsResult<String> {
        let person = fields.validate()?;
        self.db.write(|tx| insert_person(tx, Self::KIND, &person))?;
        debug!(student_id = %person.id, "student created");
        Ok(person.id)
    }

    fn read(&self, id: &str) -> RecordsResult<Option<StudentRecord>> {
        let conn = self.db.connection();
        read_person(conn, Self::KIND, id.trim())?
            .map(|row| to_student(conn, row))
            .transpose()
    }

    fn update(&self, id: &str, fields: &PersonFields) -> RecordsResult<()> {
        let person = validated_for_update(id, fields)?;
        self.db.write(|tx| update_person(tx, Self::KIND, &person))?;
        debug!(student_id = %person.id, "student updated");
        Ok(())
    }

    fn delete(&self, id: &str) -> RecordsResult<()> {
        let id = validate_id(id)?;
        let dropped = self.db.write(|tx| {
            require(tx, Self::KIND, &id)?;
            let dropped = tx.execute("DELETE FROM registrations WHERE student_id = ?1", [&id])?;
            tx.execute("DELETE FROM students WHERE student_id = ?1", [&id])?;
            Ok(dropped)
        })?;
        debug!(student_id = %id, enrollments_removed = dropped, "student deleted");
        Ok(())
    }

    fn fetch(&self, query: &ListQuery) -> RecordsResult<Vec<StudentRecord>> {
        let conn = self.db.connection();
        fetch_people(conn, Self::KIND, query)?
            .into_iter()
            .map(|row| to_student(conn, row))
            .collect()
    }

    fn db(&self) -> &SchoolDb {
        self.db
    }
}

/// Instructor repository.
pub struct Instructors<'a> {
    db: &'a SchoolDb,
}

impl Repository for Instructors<'_> {
    type Fields = PersonFields;
    type Record = InstructorRecord;

    const KIND: EntityKind = EntityKind::Instructor;

    fn create(&self, fields: &PersonFields) -> RecordsResult<String> {
        let person = fields.validate()?;
        self.db.write(|tx| insert_person(tx, Self::KIND, &person))?;
        debug!(instructor_id = %person.id, "instructor created");
        Ok(person.id)
    }

    fn read(&self, id: &str) -> RecordsResult<Option<InstructorRecord>> {
        let conn = self.db.connection();
        read_person(conn, Self::KIND, id.trim())?
            .map(|row| to_instructor(conn, row))
            .transpose()
    }

    fn update(&self, id: &str, fields: &PersonFields) -> RecordsResult<()> {
        let person = validated_for_update(id, fields)?;
        self.db.write(|tx| update_person(tx, Self::KIND, &person))?;
        debug!(instructor_id = %person.id, "instructor updated");
        Ok(())
    }

    fn delete(&self, id: &str) -> RecordsResult<()> {
        let id = validate_id(id)?;
        let detached = self.db.write(|tx| {
            require(tx, Self::KIND, &id)?;
            let detached = tx.execute(
                "UPDATE courses SET instructor_id = NULL WHERE instructor_id = ?1",
                [&id],
            )?;
            tx.execute("DELETE FROM instructors WHERE instructor_id = ?1", [&id])?;
            Ok(detached)
        })?;
        debug!(instructor_id = %id, courses_detached = detached, "instructor deleted");
        Ok(())
    }

    fn fetch(&self, query: &ListQuery) -> RecordsResult<Vec<InstructorRecord>> {
        let conn = self.db.connection();
        fetch_people(conn, Self::KIND, query)?
            .into_iter()
            .map(|row| to_instructor(conn, row))
            .collect()
    }

    fn db(&self) -> &SchoolDb {
        self.db
    }
}

// ── Courses ──────────────────────────────────────────────────────

struct CourseRow {
    id: String,
    name: String,
    instructor_id: Option<String>,
}

fn to_course(conn: &Connection, row: CourseRow) -> RecordsResult<CourseRecord> {
    let student_ids = student_ids_for_course(conn, &row.id)?;
    Ok(CourseRecord {
        course_id: row.id,
        course_name: row.name,
        instructor_id: row.instructor_id,
        student_ids,
    })
}

/// Course repository.
///
/// The instructor link supplied in [`CourseFields`] goes through the same
/// slot rules as [`SchoolDb::assign_instructor`]: it may fill an empty slot,
/// repeat the current instructor, or clear the slot, but never replace one
/// instructor with another.
pub struct Courses<'a> {
    db: &'a SchoolDb,
}

impl Repository for Courses<'_> {
    type Fields = CourseFields;
    type Record = CourseRecord;

    const KIND: EntityKind = EntityKind::Course;

    fn create(&self, fields: &CourseFields) -> RecordsResult<String> {
        let course = fields.validate()?;
        self.db.write(|tx| {
            if exists(tx, Self::KIND, &course.id)? {
                return Err(RecordsError::DuplicateId {
                    kind: Self::KIND,
                    id: course.id.clone(),
                });
            }
            tx.execute(
                "INSERT INTO courses (course_id, course_name, instructor_id) VALUES (?1, ?2, NULL)",
                params![course.id, course.name],
            )
            .map_err(|e| normalize(Self::KIND, &course.id, None, e))?;
            if let Some(instructor_id) = &course.instructor_id {
                relations::apply_assignment(tx, instructor_id, &course.id, &InstructorSlot::Unassigned)?;
            }
            Ok(())
        })?;
        debug!(course_id = %course.id, "course created");
        Ok(course.id)
    }

    fn read(&self, id: &str) -> RecordsResult<Option<CourseRecord>> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT course_id, course_name, instructor_id FROM courses WHERE course_id = ?1",
            [id.trim()],
            |row| {
                Ok(CourseRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    instructor_id: row.get(2)?,
                })
            },
        )
        .optional()?
        .map(|row| to_course(conn, row))
        .transpose()
    }

    fn update(&self, id: &str, fields: &CourseFields) -> RecordsResult<()> {
        let id = check_update_id(id, &fields.id)?;
        let course = CourseFields {
            id,
            ..fields.clone()
        }
        .validate()?;
        self.db.write(|tx| {
            let slot = relations::course_slot(tx, &course.id)?
                .ok_or_else(|| RecordsError::not_found(Self::KIND, &course.id))?;
            tx.execute(
                "UPDATE courses SET course_name = ?1 WHERE course_id = ?2",
                params![course.name, course.id],
            )
            .map_err(|e| normalize(Self::KIND, &course.id, None, e))?;
            match &course.instructor_id {
                Some(instructor_id) => {
                    relations::apply_assignment(tx, instructor_id, &course.id, &slot)?;
                }
                None => {
                    relations::clear_assignment(tx, &course.id)?;
                }
            }
            Ok(())
        })?;
        debug!(course_id = %course.id, "course updated");
        Ok(())
    }

    fn delete(&self, id: &str) -> RecordsResult<()> {
        let id = validate_id(id)?;
        let dropped = self.db.write(|tx| {
            require(tx, Self::KIND, &id)?;
            let dropped = tx.execute("DELETE FROM registrations WHERE course_id = ?1", [&id])?;
            tx.execute("DELETE FROM courses WHERE course_id = ?1", [&id])?;
            Ok(dropped)
        })?;
        debug!(course_id = %id, enrollments_removed = dropped, "course deleted");
        Ok(())
    }

    fn fetch(&self, query: &ListQuery) -> RecordsResult<Vec<CourseRecord>> {
        let conn = self.db.connection();
        let order = order_clause(Self::KIND, query)?;
        let mut sql = String::from("SELECT course_id, course_name, instructor_id FROM courses");
        let pattern = query.search.as_deref().map(like_pattern);
        if pattern.is_some() {
            sql.push_str(
                " WHERE lower(course_id) LIKE ?1 ESCAPE '\\' OR lower(course_name) LIKE ?1 ESCAPE '\\' \
                 OR lower(IFNULL(instructor_id, '')) LIKE ?1 ESCAPE '\\'",
            );
        }
        sql.push(' ');
        sql.push_str(&order);

        let mut stmt = conn.prepare(&sql)?;
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CourseRow> {
            Ok(CourseRow {
                id: row.get(0)?,
                name: row.get(1)?,
                instructor_id: row.get(2)?,
            })
        };
        let rows = match &pattern {
            Some(p) => stmt.query_map([p], map)?,
            None => stmt.query_map([], map)?,
        };
        let mut out = Vec::new();
        for row in rows {
            out.push(to_course(conn, row?)?);
        }
        Ok(out)
    }

    fn db(&self) -> &SchoolDb {
        self.db
    }
}
