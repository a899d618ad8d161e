use rusqlite::{Connection, ErrorCode, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RecordsResult;
use crate::model::EntityKind;

/// Path value that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }
    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// DDL for every table followed by every index, in declaration order.
    pub fn statements(&self) -> Vec<String> {
        let mut out: Vec<String> = self.tables.iter().map(TableDefinition::create_sql).collect();
        out.extend(self.tables.iter().flat_map(TableDefinition::index_sql));
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }
    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY({})", self.primary_key.join(", ")));
        }
        parts.extend(self.foreign_keys.iter().map(ForeignKey::sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.name,
            parts.join(",\n    ")
        )
    }

    pub fn index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                format!(
                    "CREATE {}INDEX IF NOT EXISTS {} ON {}({});",
                    if index.unique { "UNIQUE " } else { "" },
                    index.name,
                    self.name,
                    index.columns.join(", ")
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
        }
    }
    pub fn with(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(&constraint.sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    fn sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    NotNull,
    Unique,
    /// Case-insensitive comparison, including for `Unique`.
    NoCase,
    /// `CHECK(<expr>)`
    Check(String),
}

impl ColumnConstraint {
    fn sql(&self) -> String {
        match self {
            ColumnConstraint::NotNull => "NOT NULL".to_string(),
            ColumnConstraint::Unique => "UNIQUE".to_string(),
            ColumnConstraint::NoCase => "COLLATE NOCASE".to_string(),
            ColumnConstraint::Check(expr) => format!("CHECK({expr})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    pub fn new(column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            column: column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    fn sql(&self) -> String {
        format!(
            "FOREIGN KEY({}) REFERENCES {}({}) ON UPDATE {} ON DELETE {}",
            self.column,
            self.foreign_table,
            self.foreign_column,
            self.on_update.sql(),
            self.on_delete.sql()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForeignKeyAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ForeignKeyAction {
    fn sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }
}

fn person_table(kind: EntityKind) -> TableDefinition {
    TableDefinition::new(kind.table())
        .with_column(
            ColumnDefinition::new(kind.id_column(), DataType::Text).with(ColumnConstraint::NotNull),
        )
        .with_column(ColumnDefinition::new("name", DataType::Text).with(ColumnConstraint::NotNull))
        .with_column(
            ColumnDefinition::new("age", DataType::Integer)
                .with(ColumnConstraint::NotNull)
                .with(ColumnConstraint::Check("age >= 0".to_string())),
        )
        .with_column(
            ColumnDefinition::new("email", DataType::Text)
                .with(ColumnConstraint::NotNull)
                .with(ColumnConstraint::NoCase)
                .with(ColumnConstraint::Unique),
        )
        .with_primary_key(&[kind.id_column()])
}

/// The school schema: students, instructors, courses and registrations.
///
/// Deleting an instructor nulls `courses.instructor_id`; deleting a student or
/// course removes its registrations.
pub fn school_schema() -> Schema {
    Schema::new()
        .add_table(person_table(EntityKind::Student))
        .add_table(person_table(EntityKind::Instructor))
        .add_table(
            TableDefinition::new("courses")
                .with_column(
                    ColumnDefinition::new("course_id", DataType::Text)
                        .with(ColumnConstraint::NotNull),
                )
                .with_column(
                    ColumnDefinition::new("course_name", DataType::Text)
                        .with(ColumnConstraint::NotNull),
                )
                .with_column(ColumnDefinition::new("instructor_id", DataType::Text))
                .with_primary_key(&["course_id"])
                .with_foreign_key(
                    ForeignKey::new("instructor_id", "instructors", "instructor_id")
                        .on_update(ForeignKeyAction::Cascade)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .with_index(IndexDefinition::new(
                    "idx_courses_instructor",
                    &["instructor_id"],
                )),
        )
        .add_table(
            TableDefinition::new("registrations")
                .with_column(
                    ColumnDefinition::new("student_id", DataType::Text)
                        .with(ColumnConstraint::NotNull),
                )
                .with_column(
                    ColumnDefinition::new("course_id", DataType::Text)
                        .with(ColumnConstraint::NotNull),
                )
                .with_primary_key(&["student_id", "course_id"])
                .with_foreign_key(
                    ForeignKey::new("student_id", "students", "student_id")
                        .on_update(ForeignKeyAction::Cascade)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .with_foreign_key(
                    ForeignKey::new("course_id", "courses", "course_id")
                        .on_update(ForeignKeyAction::Cascade)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .with_index(IndexDefinition::new(
                    "idx_registrations_course",
                    &["course_id"],
                )),
        )
}

/// SQLite store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or [`IN_MEMORY`]
    pub db_path: String,
    /// Schema definition for the database
    pub schema: Schema,
    /// Enforce foreign keys on every connection
    pub foreign_keys: bool,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<String>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
            foreign_keys: true,
        }
    }

    /// Private in-memory database with the school schema.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY, school_schema())
    }
}

/// An open school database.
///
/// Owns one connection for the lifetime of the handle; the connection is
/// closed when the handle is dropped.
pub struct SchoolDb {
    config: SqliteConfig,
    connection: Connection,
}

impl SchoolDb {
    /// Opens (or creates) the database described by `config` and applies its schema.
    pub fn open(config: SqliteConfig) -> RecordsResult<Self> {
        let connection = if config.db_path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.db_path)?
        };
        if config.foreign_keys {
            connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        let db = Self { config, connection };
        db.initialize_schema()?;
        debug!(path = %db.config.db_path, "opened school database");
        Ok(db)
    }

    /// Opens a fresh in-memory database (for testing).
    pub fn open_in_memory() -> RecordsResult<Self> {
        Self::open(SqliteConfig::in_memory())
    }

    fn initialize_schema(&self) -> RecordsResult<()> {
        let sql = self.config.schema.statements().join("\n");
        self.connection.execute_batch(&sql)?;
        Ok(())
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Runs `op` inside one transaction: committed on `Ok`, rolled back otherwise.
    pub fn write<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> RecordsResult<T>,
    ) -> RecordsResult<T> {
        let tx = self.connection.unchecked_transaction()?;
        let out = op(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// All ids of `kind`, sorted.
    pub fn ids(&self, kind: EntityKind) -> RecordsResult<Vec<String>> {
        let sql = format!(
            "SELECT {id} FROM {table} ORDER BY {id}",
            id = kind.id_column(),
            table = kind.table()
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// Writes a consistent copy of the database to `dest`, replacing any existing file.
    pub fn backup_to(&self, dest: &Path) -> RecordsResult<PathBuf> {
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }
        let target = dest.to_string_lossy().into_owned();
        self.connection.execute("VACUUM INTO ?1", [&target])?;
        info!(dest = %dest.display(), "database backup written");
        Ok(dest.to_path_buf())
    }
}

/// The message of an engine-level constraint violation, if `err` is one.
pub(crate) fn constraint_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}
