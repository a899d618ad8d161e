use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

use super::{apply, ImportReport, Snapshot};
use crate::error::{RecordsError, RecordsResult};
use crate::sqlite::SchoolDb;

impl Snapshot {
    pub fn to_json(&self) -> RecordsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> RecordsResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Decodes one top-level array entry by entry, keeping the ones that parse.
fn decode_section<T: DeserializeOwned>(
    root: &Value,
    section: &'static str,
    id_field: &str,
    report: &mut ImportReport,
) -> RecordsResult<Vec<T>> {
    let entries = match root.get(section) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(RecordsError::Import(format!(
                "`{section}` must be an array"
            )))
        }
    };
    let mut out = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<T>(entry.clone()) {
            Ok(decoded) => out.push(decoded),
            Err(e) => {
                let key = entry
                    .get(id_field)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{index}"));
                report.skip(section, key, e);
            }
        }
    }
    Ok(out)
}

/// Imports a JSON document with `students`, `instructors` and `courses` arrays.
///
/// The document must be a JSON object; individual malformed entries are
/// skipped and reported rather than failing the import.
pub fn import_json(db: &SchoolDb, text: &str) -> RecordsResult<ImportReport> {
    let root: Value = serde_json::from_str(text)?;
    if !root.is_object() {
        return Err(RecordsError::Import(
            "expected a JSON object at the top level".to_string(),
        ));
    }
    let mut report = ImportReport::default();
    let snapshot = Snapshot {
        instructors: decode_section(&root, "instructors", "instructor_id", &mut report)?,
        students: decode_section(&root, "students", "student_id", &mut report)?,
        courses: decode_section(&root, "courses", "course_id", &mut report)?,
    };
    apply(db, &snapshot, &[], report)
}
