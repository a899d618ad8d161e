//! Per-session selection state.
//!
//! A front-end keeps one [`Session`] per open window or command context and
//! passes it to the operations that act on "the selected record".

use tracing::debug;

use crate::error::{RecordsError, RecordsResult};
use crate::model::EntityKind;
use crate::repository::Repository;
use crate::sqlite::SchoolDb;

/// The record a user currently has selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub kind: EntityKind,
    pub id: String,
}

#[derive(Debug, Default)]
pub struct Session {
    selected: Option<Selection>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, kind: EntityKind, id: impl Into<String>) {
        self.selected = Some(Selection {
            kind,
            id: id.into(),
        });
    }

    pub fn selected(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    /// Selected id, if the selection is of `kind`.
    pub fn selected_id(&self, kind: EntityKind) -> Option<&str> {
        self.selected
            .as_ref()
            .filter(|s| s.kind == kind)
            .map(|s| s.id.as_str())
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Drops the selection if its record no longer exists. Returns whether a
    /// selection is still held.
    pub fn refresh(&mut self, db: &SchoolDb) -> RecordsResult<bool> {
        let Some(selection) = &self.selected else {
            return Ok(false);
        };
        let present = match selection.kind {
            EntityKind::Student => db.students().exists(&selection.id)?,
            EntityKind::Instructor => db.instructors().exists(&selection.id)?,
            EntityKind::Course => db.courses().exists(&selection.id)?,
        };
        if !present {
            debug!(kind = %selection.kind, id = %selection.id, "selection dropped");
            self.selected = None;
        }
        Ok(present)
    }

    /// Deletes the selected record (with its cascades) and clears the selection.
    pub fn delete_selected(&mut self, db: &SchoolDb) -> RecordsResult<Selection> {
        let selection = self.selected.clone().ok_or_else(|| {
            RecordsError::invalid("selection", "no record is selected")
        })?;
        match selection.kind {
            EntityKind::Student => db.students().delete(&selection.id)?,
            EntityKind::Instructor => db.instructors().delete(&selection.id)?,
            EntityKind::Course => db.courses().delete(&selection.id)?,
        }
        self.selected = None;
        Ok(selection)
    }
}
