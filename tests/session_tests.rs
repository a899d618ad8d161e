use school_records::{
    CourseFields, EntityKind, PersonFields, RecordsError, RecordsResult, Repository, SchoolDb,
    Selection, Session,
};

fn school() -> RecordsResult<SchoolDb> {
    let db = SchoolDb::open_in_memory()?;
    db.students()
        .create(&PersonFields::new("S1", "Ann", 20, "ann@x.com"))?;
    db.instructors()
        .create(&PersonFields::new("I1", "Grace", 45, "grace@uni.edu"))?;
    db.courses()
        .create(&CourseFields::new("C1", "Algo").with_instructor("I1"))?;
    db.enroll("S1", "C1")?;
    Ok(db)
}

#[test]
fn test_selection_is_typed() {
    let mut session = Session::new();
    assert!(session.selected().is_none());

    session.select(EntityKind::Course, "C1");
    assert_eq!(session.selected_id(EntityKind::Course), Some("C1"));
    assert_eq!(session.selected_id(EntityKind::Student), None);

    session.select(EntityKind::Student, "S1");
    assert_eq!(
        session.selected(),
        Some(&Selection {
            kind: EntityKind::Student,
            id: "S1".into(),
        })
    );

    session.clear();
    assert!(session.selected().is_none());
}

#[test]
fn test_refresh_drops_vanished_selection() -> RecordsResult<()> {
    let db = school()?;
    let mut session = Session::new();
    assert!(!session.refresh(&db)?);

    session.select(EntityKind::Student, "S1");
    assert!(session.refresh(&db)?);

    db.students().delete("S1")?;
    assert!(!session.refresh(&db)?);
    assert!(session.selected().is_none());
    Ok(())
}

#[test]
fn test_delete_selected_applies_cascades() -> RecordsResult<()> {
    let db = school()?;
    let mut session = Session::new();
    session.select(EntityKind::Instructor, "I1");

    let deleted = session.delete_selected(&db)?;
    assert_eq!(deleted.id, "I1");
    assert!(session.selected().is_none());
    assert!(db.instructors().read("I1")?.is_none());
    assert_eq!(db.courses().read("C1")?.unwrap().instructor_id, None);

    session.select(EntityKind::Course, "C1");
    session.delete_selected(&db)?;
    assert!(db.students().read("S1")?.unwrap().course_ids.is_empty());
    Ok(())
}

#[test]
fn test_delete_without_selection() -> RecordsResult<()> {
    let db = school()?;
    let mut session = Session::new();
    let err = session.delete_selected(&db).unwrap_err();
    assert!(matches!(err, RecordsError::InvalidField { field: "selection", .. }));

    // A stale selection reports the missing record and is kept for the caller
    session.select(EntityKind::Student, "ghost");
    let err = session.delete_selected(&db).unwrap_err();
    assert!(matches!(err, RecordsError::NotFound { kind: EntityKind::Student, .. }));
    assert!(session.selected().is_some());
    Ok(())
}
