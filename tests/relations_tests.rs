use school_records::{
    AssignOutcome, CourseFields, EnrollOutcome, EntityKind, InstructorSlot, PersonFields,
    RecordsError, RecordsResult, Repository, SchoolDb,
};

fn school() -> RecordsResult<SchoolDb> {
    let db = SchoolDb::open_in_memory()?;
    db.students()
        .create(&PersonFields::new("S1", "Ann", 20, "ann@x.com"))?;
    db.students()
        .create(&PersonFields::new("S2", "Bob", 22, "bob@x.com"))?;
    db.instructors()
        .create(&PersonFields::new("I1", "Grace", 45, "grace@uni.edu"))?;
    db.instructors()
        .create(&PersonFields::new("I2", "Alan", 41, "alan@uni.edu"))?;
    db.courses().create(&CourseFields::new("C1", "Algo"))?;
    db.courses().create(&CourseFields::new("C2", "Databases"))?;
    Ok(db)
}

#[test]
fn test_enroll_then_delete_student() -> RecordsResult<()> {
    let db = school()?;
    assert_eq!(db.enroll("S1", "C1")?, EnrollOutcome::Enrolled);
    assert_eq!(db.courses().read("C1")?.unwrap().student_ids, vec!["S1".to_string()]);
    assert_eq!(db.students().read("S1")?.unwrap().course_ids, vec!["C1".to_string()]);

    db.students().delete("S1")?;
    assert!(db.courses().read("C1")?.unwrap().student_ids.is_empty());
    Ok(())
}

#[test]
fn test_enroll_is_idempotent() -> RecordsResult<()> {
    let db = school()?;
    assert_eq!(db.enroll("S1", "C1")?, EnrollOutcome::Enrolled);
    assert_eq!(db.enroll("S1", "C1")?, EnrollOutcome::AlreadyEnrolled);
    assert_eq!(db.courses().read("C1")?.unwrap().student_ids.len(), 1);
    Ok(())
}

#[test]
fn test_enroll_requires_both_records() -> RecordsResult<()> {
    let db = school()?;
    let err = db.enroll("ghost", "C1").unwrap_err();
    assert!(matches!(err, RecordsError::NotFound { kind: EntityKind::Student, .. }));
    let err = db.enroll("S1", "ghost").unwrap_err();
    assert!(matches!(err, RecordsError::NotFound { kind: EntityKind::Course, .. }));
    assert!(db.students().read("S1")?.unwrap().course_ids.is_empty());
    Ok(())
}

#[test]
fn test_unenroll_reports_whether_pair_existed() -> RecordsResult<()> {
    let db = school()?;
    db.enroll("S1", "C1")?;
    db.enroll("S2", "C1")?;
    assert!(db.unenroll("S1", "C1")?);
    assert!(!db.unenroll("S1", "C1")?);
    assert!(!db.unenroll("ghost", "C1")?);
    assert_eq!(db.courses().read("C1")?.unwrap().student_ids, vec!["S2".to_string()]);
    Ok(())
}

#[test]
fn test_assign_is_idempotent_and_unassign_clears() -> RecordsResult<()> {
    let db = school()?;
    assert_eq!(db.assign_instructor("I1", "C1")?, AssignOutcome::Assigned);
    assert_eq!(db.assign_instructor("I1", "C1")?, AssignOutcome::AlreadyAssigned);
    assert_eq!(db.courses().read("C1")?.unwrap().instructor_id.as_deref(), Some("I1"));
    assert_eq!(db.instructors().read("I1")?.unwrap().course_id.as_deref(), Some("C1"));

    assert!(db.unassign_instructor("C1")?);
    assert_eq!(db.courses().read("C1")?.unwrap().instructor_id, None);
    assert!(!db.unassign_instructor("C1")?);
    Ok(())
}

#[test]
fn test_instructor_cannot_teach_two_courses() -> RecordsResult<()> {
    let db = school()?;
    db.assign_instructor("I1", "C1")?;
    let err = db.assign_instructor("I1", "C2").unwrap_err();
    match err {
        RecordsError::AlreadyAssignedElsewhere {
            instructor_id,
            course_id,
        } => {
            assert_eq!(instructor_id, "I1");
            assert_eq!(course_id, "C1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(db.instructor_slot("C1")?, InstructorSlot::Assigned("I1".into()));
    assert_eq!(db.instructor_slot("C2")?, InstructorSlot::Unassigned);
    Ok(())
}

#[test]
fn test_course_cannot_be_reassigned_without_unassign() -> RecordsResult<()> {
    let db = school()?;
    db.assign_instructor("I1", "C1")?;
    let err = db.assign_instructor("I2", "C1").unwrap_err();
    assert!(matches!(err, RecordsError::CourseAlreadyHasInstructor { .. }));
    assert_eq!(db.instructor_slot("C1")?, InstructorSlot::Assigned("I1".into()));

    db.unassign_instructor("C1")?;
    assert_eq!(db.assign_instructor("I2", "C1")?, AssignOutcome::Assigned);
    // I1 is free again
    assert_eq!(db.assign_instructor("I1", "C2")?, AssignOutcome::Assigned);
    Ok(())
}

#[test]
fn test_assignment_requires_both_records() -> RecordsResult<()> {
    let db = school()?;
    let err = db.assign_instructor("ghost", "C1").unwrap_err();
    assert!(matches!(err, RecordsError::NotFound { kind: EntityKind::Instructor, .. }));
    let err = db.assign_instructor("I1", "ghost").unwrap_err();
    assert!(matches!(err, RecordsError::NotFound { kind: EntityKind::Course, .. }));
    let err = db.unassign_instructor("ghost").unwrap_err();
    assert!(matches!(err, RecordsError::NotFound { kind: EntityKind::Course, .. }));
    Ok(())
}

#[test]
fn test_deleting_instructor_frees_course_slot() -> RecordsResult<()> {
    let db = school()?;
    db.assign_instructor("I1", "C1")?;
    db.instructors().delete("I1")?;
    assert_eq!(db.instructor_slot("C1")?, InstructorSlot::Unassigned);
    assert_eq!(db.assign_instructor("I2", "C1")?, AssignOutcome::Assigned);
    Ok(())
}

#[test]
fn test_slot_transitions() {
    let empty = InstructorSlot::Unassigned;
    assert_eq!(empty.assign("C1", "I1").unwrap(), AssignOutcome::Assigned);

    let taken = InstructorSlot::from_column(Some("I1".into()));
    assert_eq!(taken.instructor_id(), Some("I1"));
    assert_eq!(taken.assign("C1", "I1").unwrap(), AssignOutcome::AlreadyAssigned);
    assert!(matches!(
        taken.assign("C1", "I2"),
        Err(RecordsError::CourseAlreadyHasInstructor { .. })
    ));
}
