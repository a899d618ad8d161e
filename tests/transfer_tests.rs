use pretty_assertions::assert_eq;
use school_records::transfer::{self, CourseEntry, Snapshot};
use school_records::{
    CourseFields, PersonFields, RecordsError, RecordsResult, Repository, SchoolDb,
};

fn populated() -> RecordsResult<SchoolDb> {
    let db = SchoolDb::open_in_memory()?;
    db.instructors()
        .create(&PersonFields::new("I1", "Grace", 45, "grace@uni.edu"))?;
    db.students()
        .create(&PersonFields::new("S1", "Ann", 20, "ann@x.com"))?;
    db.students()
        .create(&PersonFields::new("S2", "Bob", 22, "bob@x.com"))?;
    db.courses()
        .create(&CourseFields::new("C1", "Algo").with_instructor("I1"))?;
    db.courses().create(&CourseFields::new("C2", "Databases"))?;
    db.enroll("S1", "C1")?;
    db.enroll("S2", "C1")?;
    db.enroll("S2", "C2")?;
    Ok(db)
}

#[test]
fn test_export_snapshot_shape() -> RecordsResult<()> {
    let db = populated()?;
    let snapshot = transfer::export(&db)?;

    assert_eq!(snapshot.students.len(), 2);
    assert_eq!(snapshot.students[1].registered_course_ids, vec!["C1", "C2"]);
    assert_eq!(snapshot.instructors[0].assigned_course_ids, vec!["C1"]);
    assert_eq!(
        snapshot.courses[0],
        CourseEntry {
            course_id: "C1".into(),
            course_name: "Algo".into(),
            instructor_id: Some("I1".into()),
            student_ids: vec!["S1".into(), "S2".into()],
        }
    );
    assert_eq!(
        snapshot.registrations(),
        vec![
            ("S1".to_string(), "C1".to_string()),
            ("S2".to_string(), "C1".to_string()),
            ("S2".to_string(), "C2".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_json_export_import_reproduces_state() -> RecordsResult<()> {
    let source = populated()?;
    let json = transfer::export(&source)?.to_json()?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert!(value["students"].is_array());
    assert!(value["instructors"].is_array());
    assert!(value["courses"].is_array());

    let target = SchoolDb::open_in_memory()?;
    let report = transfer::import_json(&target, &json)?;
    assert_eq!(report.created, 5);
    assert_eq!(report.enrolled, 3);
    assert!(report.skipped.is_empty());
    assert_eq!(transfer::export(&target)?, transfer::export(&source)?);

    // Importing again only updates and finds every enrollment in place
    let again = transfer::import_json(&target, &json)?;
    assert_eq!(again.created, 0);
    assert_eq!(again.updated, 5);
    assert_eq!(again.enrolled, 0);
    Ok(())
}

#[test]
fn test_json_import_skips_bad_entries() -> RecordsResult<()> {
    let db = SchoolDb::open_in_memory()?;
    let json = r#"{
        "instructors": [
            {"instructor_id": "I1", "name": "Grace", "age": "45", "email": "grace@uni.edu"}
        ],
        "students": [
            {"student_id": "S1", "name": "Ann", "age": 20, "email": "ann@x.com",
             "registered_course_ids": ["C1", "C404"]},
            {"student_id": "S2", "name": "Bob", "age": 22, "email": "not-an-email"},
            {"student_id": "S3", "name": "NoAge", "email": "noage@x.com"},
            {"name": "Nameless"}
        ],
        "courses": [
            {"course_id": "C1", "course_name": "Algo", "instructor_id": "I1",
             "student_ids": ["S1"]},
            {"course_id": "C2", "course_name": "Other", "instructor_id": "I1"}
        ]
    }"#;

    let report = transfer::import_json(&db, json)?;
    assert_eq!(report.created, 3);
    assert_eq!(report.enrolled, 1);

    let mut skipped: Vec<(&str, &str)> = report
        .skipped
        .iter()
        .map(|s| (s.section, s.key.as_str()))
        .collect();
    skipped.sort();
    assert_eq!(
        skipped,
        vec![
            ("courses", "C2"),
            ("registrations", "S1/C404"),
            ("students", "#3"),
            ("students", "S2"),
            ("students", "S3"),
        ]
    );

    let course = db.courses().read("C1")?.unwrap();
    assert_eq!(course.instructor_id.as_deref(), Some("I1"));
    assert_eq!(course.student_ids, vec!["S1"]);
    assert!(db.courses().read("C2")?.is_none());
    Ok(())
}

#[test]
fn test_json_import_rejects_non_object() -> RecordsResult<()> {
    let db = SchoolDb::open_in_memory()?;
    assert!(matches!(
        transfer::import_json(&db, "[1, 2, 3]"),
        Err(RecordsError::Import(_))
    ));
    assert!(matches!(
        transfer::import_json(&db, r#"{"students": 7}"#),
        Err(RecordsError::Import(_))
    ));
    assert!(matches!(
        transfer::import_json(&db, "{ not json"),
        Err(RecordsError::Json(_))
    ));
    Ok(())
}

#[test]
fn test_csv_layout() -> RecordsResult<()> {
    let db = populated()?;
    let mut out = Vec::new();
    transfer::export(&db)?.write_csv(&mut out)?;
    let text = String::from_utf8(out).unwrap();

    let expected = "\
students
student_id,name,age,email
S1,Ann,20,ann@x.com
S2,Bob,22,bob@x.com

instructors
instructor_id,name,age,email
I1,Grace,45,grace@uni.edu

courses
course_id,course_name,instructor_id
C1,Algo,I1
C2,Databases,

registrations
student_id,course_id
S1,C1
S2,C1
S2,C2

";
    assert_eq!(text, expected);
    Ok(())
}

#[test]
fn test_csv_empty_sections_keep_blank_separators() -> RecordsResult<()> {
    let mut out = Vec::new();
    Snapshot::default().write_csv(&mut out)?;
    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("\"\""));
    assert_eq!(
        text,
        "students\nstudent_id,name,age,email\n\n\
         instructors\ninstructor_id,name,age,email\n\n\
         courses\ncourse_id,course_name,instructor_id\n\n\
         registrations\nstudent_id,course_id\n\n"
    );

    let db = SchoolDb::open_in_memory()?;
    let report = transfer::import_csv(&db, text.as_bytes())?;
    assert_eq!(report, school_records::ImportReport::default());
    Ok(())
}

#[test]
fn test_csv_round_trip() -> RecordsResult<()> {
    let source = populated()?;
    let mut out = Vec::new();
    transfer::export(&source)?.write_csv(&mut out)?;

    let target = SchoolDb::open_in_memory()?;
    let report = transfer::import_csv(&target, out.as_slice())?;
    assert!(report.skipped.is_empty());
    assert_eq!(report.enrolled, 3);
    assert_eq!(transfer::export(&target)?, transfer::export(&source)?);
    Ok(())
}

#[test]
fn test_csv_import_skips_bad_rows() -> RecordsResult<()> {
    let db = SchoolDb::open_in_memory()?;
    let csv = "\
stray,row
students
student_id,name,age,email
S1,Ann,20,ann@x.com
S2,Bob,old,bob@x.com

courses
course_id,course_name,instructor_id
C1,Algo,

registrations
student_id,course_id
S1,C1
S2,C1
";
    let report = transfer::import_csv(&db, csv.as_bytes())?;
    assert_eq!(report.created, 2);
    assert_eq!(report.enrolled, 1);
    let sections: Vec<&str> = report.skipped.iter().map(|s| s.section).collect();
    assert_eq!(sections, vec!["csv", "students", "registrations"]);
    assert_eq!(db.courses().read("C1")?.unwrap().student_ids, vec!["S1"]);
    Ok(())
}

#[test]
fn test_snapshot_registrations_merge_both_sides() {
    let snapshot: Snapshot = serde_json::from_str(
        r#"{
            "students": [{"student_id": "S1", "name": "Ann", "age": 20,
                          "email": "ann@x.com", "registered_course_ids": ["C1"]}],
            "courses": [{"course_id": "C1", "course_name": "Algo",
                         "student_ids": ["S1", "S2"]}]
        }"#,
    )
    .unwrap();
    assert_eq!(
        snapshot.registrations(),
        vec![
            ("S1".to_string(), "C1".to_string()),
            ("S2".to_string(), "C1".to_string()),
        ]
    );
}
