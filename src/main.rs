//! School records command-line front-end.
//!
//! Usage:
//!   school student add S1 "Ann" 20 ann@x.com
//!   school course add C1 "Algorithms" --instructor I1
//!   school enroll S1 C1
//!   school export --format csv school.csv

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use school_records::{
    transfer, AppConfig, CourseFields, CourseRecord, EnrollOutcome, AssignOutcome,
    InstructorRecord, ListQuery, PersonFields, Repository, SchoolDb, SortKey, StudentRecord,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Manage students, instructors, courses and their relationships
#[derive(Parser, Debug)]
#[command(name = "school")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides configuration and SCHOOL_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and its schema
    Init,

    /// Manage students
    Student {
        #[command(subcommand)]
        action: PersonAction,
    },

    /// Manage instructors
    Instructor {
        #[command(subcommand)]
        action: PersonAction,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },

    /// Enroll a student in a course
    Enroll { student_id: String, course_id: String },

    /// Remove a student from a course
    Unenroll { student_id: String, course_id: String },

    /// Assign an instructor to a course
    Assign { instructor_id: String, course_id: String },

    /// Clear a course's instructor
    Unassign { course_id: String },

    /// Export every record to a file
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
        path: PathBuf,
    },

    /// Import records from a file (existing ids are updated)
    Import {
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
        path: PathBuf,
    },

    /// Copy the database to another file
    Backup { dest: PathBuf },
}

#[derive(Subcommand, Debug)]
enum PersonAction {
    Add {
        id: String,
        name: String,
        age: String,
        email: String,
    },
    Update {
        id: String,
        name: String,
        age: String,
        email: String,
    },
    Delete {
        id: String,
    },
    Show {
        id: String,
    },
    List(ListArgs),
}

#[derive(Subcommand, Debug)]
enum CourseAction {
    Add {
        id: String,
        name: String,
        #[arg(long)]
        instructor: Option<String>,
    },
    /// Rename a course; `--instructor ""` clears the instructor
    Update {
        id: String,
        name: String,
        #[arg(long)]
        instructor: Option<String>,
    },
    Delete {
        id: String,
    },
    Show {
        id: String,
    },
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Case-insensitive text to match against id, name and email
    #[arg(long)]
    search: Option<String>,

    #[arg(long, value_enum, default_value = "id")]
    sort: SortArg,

    /// Reverse the order
    #[arg(long)]
    desc: bool,
}

impl ListArgs {
    fn query(&self) -> ListQuery {
        let mut query = ListQuery::new().order_by(match self.sort {
            SortArg::Id => SortKey::Id,
            SortArg::Name => SortKey::Name,
            SortArg::Email => SortKey::Email,
            SortArg::Instructor => SortKey::Instructor,
        });
        if let Some(text) = &self.search {
            query = query.search(text.as_str());
        }
        if self.desc {
            query = query.descending();
        }
        query
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Id,
    Name,
    Email,
    Instructor,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Csv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let db = SchoolDb::open(config.sqlite())
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    match cli.command {
        Command::Init => info!(path = %config.db_path.display(), "schema ready"),
        Command::Student { action } => person(&db.students(), action, student_line)?,
        Command::Instructor { action } => person(&db.instructors(), action, instructor_line)?,
        Command::Course { action } => course(&db, action)?,
        Command::Enroll {
            student_id,
            course_id,
        } => match db.enroll(&student_id, &course_id)? {
            EnrollOutcome::Enrolled => println!("{student_id} enrolled in {course_id}"),
            EnrollOutcome::AlreadyEnrolled => {
                println!("{student_id} is already enrolled in {course_id}")
            }
        },
        Command::Unenroll {
            student_id,
            course_id,
        } => {
            if db.unenroll(&student_id, &course_id)? {
                println!("{student_id} removed from {course_id}");
            } else {
                println!("{student_id} was not enrolled in {course_id}");
            }
        }
        Command::Assign {
            instructor_id,
            course_id,
        } => match db.assign_instructor(&instructor_id, &course_id)? {
            AssignOutcome::Assigned => println!("{instructor_id} now teaches {course_id}"),
            AssignOutcome::AlreadyAssigned => {
                println!("{instructor_id} already teaches {course_id}")
            }
        },
        Command::Unassign { course_id } => {
            if db.unassign_instructor(&course_id)? {
                println!("{course_id} has no instructor now");
            } else {
                println!("{course_id} had no instructor");
            }
        }
        Command::Export { format, path } => export(&db, format, &path)?,
        Command::Import { format, path } => import(&db, format, &path)?,
        Command::Backup { dest } => {
            let written = db.backup_to(&dest)?;
            println!("backup written to {}", written.display());
        }
    }
    Ok(())
}

fn student_line(s: &StudentRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\tcourses: {}",
        s.student_id,
        s.name,
        s.age,
        s.email,
        s.course_ids.join(", ")
    )
}

fn instructor_line(i: &InstructorRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\tcourse: {}",
        i.instructor_id,
        i.name,
        i.age,
        i.email,
        i.course_id.as_deref().unwrap_or("-")
    )
}

fn course_line(c: &CourseRecord) -> String {
    format!(
        "{}\t{}\tinstructor: {}\tstudents: {} [{}]",
        c.course_id,
        c.course_name,
        c.instructor_id.as_deref().unwrap_or("-"),
        c.student_ids.len(),
        c.student_ids.join(", ")
    )
}

fn person<R>(repo: &R, action: PersonAction, line: fn(&R::Record) -> String) -> Result<()>
where
    R: Repository<Fields = PersonFields>,
    R::Record: std::fmt::Display,
{
    match action {
        PersonAction::Add {
            id,
            name,
            age,
            email,
        } => {
            let id = repo.create(&PersonFields::new(id, name, age, email))?;
            println!("{} {id} created", R::KIND);
        }
        PersonAction::Update {
            id,
            name,
            age,
            email,
        } => {
            repo.update(&id, &PersonFields::new(id.as_str(), name, age, email))?;
            println!("{} {id} updated", R::KIND);
        }
        PersonAction::Delete { id } => {
            repo.delete(&id)?;
            println!("{} {id} deleted", R::KIND);
        }
        PersonAction::Show { id } => match repo.read(&id)? {
            Some(record) => {
                println!("{record}");
                println!("{}", line(&record));
            }
            None => anyhow::bail!("{} not found: {id}", R::KIND),
        },
        PersonAction::List(args) => {
            for record in repo.list(args.query()).iter()? {
                println!("{}", line(&record));
            }
        }
    }
    Ok(())
}

fn course(db: &SchoolDb, action: CourseAction) -> Result<()> {
    let courses = db.courses();
    match action {
        CourseAction::Add {
            id,
            name,
            instructor,
        } => {
            let fields = CourseFields {
                id,
                name,
                instructor_id: instructor,
            };
            let id = courses.create(&fields)?;
            println!("course {id} created");
        }
        CourseAction::Update {
            id,
            name,
            instructor,
        } => {
            let current = courses
                .read(&id)?
                .with_context(|| format!("course not found: {id}"))?;
            let fields = CourseFields {
                id: id.clone(),
                name,
                instructor_id: instructor.or(current.instructor_id),
            };
            courses.update(&id, &fields)?;
            println!("course {id} updated");
        }
        CourseAction::Delete { id } => {
            courses.delete(&id)?;
            println!("course {id} deleted");
        }
        CourseAction::Show { id } => match courses.read(&id)? {
            Some(record) => println!("{}", course_line(&record)),
            None => anyhow::bail!("course not found: {id}"),
        },
        CourseAction::List(args) => {
            for record in courses.list(args.query()).iter()? {
                println!("{}", course_line(&record));
            }
        }
    }
    Ok(())
}

fn export(db: &SchoolDb, format: Format, path: &Path) -> Result<()> {
    let snapshot = transfer::export(db)?;
    match format {
        Format::Json => snapshot.write_json(path)?,
        Format::Csv => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            snapshot.write_csv(BufWriter::new(file))?;
        }
    }
    println!("exported to {}", path.display());
    Ok(())
}

fn import(db: &SchoolDb, format: Format, path: &Path) -> Result<()> {
    let report = match format {
        Format::Json => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            transfer::import_json(db, &text)?
        }
        Format::Csv => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            transfer::import_csv(db, BufReader::new(file))?
        }
    };
    println!(
        "imported: {} created, {} updated, {} enrollments, {} skipped",
        report.created,
        report.updated,
        report.enrolled,
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {} {}: {}", skipped.section, skipped.key, skipped.reason);
    }
    Ok(())
}
