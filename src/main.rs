use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod batch;
mod config;
mod db;
mod error;
mod memory;
mod metrics;
mod models;
mod query;
mod report;
mod store;
mod telemetry;

use crate::batch::{AttendanceSheet, BatchOutcome};
use crate::config::{Backend, Config};
use crate::models::{AttendanceInput, AttendanceStatus, Course, StudentFilter};
use crate::store::{NewStudent, RecordStore};

#[derive(Parser)]
#[command(name = "smart-attendance")]
#[command(about = "Student attendance and marks tracker with low-attendance warnings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the demo roster
    Seed,
    /// Enrol a student
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll_no: String,
        #[arg(long)]
        course: Course,
        #[arg(long)]
        semester: i32,
    },
    /// Record a score for a student (by roll number or id)
    AddMarks {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        score: f64,
    },
    /// List students with their attendance and marks
    List {
        #[arg(long)]
        course: Option<Course>,
        #[arg(long)]
        semester: Option<i32>,
        /// Case-insensitive match on name or roll number
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print or write one student's report
    Report {
        #[arg(long)]
        student: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report for a course/semester
    RosterReport {
        #[arg(long)]
        course: Option<Course>,
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Mark one day's attendance for a roster; everyone starts present
    MarkAttendance {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        course: Option<Course>,
        #[arg(long)]
        semester: Option<i32>,
        /// Start from everyone absent instead
        #[arg(long)]
        all_absent: bool,
        /// Roll numbers to mark absent
        #[arg(long, value_delimiter = ',')]
        absent: Vec<String>,
        /// Roll numbers to mark present
        #[arg(long, value_delimiter = ',')]
        present: Vec<String>,
        /// Roll numbers whose mark is flipped last
        #[arg(long, value_delimiter = ',')]
        toggle: Vec<String>,
    },
    /// Import attendance writes from JSON or CSV
    #[command(group(
        ArgGroup::new("source")
            .args(["json", "csv"])
            .required(true)
            .multiple(false)
    ))]
    Import {
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Export the student list as CSV
    Export {
        #[arg(long)]
        course: Option<Course>,
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_filter);

    match config.backend {
        Backend::Postgres {
            url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(&url)
                .await
                .context("failed to connect to Postgres")?;

            if matches!(cli.command, Commands::InitDb) {
                db::init_db(&pool).await?;
                println!("Schema ready.");
                return Ok(());
            }
            run(db::PgStore::new(pool), cli.command).await
        }
        Backend::Snapshot { path } => {
            let store = memory::MemoryStore::open(&path)
                .with_context(|| format!("failed to open snapshot {}", path.display()))?;

            if matches!(cli.command, Commands::InitDb) {
                store.flush()?;
                println!("Snapshot ready at {}.", path.display());
                return Ok(());
            }
            run(store, cli.command).await
        }
    }
}

async fn run<S: RecordStore>(store: S, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {}
        Commands::Seed => {
            let created = store::seed(&store, Utc::now().date_naive()).await?;
            println!("Seeded {created} students.");
        }
        Commands::AddStudent {
            name,
            roll_no,
            course,
            semester,
        } => {
            let student = store
                .create_student(NewStudent {
                    name,
                    roll_no,
                    course,
                    semester,
                })
                .await?;
            println!(
                "Enrolled {} ({}) in {} semester {} as {}.",
                student.name, student.roll_no, student.course, student.semester, student.id
            );
        }
        Commands::AddMarks {
            student,
            subject,
            score,
        } => {
            let student = store::resolve_student(&store, &student).await?;
            store.append_marks(student.id, &subject, score).await?;
            println!("Recorded {subject}: {score} for {}.", student.name);
        }
        Commands::List {
            course,
            semester,
            search,
            json,
        } => {
            let rows = query::list_with_metrics(&store, StudentFilter { course, semester }).await?;
            let low_attendance = query::count_low_attendance(&rows);
            let shown = query::search(&rows, search.as_deref().unwrap_or(""));

            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }
            if shown.is_empty() {
                println!("No students match your criteria.");
                return Ok(());
            }

            println!(
                "{} students, {} with low attendance:",
                rows.len(),
                low_attendance
            );
            for row in shown {
                println!(
                    "- {} ({}, {} sem {}) attendance {:.2}%, average {}, {}{}",
                    row.student.name,
                    row.student.roll_no,
                    row.student.course,
                    row.student.semester,
                    row.metrics.attendance_percentage,
                    row.metrics
                        .average_marks
                        .map_or_else(|| "N/A".to_string(), |avg| format!("{avg:.2}")),
                    row.metrics
                        .performance_remark
                        .map_or("no marks", |remark| remark.label()),
                    row.metrics
                        .attendance_warning
                        .map(|warning| format!(" [{warning}]"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Report { student, out } => {
            let student = store::resolve_student(&store, &student).await?;
            let report = query::get_report(&store, student.id).await?;
            let text = report::build_student_report(&report);
            match out {
                Some(out) => {
                    std::fs::write(&out, text)?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::RosterReport {
            course,
            semester,
            out,
        } => {
            let filter = StudentFilter { course, semester };
            let rows = query::list_with_metrics(&store, filter).await?;
            let report = report::build_roster_report(&filter.label(), &rows);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::MarkAttendance {
            date,
            course,
            semester,
            all_absent,
            absent,
            present,
            toggle,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let roster = store.list_students(StudentFilter { course, semester }).await?;
            let mut sheet = AttendanceSheet::for_roster(date, &roster);
            if all_absent {
                sheet.mark_all(AttendanceStatus::Absent);
            }
            for (rolls, is_present) in [(&absent, false), (&present, true)] {
                for roll_no in rolls {
                    let student = roster
                        .iter()
                        .find(|student| &student.roll_no == roll_no)
                        .with_context(|| format!("roll number {roll_no} is not on this roster"))?;
                    sheet.set(student.id, is_present);
                }
            }
            for roll_no in &toggle {
                let toggled = roster
                    .iter()
                    .find(|student| &student.roll_no == roll_no)
                    .is_some_and(|student| sheet.toggle(student.id));
                anyhow::ensure!(toggled, "roll number {roll_no} is not on this roster");
            }

            if sheet.is_empty() {
                println!("No students match your criteria.");
                return Ok(());
            }
            tracing::info!(%date, students = sheet.len(), "submitting attendance sheet");
            let outcome = batch::submit(&store, &sheet).await;
            print_outcome(&outcome);
            let retry = outcome.retry_sheet();
            if !retry.is_empty() {
                let rolls: Vec<&str> = retry.entries().iter().map(|e| e.label.as_str()).collect();
                println!("Retry needed for: {}", rolls.join(","));
            }
            ensure_complete(&[outcome])?;
        }
        Commands::Import { json, csv } => {
            let inputs = match (json, csv) {
                (Some(path), _) => read_json_inputs(&path)?,
                (None, Some(path)) => read_csv_inputs(&path)?,
                (None, None) => anyhow::bail!("either --json or --csv is required"),
            };

            let (sheets, rejected) = batch::sheets_from_inputs(&store, &inputs).await;
            for (index, err) in &rejected {
                println!("row {}: skipped ({err})", index + 1);
            }

            let mut outcomes = Vec::with_capacity(sheets.len());
            for sheet in &sheets {
                let outcome = batch::submit(&store, sheet).await;
                print_outcome(&outcome);
                outcomes.push(outcome);
            }
            anyhow::ensure!(rejected.is_empty(), "{} rows were skipped", rejected.len());
            ensure_complete(&outcomes)?;
        }
        Commands::Export {
            course,
            semester,
            out,
        } => {
            let rows = query::list_with_metrics(&store, StudentFilter { course, semester }).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_csv(file, &rows)?;
            println!("Exported {} students to {}.", rows.len(), out.display());
        }
    }

    Ok(())
}

fn read_json_inputs(path: &Path) -> anyhow::Result<Vec<AttendanceInput>> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("invalid attendance JSON in {}", path.display()))
}

fn read_csv_inputs(path: &Path) -> anyhow::Result<Vec<AttendanceInput>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut inputs = Vec::new();
    for result in reader.deserialize::<AttendanceInput>() {
        inputs.push(result?);
    }
    Ok(inputs)
}

fn print_outcome(outcome: &BatchOutcome) {
    println!(
        "{}: {} of {} marks saved.",
        outcome.date,
        outcome.succeeded(),
        outcome.results.len()
    );
    for result in &outcome.results {
        match &result.result {
            Ok(record) => println!(
                "- {}: {}",
                result.entry.label,
                AttendanceStatus::from(record.is_present)
            ),
            Err(err) => println!(
                "- {}: {} not saved ({err})",
                result.entry.label,
                result.entry.status()
            ),
        }
    }
}

fn ensure_complete(outcomes: &[BatchOutcome]) -> anyhow::Result<()> {
    let failed: usize = outcomes.iter().map(|outcome| outcome.failures().count()).sum();
    anyhow::ensure!(failed == 0, "{failed} attendance writes failed");
    Ok(())
}
