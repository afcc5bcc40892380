use std::future::Future;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::error::RecordError;
use crate::models::{AttendanceRecord, Course, MarksRecord, Student, StudentFilter};

pub const MIN_SEMESTER: i32 = 1;
pub const MAX_SEMESTER: i32 = 8;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub roll_no: String,
    pub course: Course,
    pub semester: i32,
}

impl NewStudent {
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::validation("name", "must not be empty"));
        }
        if self.roll_no.trim().is_empty() {
            return Err(RecordError::validation("roll_no", "must not be empty"));
        }
        if !(MIN_SEMESTER..=MAX_SEMESTER).contains(&self.semester) {
            return Err(RecordError::validation(
                "semester",
                format!(
                    "{} is outside {MIN_SEMESTER}-{MAX_SEMESTER}",
                    self.semester
                ),
            ));
        }
        Ok(())
    }
}

pub fn validate_marks(subject: &str, score: f64) -> Result<(), RecordError> {
    if subject.trim().is_empty() {
        return Err(RecordError::validation("subject", "must not be empty"));
    }
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(RecordError::validation(
            "score",
            format!("{score} is outside {MIN_SCORE}-{MAX_SCORE}"),
        ));
    }
    Ok(())
}

/// Students, attendance and marks, with uniqueness and referential checks.
///
/// Implementations are cheap to clone and share their state across clones,
/// so batch writes can be spawned as independent tasks.
pub trait RecordStore: Clone + Send + Sync + 'static {
    fn create_student(
        &self,
        student: NewStudent,
    ) -> impl Future<Output = Result<Student, RecordError>> + Send;

    fn get_student(&self, id: Uuid) -> impl Future<Output = Result<Student, RecordError>> + Send;

    fn find_by_roll_no(
        &self,
        roll_no: &str,
    ) -> impl Future<Output = Result<Student, RecordError>> + Send;

    /// Students matching `filter`, in the order they were created.
    fn list_students(
        &self,
        filter: StudentFilter,
    ) -> impl Future<Output = Result<Vec<Student>, RecordError>> + Send;

    fn student_count(&self) -> impl Future<Output = Result<usize, RecordError>> + Send;

    /// Writes the mark for `(student_id, date)`, replacing any earlier one.
    fn upsert_attendance(
        &self,
        student_id: Uuid,
        date: NaiveDate,
        is_present: bool,
    ) -> impl Future<Output = Result<AttendanceRecord, RecordError>> + Send;

    fn append_marks(
        &self,
        student_id: Uuid,
        subject: &str,
        score: f64,
    ) -> impl Future<Output = Result<MarksRecord, RecordError>> + Send;

    fn list_attendance(
        &self,
        student_id: Uuid,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, RecordError>> + Send;

    fn list_marks(
        &self,
        student_id: Uuid,
    ) -> impl Future<Output = Result<Vec<MarksRecord>, RecordError>> + Send;
}

/// Looks a student up by UUID, falling back to roll number. A UUID-shaped
/// key that names no student is still tried as a roll number.
pub async fn resolve_student<S: RecordStore>(store: &S, key: &str) -> Result<Student, RecordError> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        match store.get_student(id).await {
            Err(RecordError::NotFound { .. }) => {}
            found => return found,
        }
    }
    store.find_by_roll_no(key).await
}

/// Loads the fixed demo roster. Students already enrolled are left alone.
pub async fn seed<S: RecordStore>(store: &S, today: NaiveDate) -> Result<usize, RecordError> {
    let roster = [
        ("Aarav Patel", "1001", Course::BTech, 3, [true, true, true, true, true], [88.0, 92.0]),
        ("Ishita Sharma", "1002", Course::Bca, 1, [true, false, true, true, false], [74.0, 81.0]),
        ("Rohan Gupta", "1003", Course::BTech, 5, [true, true, false, true, true], [55.0, 62.0]),
        ("Sneha Singh", "1004", Course::Mca, 2, [false, true, false, true, false], [41.0, 47.0]),
    ];

    let mut created = 0usize;
    for (name, roll_no, course, semester, days, scores) in roster {
        let student = match store
            .create_student(NewStudent {
                name: name.to_string(),
                roll_no: roll_no.to_string(),
                course,
                semester,
            })
            .await
        {
            Ok(student) => student,
            Err(RecordError::DuplicateRollNumber { .. }) => continue,
            Err(err) => return Err(err),
        };

        for (offset, is_present) in days.into_iter().enumerate() {
            let date = today - Duration::days(offset as i64);
            store.upsert_attendance(student.id, date, is_present).await?;
        }
        for (subject, score) in ["Mathematics", "Computer Science"].into_iter().zip(scores) {
            store.append_marks(student.id, subject, score).await?;
        }
        created += 1;
    }

    Ok(created)
}
