use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::RecordError;
use crate::models::{AttendanceRecord, MarksRecord, Student, StudentFilter};
use crate::store::{validate_marks, NewStudent, RecordStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Record store backed by the `smart_attendance` Postgres schema.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn student_from_row(row: &PgRow) -> Result<Student, RecordError> {
    let course: String = row.try_get("course")?;
    Ok(Student {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        roll_no: row.try_get("roll_no")?,
        course: course.parse()?,
        semester: row.try_get("semester")?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceRecord, RecordError> {
    Ok(AttendanceRecord {
        student_id: row.try_get("student_id")?,
        date: row.try_get("date")?,
        is_present: row.try_get("is_present")?,
    })
}

fn marks_from_row(row: &PgRow) -> Result<MarksRecord, RecordError> {
    Ok(MarksRecord {
        student_id: row.try_get("student_id")?,
        subject: row.try_get("subject")?,
        score: row.try_get("score")?,
    })
}

impl RecordStore for PgStore {
    async fn create_student(&self, new: NewStudent) -> Result<Student, RecordError> {
        new.validate()?;
        let result = sqlx::query(
            r#"
            INSERT INTO smart_attendance.students (id, name, roll_no, course, semester)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, roll_no, course, semester
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.roll_no)
        .bind(new.course.label())
        .bind(new.semester)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let student = student_from_row(&row)?;
                tracing::debug!(student_id = %student.id, roll_no = %student.roll_no, "enrolled student");
                Ok(student)
            }
            Err(err) if is_unique_violation(&err) => Err(RecordError::DuplicateRollNumber {
                roll_no: new.roll_no,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_student(&self, id: Uuid) -> Result<Student, RecordError> {
        let row = sqlx::query(
            "SELECT id, name, roll_no, course, semester FROM smart_attendance.students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RecordError::not_found(id))?;
        student_from_row(&row)
    }

    async fn find_by_roll_no(&self, roll_no: &str) -> Result<Student, RecordError> {
        let row = sqlx::query(
            "SELECT id, name, roll_no, course, semester FROM smart_attendance.students WHERE roll_no = $1",
        )
        .bind(roll_no)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RecordError::not_found(format!("with roll number {roll_no}")))?;
        student_from_row(&row)
    }

    async fn list_students(&self, filter: StudentFilter) -> Result<Vec<Student>, RecordError> {
        let mut query = String::from(
            "SELECT id, name, roll_no, course, semester FROM smart_attendance.students",
        );
        let mut clauses: Vec<String> = Vec::new();

        if filter.course.is_some() {
            clauses.push(format!("course = ${}", clauses.len() + 1));
        }
        if filter.semester.is_some() {
            clauses.push(format!("semester = ${}", clauses.len() + 1));
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY seq");

        let mut rows = sqlx::query(&query);
        if let Some(course) = filter.course {
            rows = rows.bind(course.label());
        }
        if let Some(semester) = filter.semester {
            rows = rows.bind(semester);
        }

        rows.fetch_all(&self.pool)
            .await?
            .iter()
            .map(student_from_row)
            .collect()
    }

    async fn student_count(&self) -> Result<usize, RecordError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM smart_attendance.students")
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(count.max(0) as usize)
    }

    async fn upsert_attendance(
        &self,
        student_id: Uuid,
        date: NaiveDate,
        is_present: bool,
    ) -> Result<AttendanceRecord, RecordError> {
        let result = sqlx::query(
            r#"
            INSERT INTO smart_attendance.attendance (student_id, date, is_present)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id, date) DO UPDATE
            SET is_present = EXCLUDED.is_present
            RETURNING student_id, date, is_present
            "#,
        )
        .bind(student_id)
        .bind(date)
        .bind(is_present)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                tracing::debug!(%student_id, %date, is_present, "recorded attendance");
                attendance_from_row(&row)
            }
            Err(err) if is_foreign_key_violation(&err) => Err(RecordError::not_found(student_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn append_marks(
        &self,
        student_id: Uuid,
        subject: &str,
        score: f64,
    ) -> Result<MarksRecord, RecordError> {
        validate_marks(subject, score)?;
        let result = sqlx::query(
            r#"
            INSERT INTO smart_attendance.marks (student_id, subject, score)
            VALUES ($1, $2, $3)
            RETURNING student_id, subject, score
            "#,
        )
        .bind(student_id)
        .bind(subject)
        .bind(score)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                tracing::debug!(%student_id, subject, score, "recorded marks");
                marks_from_row(&row)
            }
            Err(err) if is_foreign_key_violation(&err) => Err(RecordError::not_found(student_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_attendance(&self, student_id: Uuid) -> Result<Vec<AttendanceRecord>, RecordError> {
        sqlx::query(
            r#"
            SELECT student_id, date, is_present
            FROM smart_attendance.attendance
            WHERE student_id = $1
            ORDER BY seq
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(attendance_from_row)
        .collect()
    }

    async fn list_marks(&self, student_id: Uuid) -> Result<Vec<MarksRecord>, RecordError> {
        sqlx::query(
            r#"
            SELECT student_id, subject, score
            FROM smart_attendance.marks
            WHERE student_id = $1
            ORDER BY seq
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(marks_from_row)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;
    use sqlx::postgres::PgPoolOptions;

    /// Connects to `DATABASE_URL` and migrates, or returns `None` when no
    /// database is configured so the test is skipped.
    async fn store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        Some(PgStore::new(pool))
    }

    fn enrol(roll_no: &str) -> NewStudent {
        NewStudent {
            name: "Aarav Patel".to_string(),
            roll_no: roll_no.to_string(),
            course: Course::BTech,
            semester: 3,
        }
    }

    fn unique_roll() -> String {
        format!("pg-{}", Uuid::new_v4())
    }

    #[tokio::test]
    async fn unique_violation_maps_to_duplicate_roll_number() {
        let Some(store) = store().await else {
            return;
        };
        let roll_no = unique_roll();
        let first = store.create_student(enrol(&roll_no)).await.unwrap();
        let before = store.student_count().await.unwrap();

        let err = store.create_student(enrol(&roll_no)).await.unwrap_err();
        assert!(matches!(err, RecordError::DuplicateRollNumber { roll_no: r } if r == roll_no));
        assert_eq!(store.student_count().await.unwrap(), before);
        assert_eq!(store.find_by_roll_no(&roll_no).await.unwrap(), first);
    }

    #[tokio::test]
    async fn foreign_key_violation_maps_to_not_found() {
        let Some(store) = store().await else {
            return;
        };
        let missing = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();

        assert!(matches!(
            store.upsert_attendance(missing, date, true).await,
            Err(RecordError::NotFound { .. })
        ));
        assert!(matches!(
            store.append_marks(missing, "Physics", 50.0).await,
            Err(RecordError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_student(missing).await,
            Err(RecordError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_overwrites_and_filters_keep_creation_order() {
        let Some(store) = store().await else {
            return;
        };
        let student = store.create_student(enrol(&unique_roll())).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();

        store.upsert_attendance(student.id, date, true).await.unwrap();
        store.upsert_attendance(student.id, date, false).await.unwrap();
        let records = store.list_attendance(student.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_present);

        assert!(matches!(
            store.append_marks(student.id, "Physics", 101.0).await,
            Err(RecordError::Validation { field: "score", .. })
        ));
        store.append_marks(student.id, "Physics", 100.0).await.unwrap();
        assert_eq!(store.list_marks(student.id).await.unwrap().len(), 1);

        let later = store.create_student(enrol(&unique_roll())).await.unwrap();
        let listed = store
            .list_students(StudentFilter {
                course: Some(Course::BTech),
                semester: Some(3),
            })
            .await
            .unwrap();
        let first = listed.iter().position(|s| s.id == student.id).unwrap();
        let second = listed.iter().position(|s| s.id == later.id).unwrap();
        assert!(first < second);
        assert!(listed.iter().all(|s| s.course == Course::BTech && s.semester == 3));
    }
}
