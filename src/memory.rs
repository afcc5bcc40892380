use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecordError;
use crate::models::{AttendanceRecord, MarksRecord, Student, StudentFilter};
use crate::store::{validate_marks, NewStudent, RecordStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    students: Vec<Student>,
    attendance: Vec<AttendanceRecord>,
    marks: Vec<MarksRecord>,
}

impl Snapshot {
    fn contains(&self, student_id: Uuid) -> bool {
        self.students.iter().any(|student| student.id == student_id)
    }
}

/// In-process record store, optionally mirrored to a JSON file after every
/// write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Snapshot>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Opens the snapshot at `path`, starting empty when the file does not
    /// exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if path.exists() {
            let raw = std::fs::read(&path)?;
            serde_json::from_slice(&raw)?
        } else {
            Snapshot::default()
        };
        tracing::debug!(path = %path.display(), "opened snapshot");

        Ok(Self {
            state: Arc::new(Mutex::new(snapshot)),
            path: Some(path),
        })
    }

    /// Writes the current state out even if nothing changed.
    pub fn flush(&self) -> Result<(), RecordError> {
        let state = self.lock()?;
        self.persist(&state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, RecordError> {
        self.state
            .lock()
            .map_err(|_| RecordError::Snapshot("store lock poisoned".to_string()))
    }

    /// Writes `next` out first and only then swaps it in, so a failed write
    /// leaves the store as it was.
    fn commit(&self, state: &mut Snapshot, next: Snapshot) -> Result<(), RecordError> {
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), RecordError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    async fn create_student(&self, new: NewStudent) -> Result<Student, RecordError> {
        new.validate()?;
        let mut state = self.lock()?;
        if state.students.iter().any(|s| s.roll_no == new.roll_no) {
            return Err(RecordError::DuplicateRollNumber {
                roll_no: new.roll_no,
            });
        }

        let student = Student {
            id: Uuid::new_v4(),
            name: new.name,
            roll_no: new.roll_no,
            course: new.course,
            semester: new.semester,
        };
        let mut next = state.clone();
        next.students.push(student.clone());
        self.commit(&mut state, next)?;
        tracing::debug!(student_id = %student.id, roll_no = %student.roll_no, "enrolled student");
        Ok(student)
    }

    async fn get_student(&self, id: Uuid) -> Result<Student, RecordError> {
        let state = self.lock()?;
        state
            .students
            .iter()
            .find(|student| student.id == id)
            .cloned()
            .ok_or_else(|| RecordError::not_found(id))
    }

    async fn find_by_roll_no(&self, roll_no: &str) -> Result<Student, RecordError> {
        let state = self.lock()?;
        state
            .students
            .iter()
            .find(|student| student.roll_no == roll_no)
            .cloned()
            .ok_or_else(|| RecordError::not_found(format!("with roll number {roll_no}")))
    }

    async fn list_students(&self, filter: StudentFilter) -> Result<Vec<Student>, RecordError> {
        let state = self.lock()?;
        Ok(state
            .students
            .iter()
            .filter(|student| filter.matches(student))
            .cloned()
            .collect())
    }

    async fn student_count(&self) -> Result<usize, RecordError> {
        Ok(self.lock()?.students.len())
    }

    async fn upsert_attendance(
        &self,
        student_id: Uuid,
        date: NaiveDate,
        is_present: bool,
    ) -> Result<AttendanceRecord, RecordError> {
        let mut state = self.lock()?;
        if !state.contains(student_id) {
            return Err(RecordError::not_found(student_id));
        }

        let record = AttendanceRecord {
            student_id,
            date,
            is_present,
        };
        let mut next = state.clone();
        let existing = next
            .attendance
            .iter()
            .position(|existing| existing.student_id == student_id && existing.date == date);
        match existing {
            Some(index) => next.attendance[index].is_present = is_present,
            None => next.attendance.push(record.clone()),
        }
        self.commit(&mut state, next)?;
        tracing::debug!(%student_id, %date, is_present, "recorded attendance");
        Ok(record)
    }

    async fn append_marks(
        &self,
        student_id: Uuid,
        subject: &str,
        score: f64,
    ) -> Result<MarksRecord, RecordError> {
        let mut state = self.lock()?;
        if !state.contains(student_id) {
            return Err(RecordError::not_found(student_id));
        }
        validate_marks(subject, score)?;

        let record = MarksRecord {
            student_id,
            subject: subject.to_string(),
            score,
        };
        let mut next = state.clone();
        next.marks.push(record.clone());
        self.commit(&mut state, next)?;
        tracing::debug!(%student_id, subject, score, "recorded marks");
        Ok(record)
    }

    async fn list_attendance(&self, student_id: Uuid) -> Result<Vec<AttendanceRecord>, RecordError> {
        let state = self.lock()?;
        Ok(state
            .attendance
            .iter()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_marks(&self, student_id: Uuid) -> Result<Vec<MarksRecord>, RecordError> {
        let state = self.lock()?;
        Ok(state
            .marks
            .iter()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;

    fn enrol(name: &str, roll_no: &str, course: Course, semester: i32) -> NewStudent {
        NewStudent {
            name: name.to_string(),
            roll_no: roll_no.to_string(),
            course,
            semester,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[tokio::test]
    async fn duplicate_roll_number_leaves_count_unchanged() {
        let store = MemoryStore::default();
        store
            .create_student(enrol("Aarav Patel", "1001", Course::BTech, 3))
            .await
            .unwrap();

        let err = store
            .create_student(enrol("Someone Else", "1001", Course::Bca, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::DuplicateRollNumber { roll_no } if roll_no == "1001"));
        assert_eq!(store.student_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn roll_number_match_is_case_sensitive() {
        let store = MemoryStore::default();
        store
            .create_student(enrol("Aarav Patel", "cs-01", Course::BTech, 3))
            .await
            .unwrap();
        store
            .create_student(enrol("Ishita Sharma", "CS-01", Course::BTech, 3))
            .await
            .unwrap();
        assert_eq!(store.student_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let store = MemoryStore::default();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.get_student(missing).await,
            Err(RecordError::NotFound { .. })
        ));
        assert!(matches!(
            store.upsert_attendance(missing, date(2), true).await,
            Err(RecordError::NotFound { .. })
        ));
        assert!(matches!(
            store.append_marks(missing, "Physics", 50.0).await,
            Err(RecordError::NotFound { .. })
        ));
        assert!(matches!(
            store.find_by_roll_no("9999").await,
            Err(RecordError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn reupsert_overwrites_in_place() {
        let store = MemoryStore::default();
        let student = store
            .create_student(enrol("Aarav Patel", "1001", Course::BTech, 3))
            .await
            .unwrap();

        store.upsert_attendance(student.id, date(2), true).await.unwrap();
        store.upsert_attendance(student.id, date(3), true).await.unwrap();
        store.upsert_attendance(student.id, date(2), false).await.unwrap();

        let records = store.list_attendance(student.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, date(2));
        assert!(!records[0].is_present);
        assert!(records[1].is_present);
    }

    #[tokio::test]
    async fn marks_are_append_only_and_range_checked() {
        let store = MemoryStore::default();
        let student = store
            .create_student(enrol("Aarav Patel", "1001", Course::BTech, 3))
            .await
            .unwrap();

        store.append_marks(student.id, "Physics", 0.0).await.unwrap();
        store.append_marks(student.id, "Physics", 100.0).await.unwrap();
        for score in [101.0, -1.0] {
            assert!(matches!(
                store.append_marks(student.id, "Physics", score).await,
                Err(RecordError::Validation { field: "score", .. })
            ));
        }

        let marks = store.list_marks(student.id).await.unwrap();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].score, 0.0);
        assert_eq!(marks[1].score, 100.0);
    }

    #[tokio::test]
    async fn filters_combine_and_keep_creation_order() {
        let store = MemoryStore::default();
        let roster = [
            ("Rohan Gupta", "1003", Course::BTech, 3),
            ("Ishita Sharma", "1002", Course::Bca, 3),
            ("Aarav Patel", "1001", Course::BTech, 3),
            ("Sneha Singh", "1004", Course::BTech, 5),
        ];
        for (name, roll_no, course, semester) in roster {
            store
                .create_student(enrol(name, roll_no, course, semester))
                .await
                .unwrap();
        }

        let filtered = store
            .list_students(StudentFilter {
                course: Some(Course::BTech),
                semester: Some(3),
            })
            .await
            .unwrap();
        let rolls: Vec<&str> = filtered.iter().map(|s| s.roll_no.as_str()).collect();
        assert_eq!(rolls, vec!["1003", "1001"]);

        let by_semester = store
            .list_students(StudentFilter {
                course: None,
                semester: Some(3),
            })
            .await
            .unwrap();
        assert_eq!(by_semester.len(), 3);

        let all = store.list_students(StudentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");

        let store = MemoryStore::open(&path).unwrap();
        let student = store
            .create_student(enrol("Aarav Patel", "1001", Course::BTech, 3))
            .await
            .unwrap();
        store.upsert_attendance(student.id, date(2), true).await.unwrap();
        store.append_marks(student.id, "Physics", 77.5).await.unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.get_student(student.id).await.unwrap(), student);
        assert_eq!(reopened.list_attendance(student.id).await.unwrap().len(), 1);
        assert_eq!(reopened.list_marks(student.id).await.unwrap()[0].score, 77.5);
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        let store = MemoryStore::open(&path).unwrap();
        let student = store
            .create_student(enrol("Aarav Patel", "1001", Course::BTech, 3))
            .await
            .unwrap();
        store.upsert_attendance(student.id, date(2), true).await.unwrap();

        let dir_path = dir.path().to_path_buf();
        drop(dir);
        assert!(!dir_path.exists());

        assert!(matches!(
            store
                .create_student(enrol("Ishita Sharma", "1002", Course::BTech, 3))
                .await,
            Err(RecordError::Snapshot(_))
        ));
        assert_eq!(store.student_count().await.unwrap(), 1);

        assert!(matches!(
            store.upsert_attendance(student.id, date(2), false).await,
            Err(RecordError::Snapshot(_))
        ));
        assert!(matches!(
            store.upsert_attendance(student.id, date(3), true).await,
            Err(RecordError::Snapshot(_))
        ));
        let records = store.list_attendance(student.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_present);

        assert!(matches!(
            store.append_marks(student.id, "Physics", 60.0).await,
            Err(RecordError::Snapshot(_))
        ));
        assert!(store.list_marks(student.id).await.unwrap().is_empty());

        std::fs::create_dir_all(&dir_path).unwrap();
        let retried = store
            .create_student(enrol("Ishita Sharma", "1002", Course::BTech, 3))
            .await
            .unwrap();
        assert_eq!(retried.roll_no, "1002");
        assert_eq!(store.student_count().await.unwrap(), 2);

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.student_count().await.unwrap(), 2);
        assert_eq!(reopened.list_attendance(student.id).await.unwrap().len(), 1);
        std::fs::remove_dir_all(&dir_path).unwrap();
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let store = MemoryStore::default();
        let today = date(10);
        assert_eq!(crate::store::seed(&store, today).await.unwrap(), 4);
        assert_eq!(crate::store::seed(&store, today).await.unwrap(), 0);
        assert_eq!(store.student_count().await.unwrap(), 4);

        let student = store.find_by_roll_no("1001").await.unwrap();
        assert_eq!(store.list_attendance(student.id).await.unwrap().len(), 5);
        assert_eq!(store.list_marks(student.id).await.unwrap().len(), 2);
    }
}
