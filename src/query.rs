use uuid::Uuid;

use crate::error::RecordError;
use crate::metrics;
use crate::models::{Student, StudentFilter, StudentReport, StudentSummary};
use crate::store::RecordStore;

async fn summarize<S: RecordStore>(store: &S, student: Student) -> Result<StudentSummary, RecordError> {
    let attendance = store.list_attendance(student.id).await?;
    let marks = store.list_marks(student.id).await?;
    Ok(StudentSummary {
        metrics: metrics::compute(&attendance, &marks),
        student,
    })
}

/// Lists students matching `filter` with freshly computed metrics.
pub async fn list_with_metrics<S: RecordStore>(
    store: &S,
    filter: StudentFilter,
) -> Result<Vec<StudentSummary>, RecordError> {
    let students = store.list_students(filter).await?;
    let mut summaries = Vec::with_capacity(students.len());
    for student in students {
        summaries.push(summarize(store, student).await?);
    }
    Ok(summaries)
}

pub async fn get_report<S: RecordStore>(
    store: &S,
    student_id: Uuid,
) -> Result<StudentReport, RecordError> {
    let student = store.get_student(student_id).await?;
    let attendance = store.list_attendance(student.id).await?;
    let marks = store.list_marks(student.id).await?;

    Ok(StudentReport {
        summary: StudentSummary {
            metrics: metrics::compute(&attendance, &marks),
            student,
        },
        attendance,
        marks,
    })
}

pub fn count_low_attendance(summaries: &[StudentSummary]) -> usize {
    summaries
        .iter()
        .filter(|summary| metrics::is_low_attendance(summary.metrics.attendance_percentage))
        .count()
}

/// Case-insensitive substring match on name or roll number over an
/// already-fetched list. A blank term keeps everything.
pub fn search<'a>(summaries: &'a [StudentSummary], term: &str) -> Vec<&'a StudentSummary> {
    let needle = term.trim().to_lowercase();
    summaries
        .iter()
        .filter(|summary| {
            needle.is_empty()
                || summary.student.name.to_lowercase().contains(&needle)
                || summary.student.roll_no.to_lowercase().contains(&needle)
        })
        .collect()
}
