use uuid::Uuid;

/// Failures reported by the record store and the operations built on it.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("roll number {roll_no} is already enrolled")]
    DuplicateRollNumber { roll_no: String },

    #[error("student {key} not found")]
    NotFound { key: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("write task for student {student_id} did not complete: {reason}")]
    TaskAborted { student_id: Uuid, reason: String },
}

impl RecordError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        RecordError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(key: impl ToString) -> Self {
        RecordError::NotFound {
            key: key.to_string(),
        }
    }
}

impl From<std::io::Error> for RecordError {
    fn from(err: std::io::Error) -> Self {
        RecordError::Snapshot(err.to_string())
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::Snapshot(err.to_string())
    }
}
