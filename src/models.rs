use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Course {
    #[serde(rename = "B.Tech")]
    BTech,
    #[serde(rename = "BCA")]
    Bca,
    #[serde(rename = "MCA")]
    Mca,
    #[serde(rename = "M.Tech")]
    MTech,
    #[serde(rename = "B.Sc")]
    BSc,
    #[serde(rename = "M.Sc")]
    MSc,
    #[serde(rename = "MBA")]
    Mba,
    #[serde(rename = "BBA")]
    Bba,
}

impl Course {
    pub const ALL: [Course; 8] = [
        Course::BTech,
        Course::Bca,
        Course::Mca,
        Course::MTech,
        Course::BSc,
        Course::MSc,
        Course::Mba,
        Course::Bba,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Course::BTech => "B.Tech",
            Course::Bca => "BCA",
            Course::Mca => "MCA",
            Course::MTech => "M.Tech",
            Course::BSc => "B.Sc",
            Course::MSc => "M.Sc",
            Course::Mba => "MBA",
            Course::Bba => "BBA",
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Course {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Course::ALL
            .into_iter()
            .find(|course| course.label().eq_ignore_ascii_case(value))
            .ok_or_else(|| RecordError::validation("course", format!("unknown course {value:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub roll_no: String,
    pub course: Course,
    pub semester: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub is_present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarksRecord {
    pub student_id: Uuid,
    pub subject: String,
    pub score: f64,
}

/// Text encoding of an attendance mark. Stored as `is_present`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn is_present(self) -> bool {
        matches!(self, AttendanceStatus::Present)
    }
}

impl From<bool> for AttendanceStatus {
    fn from(is_present: bool) -> Self {
        if is_present {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Present => f.write_str("Present"),
            AttendanceStatus::Absent => f.write_str("Absent"),
        }
    }
}

/// One attendance write as callers submit it, in either encoding:
/// `{student, date, is_present}` or `{student, date, status}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceInput {
    pub student: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_present: Option<bool>,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

impl AttendanceInput {
    pub fn presence(&self) -> Result<bool, RecordError> {
        match (self.is_present, self.status) {
            (Some(flag), None) => Ok(flag),
            (None, Some(status)) => Ok(status.is_present()),
            (Some(flag), Some(status)) if flag == status.is_present() => Ok(flag),
            (Some(_), Some(_)) => Err(RecordError::validation(
                "status",
                "is_present and status disagree",
            )),
            (None, None) => Err(RecordError::validation(
                "status",
                "either is_present or status is required",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceRemark {
    Excellent,
    Good,
    Average,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl PerformanceRemark {
    pub fn label(self) -> &'static str {
        match self {
            PerformanceRemark::Excellent => "Excellent",
            PerformanceRemark::Good => "Good",
            PerformanceRemark::Average => "Average",
            PerformanceRemark::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for PerformanceRemark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentMetrics {
    pub attendance_percentage: f64,
    pub average_marks: Option<f64>,
    pub performance_remark: Option<PerformanceRemark>,
    pub attendance_warning: Option<&'static str>,
}

/// A student together with their derived metrics, as list views show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    #[serde(flatten)]
    pub student: Student,
    #[serde(flatten)]
    pub metrics: StudentMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    #[serde(flatten)]
    pub summary: StudentSummary,
    pub attendance: Vec<AttendanceRecord>,
    pub marks: Vec<MarksRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub course: Option<Course>,
    pub semester: Option<i32>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        self.course.map_or(true, |course| student.course == course)
            && self.semester.map_or(true, |semester| student.semester == semester)
    }

    pub fn label(&self) -> String {
        match (self.course, self.semester) {
            (Some(course), Some(semester)) => format!("{course} semester {semester}"),
            (Some(course), None) => course.to_string(),
            (None, Some(semester)) => format!("semester {semester}"),
            (None, None) => "all students".to_string(),
        }
    }
}
