use std::fmt::Write;

use crate::models::{StudentReport, StudentSummary};
use crate::query;

#[derive(Debug, Clone, PartialEq)]
pub struct RemarkSummary {
    pub remark: String,
    pub count: usize,
    pub avg_attendance: f64,
}

fn display_average(average: Option<f64>) -> String {
    average.map_or_else(|| "N/A".to_string(), |value| format!("{value:.2}"))
}

pub fn summarize_by_remark(summaries: &[StudentSummary]) -> Vec<RemarkSummary> {
    let mut map: std::collections::HashMap<String, (usize, f64)> =
        std::collections::HashMap::new();

    for summary in summaries {
        let remark = summary
            .metrics
            .performance_remark
            .map_or("No marks", |remark| remark.label());
        let entry = map.entry(remark.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += summary.metrics.attendance_percentage;
    }

    let mut remarks: Vec<RemarkSummary> = map
        .into_iter()
        .map(|(remark, (count, total_attendance))| RemarkSummary {
            remark,
            count,
            avg_attendance: if count == 0 {
                0.0
            } else {
                total_attendance / count as f64
            },
        })
        .collect();

    remarks.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.remark.cmp(&b.remark)));
    remarks
}

pub fn build_roster_report(scope: &str, summaries: &[StudentSummary]) -> String {
    let remarks = summarize_by_remark(summaries);
    let low_attendance = query::count_low_attendance(summaries);

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance & Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} students, {} with low attendance)",
        scope,
        summaries.len(),
        low_attendance
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance Mix");

    if remarks.is_empty() {
        let _ = writeln!(output, "No students match this scope.");
    } else {
        for remark in remarks.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg attendance {:.1}%)",
                remark.remark, remark.count, remark.avg_attendance
            );
        }
    }

    let mut at_risk: Vec<&StudentSummary> = summaries
        .iter()
        .filter(|summary| summary.metrics.attendance_warning.is_some())
        .collect();
    at_risk.sort_by(|a, b| {
        a.metrics
            .attendance_percentage
            .partial_cmp(&b.metrics.attendance_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance Shortage");

    if at_risk.is_empty() {
        let _ = writeln!(output, "Every student is at or above the attendance threshold.");
    } else {
        for summary in at_risk.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {} sem {}) attendance {:.2}%, average {}",
                summary.student.name,
                summary.student.roll_no,
                summary.student.course,
                summary.student.semester,
                summary.metrics.attendance_percentage,
                display_average(summary.metrics.average_marks)
            );
        }
    }

    output
}

pub fn build_student_report(report: &StudentReport) -> String {
    let student = &report.summary.student;
    let metrics = &report.summary.metrics;
    let mut output = String::new();

    let _ = writeln!(output, "# {} ({})", student.name, student.roll_no);
    let _ = writeln!(output, "{} semester {}", student.course, student.semester);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Attendance: {:.2}%", metrics.attendance_percentage);
    if let Some(warning) = metrics.attendance_warning {
        let _ = writeln!(output, "- Warning: {warning}");
    }
    let _ = writeln!(output, "- Average marks: {}", display_average(metrics.average_marks));
    let _ = writeln!(
        output,
        "- Remark: {}",
        metrics.performance_remark.map_or("N/A", |remark| remark.label())
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Marks");
    if report.marks.is_empty() {
        let _ = writeln!(output, "No marks recorded.");
    } else {
        for record in report.marks.iter() {
            let _ = writeln!(output, "- {}: {}", record.subject, record.score);
        }
    }

    let mut recent = report.attendance.clone();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Attendance");
    if recent.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        for record in recent.iter().take(10) {
            let status = if record.is_present { "Present" } else { "Absent" };
            let _ = writeln!(output, "- {}: {}", record.date, status);
        }
    }

    output
}

/// Writes the list view as CSV.
pub fn write_csv<W: std::io::Write>(writer: W, summaries: &[StudentSummary]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "ID",
        "Roll No",
        "Name",
        "Course",
        "Semester",
        "Avg Marks",
        "Attendance %",
    ])?;

    for summary in summaries {
        let student = &summary.student;
        csv.write_record([
            student.id.to_string(),
            student.roll_no.clone(),
            student.name.clone(),
            student.course.to_string(),
            student.semester.to_string(),
            display_average(summary.metrics.average_marks),
            format!("{:.2}", summary.metrics.attendance_percentage),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
