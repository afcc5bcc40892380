use crate::models::{AttendanceRecord, MarksRecord, PerformanceRemark, StudentMetrics};

/// Attendance strictly below this percentage counts as a shortage.
pub const LOW_ATTENDANCE_THRESHOLD: f64 = 75.0;

pub const EXCELLENT_MIN: f64 = 85.0;
pub const GOOD_MIN: f64 = 70.0;
pub const AVERAGE_MIN: f64 = 50.0;

/// Must quote `LOW_ATTENDANCE_THRESHOLD`.
pub const ATTENDANCE_SHORTAGE: &str = "Attendance Shortage (< 75%)";

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Present share of all records as a percentage, rounded to two decimals.
/// A student with no records sits at 0.
pub fn attendance_percentage(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }

    let present = records.iter().filter(|record| record.is_present).count();
    round2(present as f64 / records.len() as f64 * 100.0)
}

/// Mean score rounded to two decimals, or `None` when nothing was recorded.
pub fn average_marks(records: &[MarksRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }

    let total: f64 = records.iter().map(|record| record.score).sum();
    Some(round2(total / records.len() as f64))
}

pub fn performance_remark(average: Option<f64>) -> Option<PerformanceRemark> {
    let average = average?;
    let remark = if average >= EXCELLENT_MIN {
        PerformanceRemark::Excellent
    } else if average >= GOOD_MIN {
        PerformanceRemark::Good
    } else if average >= AVERAGE_MIN {
        PerformanceRemark::Average
    } else {
        PerformanceRemark::NeedsImprovement
    };
    Some(remark)
}

pub fn is_low_attendance(percentage: f64) -> bool {
    percentage < LOW_ATTENDANCE_THRESHOLD
}

pub fn attendance_warning(percentage: f64) -> Option<&'static str> {
    is_low_attendance(percentage).then_some(ATTENDANCE_SHORTAGE)
}

pub fn compute(attendance: &[AttendanceRecord], marks: &[MarksRecord]) -> StudentMetrics {
    let attendance_percentage = attendance_percentage(attendance);
    let average_marks = average_marks(marks);

    StudentMetrics {
        attendance_percentage,
        average_marks,
        performance_remark: performance_remark(average_marks),
        attendance_warning: attendance_warning(attendance_percentage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap() + Duration::days(offset)
    }

    fn attendance(pattern: &[bool]) -> Vec<AttendanceRecord> {
        let student_id = Uuid::new_v4();
        pattern
            .iter()
            .enumerate()
            .map(|(offset, &is_present)| AttendanceRecord {
                student_id,
                date: day(offset as i64),
                is_present,
            })
            .collect()
    }

    fn marks(scores: &[f64]) -> Vec<MarksRecord> {
        let student_id = Uuid::new_v4();
        scores
            .iter()
            .map(|&score| MarksRecord {
                student_id,
                subject: "Mathematics".to_string(),
                score,
            })
            .collect()
    }

    #[test]
    fn no_attendance_records_means_zero_percent() {
        assert_eq!(attendance_percentage(&[]), 0.0);
        let metrics = compute(&[], &[]);
        assert_eq!(metrics.attendance_percentage, 0.0);
        assert_eq!(metrics.attendance_warning, Some(ATTENDANCE_SHORTAGE));
    }

    #[test]
    fn no_marks_leaves_average_and_remark_absent() {
        let metrics = compute(&attendance(&[true]), &[]);
        assert_eq!(metrics.average_marks, None);
        assert_eq!(metrics.performance_remark, None);
    }

    #[test]
    fn two_of_three_present_rounds_to_two_decimals() {
        let percentage = attendance_percentage(&attendance(&[true, true, false]));
        assert_eq!(percentage, 66.67);
        assert_eq!(attendance_warning(percentage), Some(ATTENDANCE_SHORTAGE));
    }

    #[test]
    fn warning_boundary_sits_at_seventy_five() {
        let percentage = attendance_percentage(&attendance(&[true, true, true, false]));
        assert_eq!(percentage, 75.0);
        assert_eq!(attendance_warning(percentage), None);
        assert_eq!(attendance_warning(74.9), Some(ATTENDANCE_SHORTAGE));
        assert!(!is_low_attendance(75.0));
        assert!(is_low_attendance(74.99));
    }

    #[test]
    fn shortage_text_quotes_the_threshold() {
        let quoted = format!("(< {LOW_ATTENDANCE_THRESHOLD}%)");
        assert!(ATTENDANCE_SHORTAGE.ends_with(&quoted), "{ATTENDANCE_SHORTAGE} vs {quoted}");
    }

    #[test]
    fn percentage_is_monotonic_in_new_records() {
        let mut records = attendance(&[true, false, true]);
        let mut previous = attendance_percentage(&records);
        for offset in 3..10 {
            let student_id = records[0].student_id;
            records.push(AttendanceRecord {
                student_id,
                date: day(offset),
                is_present: true,
            });
            let next = attendance_percentage(&records);
            assert!(next >= previous);
            previous = next;
        }
        for offset in 10..15 {
            let student_id = records[0].student_id;
            records.push(AttendanceRecord {
                student_id,
                date: day(offset),
                is_present: false,
            });
            let next = attendance_percentage(&records);
            assert!(next <= previous);
            previous = next;
        }
    }

    #[test]
    fn average_of_ninety_and_eighty_is_excellent() {
        let average = average_marks(&marks(&[90.0, 80.0]));
        assert_eq!(average, Some(85.0));
        assert_eq!(performance_remark(average), Some(PerformanceRemark::Excellent));
    }

    #[test]
    fn zero_scores_are_data_not_absence() {
        let average = average_marks(&marks(&[0.0]));
        assert_eq!(average, Some(0.0));
        assert_eq!(
            performance_remark(average),
            Some(PerformanceRemark::NeedsImprovement)
        );
    }

    #[test]
    fn remark_bands_follow_expected_tiers() {
        assert_eq!(performance_remark(Some(100.0)), Some(PerformanceRemark::Excellent));
        assert_eq!(performance_remark(Some(85.0)), Some(PerformanceRemark::Excellent));
        assert_eq!(performance_remark(Some(84.99)), Some(PerformanceRemark::Good));
        assert_eq!(performance_remark(Some(70.0)), Some(PerformanceRemark::Good));
        assert_eq!(performance_remark(Some(69.99)), Some(PerformanceRemark::Average));
        assert_eq!(performance_remark(Some(50.0)), Some(PerformanceRemark::Average));
        assert_eq!(
            performance_remark(Some(49.99)),
            Some(PerformanceRemark::NeedsImprovement)
        );
        assert_eq!(performance_remark(None), None);
    }
}
