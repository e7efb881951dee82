//! Attendance rules: lateness, overtime and period statistics

use crate::payroll::round2;
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Daily attendance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    OnLeave,
}

impl AttendanceStatus {
    pub const NAMES: [&'static str; 4] = ["present", "absent", "late", "on_leave"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::OnLeave => "on_leave",
        }
    }

    /// Present or late both count as attended
    pub fn is_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "on_leave" => Ok(AttendanceStatus::OnLeave),
            other => Err(Error::InvalidInput(format!("Unknown attendance status: {}", other))),
        }
    }
}

/// Shift timing used for check-in/check-out evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftPolicy {
    pub shift_start: NaiveTime,
    pub grace_minutes: i64,
    pub standard_work_minutes: i64,
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        Self {
            shift_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            grace_minutes: 0,
            standard_work_minutes: 480,
        }
    }
}

impl ShiftPolicy {
    /// Minutes late, measured from shift start, or None when within grace
    pub fn late_by_minutes(&self, check_in: NaiveTime) -> Option<i64> {
        let minutes = (check_in - self.shift_start).num_minutes();
        if minutes > self.grace_minutes {
            Some(minutes)
        } else {
            None
        }
    }

    /// Status assigned at check-in
    pub fn check_in_status(&self, check_in: NaiveTime) -> AttendanceStatus {
        match self.late_by_minutes(check_in) {
            Some(_) => AttendanceStatus::Late,
            None => AttendanceStatus::Present,
        }
    }

    /// Overtime beyond the standard working minutes
    pub fn overtime_minutes(&self, check_in: NaiveTime, check_out: NaiveTime) -> i64 {
        (work_minutes(check_in, check_out) - self.standard_work_minutes).max(0)
    }
}

/// Whole minutes between check-in and check-out, never negative
pub fn work_minutes(check_in: NaiveTime, check_out: NaiveTime) -> i64 {
    (check_out - check_in).num_minutes().max(0)
}

/// Minimal attendance row used by the statistics calculators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Attendance summary over a date range
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_days: usize,
    pub present_days: usize,
    pub absent_days: usize,
    pub late_days: usize,
    pub leave_days: usize,
    pub working_days_count: usize,
    pub attendance_percentage: f64,
    pub weekend_days: usize,
    pub weekend_present: usize,
}

struct StatusCounts {
    present: usize,
    absent: usize,
    late: usize,
    on_leave: usize,
}

fn count_statuses<'a>(records: impl Iterator<Item = &'a DayRecord>) -> StatusCounts {
    let mut counts = StatusCounts {
        present: 0,
        absent: 0,
        late: 0,
        on_leave: 0,
    };
    for record in records {
        match record.status {
            AttendanceStatus::Present => counts.present += 1,
            AttendanceStatus::Absent => counts.absent += 1,
            AttendanceStatus::Late => counts.late += 1,
            AttendanceStatus::OnLeave => counts.on_leave += 1,
        }
    }
    counts
}

/// Statistics for one employee
///
/// Working days with no record count as absent. Records outside the
/// working-day set (weekends, days before joining) are reported
/// separately and never affect the percentage.
pub fn user_stats(records: &[DayRecord], working_days: &[NaiveDate]) -> AttendanceStats {
    let working: HashSet<NaiveDate> = working_days.iter().copied().collect();
    let (on_working, off_working): (Vec<&DayRecord>, Vec<&DayRecord>) =
        records.iter().partition(|r| working.contains(&r.date));

    let counts = count_statuses(on_working.iter().copied());
    let marked: HashSet<NaiveDate> = on_working.iter().map(|r| r.date).collect();
    let unmarked = working.iter().filter(|d| !marked.contains(*d)).count();

    let total = working_days.len();
    let attended = counts.present + counts.late;
    let percentage = if total > 0 {
        attended as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    AttendanceStats {
        total_days: total,
        present_days: counts.present,
        absent_days: counts.absent + unmarked,
        late_days: counts.late,
        leave_days: counts.on_leave,
        working_days_count: total,
        attendance_percentage: round2(percentage),
        weekend_days: off_working.len(),
        weekend_present: off_working
            .iter()
            .filter(|r| r.status == AttendanceStatus::Present)
            .count(),
    }
}

/// Statistics across every employee with records in the range
///
/// The percentage is attended records over working days times the number
/// of distinct employees seen in the range.
pub fn organisation_stats(records: &[DayRecord], working_days: &[NaiveDate]) -> AttendanceStats {
    let working: HashSet<NaiveDate> = working_days.iter().copied().collect();
    let counts = count_statuses(records.iter().filter(|r| working.contains(&r.date)));
    let employees: HashSet<&str> = records.iter().map(|r| r.user_id.as_str()).collect();

    let total = working_days.len();
    let expected = total * employees.len();
    let attended = counts.present + counts.late;
    let percentage = if expected > 0 {
        attended as f64 / expected as f64 * 100.0
    } else {
        0.0
    };

    AttendanceStats {
        total_days: total,
        present_days: counts.present,
        absent_days: counts.absent,
        late_days: counts.late,
        leave_days: counts.on_leave,
        working_days_count: total,
        attendance_percentage: round2(percentage),
        weekend_days: 0,
        weekend_present: 0,
    }
}

/// Attendance tallies used by the payroll deduction calculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthTally {
    pub late_days: u32,
    pub absent_days: u32,
}

impl MonthTally {
    pub fn from_statuses<I: IntoIterator<Item = AttendanceStatus>>(statuses: I) -> Self {
        let mut tally = Self::default();
        for status in statuses {
            match status {
                AttendanceStatus::Late => tally.late_days += 1,
                AttendanceStatus::Absent => tally.absent_days += 1,
                _ => {}
            }
        }
        tally
    }
}
