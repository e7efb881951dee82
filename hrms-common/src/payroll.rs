//! Payroll arithmetic
//!
//! Monthly payroll is prorated per working day: an absent day deducts one
//! day's pay and a late day deducts half. Every stored money figure is
//! rounded to two decimals.

use crate::attendance::MonthTally;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Working days assumed per month for per-day salary
pub const DEFAULT_WORKING_DAYS: u32 = 26;

/// Fraction of a day's pay deducted for a late day
pub const LATE_DAY_FACTOR: f64 = 0.5;

/// Provident fund share of basic salary when the structure sets none
pub const DEFAULT_PF_PERCENT: f64 = 12.0;

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Payroll lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Processed,
    Paid,
    Cancelled,
}

impl PayrollStatus {
    pub const NAMES: [&'static str; 4] = ["draft", "processed", "paid", "cancelled"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Draft => "draft",
            PayrollStatus::Processed => "processed",
            PayrollStatus::Paid => "paid",
            PayrollStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PayrollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayrollStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(PayrollStatus::Draft),
            "processed" => Ok(PayrollStatus::Processed),
            "paid" => Ok(PayrollStatus::Paid),
            "cancelled" => Ok(PayrollStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("Unknown payroll status: {}", other))),
        }
    }
}

/// Deductions entered by HR on top of attendance deductions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualDeductions {
    pub tax_deduction: f64,
    pub provident_fund: f64,
    pub professional_tax: f64,
    pub insurance: f64,
    pub loan_repayment: f64,
    pub advance_deduction: f64,
    pub other_deductions: f64,
}

impl ManualDeductions {
    pub fn total(&self) -> f64 {
        self.tax_deduction
            + self.provident_fund
            + self.professional_tax
            + self.insurance
            + self.loan_repayment
            + self.advance_deduction
            + self.other_deductions
    }

    /// Field name and value pairs, for validation
    pub fn fields(&self) -> [(&'static str, f64); 7] {
        [
            ("tax_deduction", self.tax_deduction),
            ("provident_fund", self.provident_fund),
            ("professional_tax", self.professional_tax),
            ("insurance", self.insurance),
            ("loan_repayment", self.loan_repayment),
            ("advance_deduction", self.advance_deduction),
            ("other_deductions", self.other_deductions),
        ]
    }
}

/// Computed payroll figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PayrollFigures {
    pub gross_salary: f64,
    pub attendance_deductions: f64,
    pub manual_deductions: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
}

/// Deduction for late and absent days
///
/// # Examples
/// ```
/// use hrms_common::attendance::MonthTally;
/// use hrms_common::payroll::attendance_deductions;
///
/// // 26 000 / 26 = 1 000 per day; 2 late + 1 absent = 2 000
/// let tally = MonthTally { late_days: 2, absent_days: 1 };
/// assert_eq!(attendance_deductions(26_000.0, tally, 26), 2_000.0);
/// ```
pub fn attendance_deductions(salary: f64, tally: MonthTally, working_days: u32) -> f64 {
    if working_days == 0 {
        return 0.0;
    }
    let per_day = salary / working_days as f64;
    tally.late_days as f64 * per_day * LATE_DAY_FACTOR + tally.absent_days as f64 * per_day
}

/// Gross, deductions and net for a monthly payroll
pub fn compute_payroll(
    salary: f64,
    bonus: f64,
    manual: &ManualDeductions,
    tally: MonthTally,
    working_days: u32,
) -> PayrollFigures {
    let gross = salary + bonus;
    let attendance = attendance_deductions(salary, tally, working_days);
    let manual_total = manual.total();
    let total = attendance + manual_total;

    PayrollFigures {
        gross_salary: round2(gross),
        attendance_deductions: round2(attendance),
        manual_deductions: round2(manual_total),
        total_deductions: round2(total),
        net_salary: round2(gross - total),
    }
}

/// Figures for a payroll built from its pay components
///
/// Absence is already prorated into `basic_salary`, so no attendance
/// deduction is taken here.
pub fn component_payroll(
    basic_salary: f64,
    allowances: f64,
    overtime_pay: f64,
    bonus: f64,
    manual: &ManualDeductions,
) -> PayrollFigures {
    let gross = basic_salary + allowances + overtime_pay + bonus;
    let total = manual.total();

    PayrollFigures {
        gross_salary: round2(gross),
        attendance_deductions: 0.0,
        manual_deductions: round2(total),
        total_deductions: round2(total),
        net_salary: round2(gross - total),
    }
}

/// Active salary structure for an employee
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalaryComponents {
    pub basic_salary: f64,
    pub hra: f64,
    pub transport_allowance: f64,
    pub medical_allowance: f64,
    pub special_allowance: f64,
    pub provident_fund_percent: Option<f64>,
    pub professional_tax: f64,
    pub insurance: f64,
}

impl SalaryComponents {
    pub fn allowances(&self) -> f64 {
        self.hra + self.transport_allowance + self.medical_allowance + self.special_allowance
    }
}

/// Month-specific inputs when generating from a salary structure
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationInputs {
    pub working_days: Option<u32>,
    pub present_days: Option<u32>,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub tax_deduction: f64,
    pub loan_repayment: f64,
    pub advance_deduction: f64,
    pub other_deductions: f64,
}

/// Payroll produced from a salary structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeneratedPayroll {
    /// Full monthly salary before absence proration
    pub salary: f64,
    /// Basic salary after absence proration
    pub basic_salary: f64,
    pub working_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub deductions: ManualDeductions,
    pub figures: PayrollFigures,
}

/// Build a payroll from a salary structure
///
/// Absent days (working minus present) reduce basic pay pro rata; provident
/// fund is a percentage of the full basic salary.
pub fn generate_from_structure(
    structure: &SalaryComponents,
    inputs: &GenerationInputs,
) -> GeneratedPayroll {
    let working_days = inputs.working_days.unwrap_or(DEFAULT_WORKING_DAYS).max(1);
    let present_days = inputs.present_days.unwrap_or(working_days).min(working_days);
    let absent_days = working_days - present_days;

    let per_day = structure.basic_salary / working_days as f64;
    let basic = structure.basic_salary - per_day * absent_days as f64;
    let pf_percent = structure.provident_fund_percent.unwrap_or(DEFAULT_PF_PERCENT);

    let deductions = ManualDeductions {
        tax_deduction: inputs.tax_deduction,
        provident_fund: round2(structure.basic_salary * pf_percent / 100.0),
        professional_tax: structure.professional_tax,
        insurance: structure.insurance,
        loan_repayment: inputs.loan_repayment,
        advance_deduction: inputs.advance_deduction,
        other_deductions: inputs.other_deductions,
    };

    let figures = component_payroll(
        round2(basic),
        structure.allowances(),
        inputs.overtime_pay,
        inputs.bonus,
        &deductions,
    );

    GeneratedPayroll {
        salary: round2(structure.basic_salary + structure.allowances()),
        basic_salary: round2(basic),
        working_days,
        present_days,
        absent_days,
        overtime_pay: inputs.overtime_pay,
        bonus: inputs.bonus,
        deductions,
        figures,
    }
}

/// Money and status fields needed for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollSummaryRow {
    pub department: Option<String>,
    pub status: String,
    pub gross_salary: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    pub bonus: f64,
    pub overtime_pay: f64,
}

/// Counts per payroll status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub draft: usize,
    pub processed: usize,
    pub paid: usize,
    pub cancelled: usize,
}

/// Aggregate payroll statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollStats {
    pub total_records: usize,
    pub total_gross_salary: f64,
    pub total_deductions: f64,
    pub total_net_salary: f64,
    pub total_bonus: f64,
    pub total_overtime: f64,
    pub average_net_salary: f64,
    pub status_breakdown: StatusBreakdown,
}

impl PayrollStats {
    pub fn from_rows(rows: &[PayrollSummaryRow]) -> Self {
        let mut breakdown = StatusBreakdown::default();
        for row in rows {
            match row.status.as_str() {
                "draft" => breakdown.draft += 1,
                "processed" => breakdown.processed += 1,
                "paid" => breakdown.paid += 1,
                "cancelled" => breakdown.cancelled += 1,
                _ => {}
            }
        }

        let total_net: f64 = rows.iter().map(|r| r.net_salary).sum();
        let count = rows.len();

        Self {
            total_records: count,
            total_gross_salary: round2(rows.iter().map(|r| r.gross_salary).sum()),
            total_deductions: round2(rows.iter().map(|r| r.total_deductions).sum()),
            total_net_salary: round2(total_net),
            total_bonus: round2(rows.iter().map(|r| r.bonus).sum()),
            total_overtime: round2(rows.iter().map(|r| r.overtime_pay).sum()),
            average_net_salary: if count > 0 {
                round2(total_net / count as f64)
            } else {
                0.0
            },
            status_breakdown: breakdown,
        }
    }
}

/// Per-department payroll totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentTotals {
    pub count: usize,
    pub total_gross: f64,
    pub total_net: f64,
    pub total_deductions: f64,
}

/// Group payroll rows by department; rows without one fall under "Unknown"
pub fn department_summary(rows: &[PayrollSummaryRow]) -> BTreeMap<String, DepartmentTotals> {
    let mut summary: BTreeMap<String, DepartmentTotals> = BTreeMap::new();
    for row in rows {
        let key = row
            .department
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("Unknown")
            .to_string();
        let entry = summary.entry(key).or_default();
        entry.count += 1;
        entry.total_gross = round2(entry.total_gross + row.gross_salary);
        entry.total_net = round2(entry.total_net + row.net_salary);
        entry.total_deductions = round2(entry.total_deductions + row.total_deductions);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(-1.236), -1.24);
    }

    #[test]
    fn test_compute_payroll_without_attendance_issues() {
        let figures = compute_payroll(50_000.0, 5_000.0, &ManualDeductions::default(), MonthTally::default(), 26);
        assert_eq!(figures.gross_salary, 55_000.0);
        assert_eq!(figures.total_deductions, 0.0);
        assert_eq!(figures.net_salary, 55_000.0);
    }

    #[test]
    fn test_compute_payroll_with_late_absent_and_manual() {
        let manual = ManualDeductions {
            tax_deduction: 1_000.0,
            provident_fund: 500.0,
            professional_tax: 200.0,
            ..Default::default()
        };
        let tally = MonthTally { late_days: 3, absent_days: 2 };
        let figures = compute_payroll(30_000.0, 0.0, &manual, tally, 26);

        // per day 1153.846..; 3 * 0.5 + 2 = 3.5 days = 4038.46
        assert_eq!(figures.attendance_deductions, 4038.46);
        assert_eq!(figures.manual_deductions, 1_700.0);
        assert_eq!(figures.total_deductions, 5738.46);
        assert_eq!(figures.net_salary, 24261.54);
        assert_eq!(figures.net_salary, round2(figures.gross_salary - figures.total_deductions));
    }

    #[test]
    fn test_attendance_deductions_zero_working_days() {
        let tally = MonthTally { late_days: 1, absent_days: 1 };
        assert_eq!(attendance_deductions(10_000.0, tally, 0), 0.0);
    }

    #[test]
    fn test_generate_from_structure() {
        let structure = SalaryComponents {
            basic_salary: 26_000.0,
            hra: 5_000.0,
            transport_allowance: 1_000.0,
            professional_tax: 200.0,
            ..Default::default()
        };
        let inputs = GenerationInputs {
            working_days: Some(26),
            present_days: Some(24),
            bonus: 500.0,
            ..Default::default()
        };
        let payroll = generate_from_structure(&structure, &inputs);
        assert_eq!(payroll.absent_days, 2);
        assert_eq!(payroll.basic_salary, 24_000.0);
        assert_eq!(payroll.deductions.provident_fund, 3_120.0);
        assert_eq!(payroll.figures.gross_salary, 30_500.0);
        assert_eq!(payroll.figures.total_deductions, 3_320.0);
        assert_eq!(payroll.figures.net_salary, 27_180.0);
        assert_eq!(payroll.salary, 32_000.0);
    }

    #[test]
    fn test_component_payroll_matches_generation() {
        let structure = SalaryComponents {
            basic_salary: 20_000.0,
            hra: 5_000.0,
            transport_allowance: 1_000.0,
            professional_tax: 200.0,
            ..Default::default()
        };
        let inputs = GenerationInputs {
            working_days: Some(20),
            present_days: Some(18),
            overtime_pay: 1_500.0,
            ..Default::default()
        };
        let payroll = generate_from_structure(&structure, &inputs);
        assert_eq!(payroll.figures.gross_salary, 25_500.0);
        assert_eq!(payroll.figures.net_salary, 22_900.0);

        let again = component_payroll(
            payroll.basic_salary,
            structure.allowances(),
            payroll.overtime_pay,
            payroll.bonus,
            &payroll.deductions,
        );
        assert_eq!(again, payroll.figures);
        assert_eq!(again.attendance_deductions, 0.0);
    }

    #[test]
    fn test_generate_clamps_present_days() {
        let structure = SalaryComponents {
            basic_salary: 10_000.0,
            provident_fund_percent: Some(0.0),
            ..Default::default()
        };
        let inputs = GenerationInputs {
            working_days: Some(20),
            present_days: Some(25),
            ..Default::default()
        };
        let payroll = generate_from_structure(&structure, &inputs);
        assert_eq!(payroll.absent_days, 0);
        assert_eq!(payroll.figures.net_salary, 10_000.0);
    }

    fn row(dept: Option<&str>, status: &str, gross: f64, deductions: f64) -> PayrollSummaryRow {
        PayrollSummaryRow {
            department: dept.map(String::from),
            status: status.to_string(),
            gross_salary: gross,
            total_deductions: deductions,
            net_salary: gross - deductions,
            bonus: 100.0,
            overtime_pay: 0.0,
        }
    }

    #[test]
    fn test_stats_from_rows() {
        let rows = vec![
            row(Some("Engineering"), "draft", 1_000.0, 100.0),
            row(Some("Engineering"), "paid", 2_000.0, 200.0),
            row(None, "processed", 3_000.0, 0.0),
        ];
        let stats = PayrollStats::from_rows(&rows);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.total_gross_salary, 6_000.0);
        assert_eq!(stats.total_deductions, 300.0);
        assert_eq!(stats.total_net_salary, 5_700.0);
        assert_eq!(stats.total_bonus, 300.0);
        assert_eq!(stats.average_net_salary, 1_900.0);
        assert_eq!(stats.status_breakdown.draft, 1);
        assert_eq!(stats.status_breakdown.paid, 1);
        assert_eq!(stats.status_breakdown.processed, 1);

        let empty = PayrollStats::from_rows(&[]);
        assert_eq!(empty.average_net_salary, 0.0);
    }

    #[test]
    fn test_department_summary_groups_unknown() {
        let rows = vec![
            row(Some("Engineering"), "draft", 1_000.0, 100.0),
            row(Some("Engineering"), "paid", 2_000.0, 200.0),
            row(None, "draft", 500.0, 0.0),
        ];
        let summary = department_summary(&rows);
        assert_eq!(summary["Engineering"].count, 2);
        assert_eq!(summary["Engineering"].total_net, 2_700.0);
        assert_eq!(summary["Unknown"].count, 1);
    }

    #[test]
    fn test_status_names_parse() {
        for name in PayrollStatus::NAMES {
            assert_eq!(name.parse::<PayrollStatus>().unwrap().to_string(), name);
        }
    }
}
