//! Payroll, payroll history and salary structures

use hrms_common::attendance::MonthTally;
use hrms_common::payroll::{ManualDeductions, PayrollFigures, PayrollSummaryRow, SalaryComponents};
use hrms_common::time::now_rfc3339;
use serde::Serialize;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub month: i64,
    pub year: i64,
    pub salary: f64,
    pub basic_salary: Option<f64>,
    pub hra: f64,
    pub transport_allowance: f64,
    pub medical_allowance: f64,
    pub special_allowance: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub working_days: Option<i64>,
    pub present_days: Option<i64>,
    pub absent_days: i64,
    pub late_days: i64,
    pub tax_deduction: f64,
    pub provident_fund: f64,
    pub professional_tax: f64,
    pub insurance: f64,
    pub loan_repayment: f64,
    pub advance_deduction: f64,
    pub other_deductions: f64,
    pub attendance_deductions: f64,
    pub gross_salary: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    /// Built from a salary structure rather than entered by hand
    pub generated: bool,
    pub status: String,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub processed_by: Option<String>,
    pub processed_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PayrollRecord {
    pub fn manual_deductions(&self) -> ManualDeductions {
        ManualDeductions {
            tax_deduction: self.tax_deduction,
            provident_fund: self.provident_fund,
            professional_tax: self.professional_tax,
            insurance: self.insurance,
            loan_repayment: self.loan_repayment,
            advance_deduction: self.advance_deduction,
            other_deductions: self.other_deductions,
        }
    }

    pub fn set_manual_deductions(&mut self, manual: &ManualDeductions) {
        self.tax_deduction = manual.tax_deduction;
        self.provident_fund = manual.provident_fund;
        self.professional_tax = manual.professional_tax;
        self.insurance = manual.insurance;
        self.loan_repayment = manual.loan_repayment;
        self.advance_deduction = manual.advance_deduction;
        self.other_deductions = manual.other_deductions;
    }

    pub fn tally(&self) -> MonthTally {
        MonthTally {
            late_days: self.late_days.max(0) as u32,
            absent_days: self.absent_days.max(0) as u32,
        }
    }

    pub fn apply_figures(&mut self, figures: &PayrollFigures) {
        self.gross_salary = figures.gross_salary;
        self.attendance_deductions = figures.attendance_deductions;
        self.total_deductions = figures.total_deductions;
        self.net_salary = figures.net_salary;
    }
}

const SELECT_PAYROLL: &str = r#"
    SELECT p.*, u.name AS user_name, u.employee_id, u.department
    FROM payroll p
    JOIN users u ON u.id = p.user_id
"#;

pub async fn find(db: &SqlitePool, id: &str) -> sqlx::Result<Option<PayrollRecord>> {
    sqlx::query_as::<_, PayrollRecord>(&format!("{} WHERE p.id = ?", SELECT_PAYROLL))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Insert a payroll record; `id`, timestamps and joined columns are filled in
pub async fn insert(db: &SqlitePool, record: &PayrollRecord) -> sqlx::Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO payroll (
            id, user_id, month, year, salary, basic_salary, hra, transport_allowance,
            medical_allowance, special_allowance, overtime_pay, bonus, working_days,
            present_days, absent_days, late_days, tax_deduction, provident_fund,
            professional_tax, insurance, loan_repayment, advance_deduction, other_deductions,
            attendance_deductions, gross_salary, total_deductions, net_salary, generated, status,
            payment_method, notes, created_by, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&record.user_id)
    .bind(record.month)
    .bind(record.year)
    .bind(record.salary)
    .bind(record.basic_salary)
    .bind(record.hra)
    .bind(record.transport_allowance)
    .bind(record.medical_allowance)
    .bind(record.special_allowance)
    .bind(record.overtime_pay)
    .bind(record.bonus)
    .bind(record.working_days)
    .bind(record.present_days)
    .bind(record.absent_days)
    .bind(record.late_days)
    .bind(record.tax_deduction)
    .bind(record.provident_fund)
    .bind(record.professional_tax)
    .bind(record.insurance)
    .bind(record.loan_repayment)
    .bind(record.advance_deduction)
    .bind(record.other_deductions)
    .bind(record.attendance_deductions)
    .bind(record.gross_salary)
    .bind(record.total_deductions)
    .bind(record.net_salary)
    .bind(record.generated)
    .bind(&record.status)
    .bind(&record.payment_method)
    .bind(&record.notes)
    .bind(&record.created_by)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(id)
}

/// Write back every mutable column
pub async fn save(db: &SqlitePool, record: &PayrollRecord) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE payroll SET
            salary = ?, basic_salary = ?, hra = ?, transport_allowance = ?, medical_allowance = ?,
            special_allowance = ?, overtime_pay = ?, bonus = ?, working_days = ?, present_days = ?,
            absent_days = ?, late_days = ?, tax_deduction = ?, provident_fund = ?,
            professional_tax = ?, insurance = ?, loan_repayment = ?, advance_deduction = ?,
            other_deductions = ?, attendance_deductions = ?, gross_salary = ?,
            total_deductions = ?, net_salary = ?, status = ?, payment_date = ?,
            payment_method = ?, notes = ?, processed_by = ?, processed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(record.salary)
    .bind(record.basic_salary)
    .bind(record.hra)
    .bind(record.transport_allowance)
    .bind(record.medical_allowance)
    .bind(record.special_allowance)
    .bind(record.overtime_pay)
    .bind(record.bonus)
    .bind(record.working_days)
    .bind(record.present_days)
    .bind(record.absent_days)
    .bind(record.late_days)
    .bind(record.tax_deduction)
    .bind(record.provident_fund)
    .bind(record.professional_tax)
    .bind(record.insurance)
    .bind(record.loan_repayment)
    .bind(record.advance_deduction)
    .bind(record.other_deductions)
    .bind(record.attendance_deductions)
    .bind(record.gross_salary)
    .bind(record.total_deductions)
    .bind(record.net_salary)
    .bind(&record.status)
    .bind(&record.payment_date)
    .bind(&record.payment_method)
    .bind(&record.notes)
    .bind(&record.processed_by)
    .bind(&record.processed_at)
    .bind(now_rfc3339())
    .bind(&record.id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn delete(db: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM payroll WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Default)]
pub struct PayrollFilter {
    pub user_id: Option<String>,
    /// Restrict to users of one department; `Some(None)` means no department
    pub department: Option<Option<String>>,
    pub month: Option<i64>,
    pub year: Option<i64>,
    pub status: Option<String>,
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PayrollFilter) {
    if let Some(user_id) = &filter.user_id {
        qb.push(" AND p.user_id = ").push_bind(user_id.clone());
    }
    if let Some(department) = &filter.department {
        qb.push(" AND u.department IS ").push_bind(department.clone());
    }
    if let Some(month) = filter.month {
        qb.push(" AND p.month = ").push_bind(month);
    }
    if let Some(year) = filter.year {
        qb.push(" AND p.year = ").push_bind(year);
    }
    if let Some(status) = &filter.status {
        qb.push(" AND p.status = ").push_bind(status.clone());
    }
}

pub async fn list(
    db: &SqlitePool,
    filter: &PayrollFilter,
    limit: i64,
) -> sqlx::Result<Vec<PayrollRecord>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_PAYROLL);
    qb.push(" WHERE 1 = 1");
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY p.year DESC, p.month DESC, u.name LIMIT ")
        .push_bind(limit);

    qb.build_query_as::<PayrollRecord>().fetch_all(db).await
}

/// Reporting columns for every record matching `filter`
pub async fn summary_rows(
    db: &SqlitePool,
    filter: &PayrollFilter,
) -> sqlx::Result<Vec<PayrollSummaryRow>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT u.department, p.status, p.gross_salary, p.total_deductions, p.net_salary,
                p.bonus, p.overtime_pay
         FROM payroll p JOIN users u ON u.id = p.user_id WHERE 1 = 1",
    );
    push_filter(&mut qb, filter);

    let rows: Vec<(Option<String>, String, f64, f64, f64, f64, f64)> =
        qb.build_query_as().fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(
            |(department, status, gross_salary, total_deductions, net_salary, bonus, overtime_pay)| {
                PayrollSummaryRow {
                    department,
                    status,
                    gross_salary,
                    total_deductions,
                    net_salary,
                    bonus,
                    overtime_pay,
                }
            },
        )
        .collect())
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub payroll_id: String,
    pub action: String,
    pub changed_by: Option<String>,
    pub changed_by_name: Option<String>,
    #[sqlx(json)]
    pub changes: Value,
    pub created_at: String,
}

pub async fn record_history(
    db: &SqlitePool,
    payroll_id: &str,
    action: &str,
    changed_by: &str,
    changes: Value,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO payroll_history (id, payroll_id, action, changed_by, changes, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payroll_id)
    .bind(action)
    .bind(changed_by)
    .bind(changes.to_string())
    .bind(now_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn history(db: &SqlitePool, payroll_id: &str) -> sqlx::Result<Vec<HistoryEntry>> {
    sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT h.id, h.payroll_id, h.action, h.changed_by, u.name AS changed_by_name,
               COALESCE(h.changes, 'null') AS changes, h.created_at
        FROM payroll_history h
        LEFT JOIN users u ON u.id = h.changed_by
        WHERE h.payroll_id = ?
        ORDER BY h.created_at DESC
        "#,
    )
    .bind(payroll_id)
    .fetch_all(db)
    .await
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SalaryStructure {
    pub id: String,
    pub user_id: String,
    pub basic_salary: f64,
    pub hra: f64,
    pub transport_allowance: f64,
    pub medical_allowance: f64,
    pub special_allowance: f64,
    pub provident_fund_percent: Option<f64>,
    pub professional_tax: f64,
    pub insurance: f64,
    pub effective_from: String,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl SalaryStructure {
    pub fn components(&self) -> SalaryComponents {
        SalaryComponents {
            basic_salary: self.basic_salary,
            hra: self.hra,
            transport_allowance: self.transport_allowance,
            medical_allowance: self.medical_allowance,
            special_allowance: self.special_allowance,
            provident_fund_percent: self.provident_fund_percent,
            professional_tax: self.professional_tax,
            insurance: self.insurance,
        }
    }
}

pub async fn active_structure(
    db: &SqlitePool,
    user_id: &str,
) -> sqlx::Result<Option<SalaryStructure>> {
    sqlx::query_as::<_, SalaryStructure>(
        "SELECT * FROM salary_structures WHERE user_id = ? AND is_active = 1
         ORDER BY effective_from DESC, created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Deactivate the user's structures and insert `components` as the active one
pub async fn replace_structure(
    db: &SqlitePool,
    user_id: &str,
    components: &SalaryComponents,
    effective_from: &str,
    created_by: &str,
) -> sqlx::Result<SalaryStructure> {
    let id = Uuid::new_v4().to_string();
    let mut tx = db.begin().await?;

    sqlx::query("UPDATE salary_structures SET is_active = 0 WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO salary_structures (
            id, user_id, basic_salary, hra, transport_allowance, medical_allowance,
            special_allowance, provident_fund_percent, professional_tax, insurance,
            effective_from, is_active, created_by, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(components.basic_salary)
    .bind(components.hra)
    .bind(components.transport_allowance)
    .bind(components.medical_allowance)
    .bind(components.special_allowance)
    .bind(components.provident_fund_percent)
    .bind(components.professional_tax)
    .bind(components.insurance)
    .bind(effective_from)
    .bind(created_by)
    .bind(now_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    sqlx::query_as::<_, SalaryStructure>("SELECT * FROM salary_structures WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrms_common::db::init_memory_database;

    async fn seed_user(db: &SqlitePool, id: &str) {
        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
             VALUES (?, ?, ?, 'x', 'employee', ?, ?)",
        )
        .bind(id)
        .bind(id)
        .bind(format!("{}@example.com", id))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_only_one_active_structure() {
        let db = init_memory_database().await.unwrap();
        seed_user(&db, "u1").await;

        let first = SalaryComponents {
            basic_salary: 30_000.0,
            ..Default::default()
        };
        let second = SalaryComponents {
            basic_salary: 35_000.0,
            ..Default::default()
        };
        replace_structure(&db, "u1", &first, "2024-01-01", "u1").await.unwrap();
        replace_structure(&db, "u1", &second, "2024-06-01", "u1").await.unwrap();

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM salary_structures WHERE user_id = 'u1' AND is_active = 1",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(active, 1);

        let current = active_structure(&db, "u1").await.unwrap().unwrap();
        assert_eq!(current.basic_salary, 35_000.0);
    }

    #[tokio::test]
    async fn test_insert_and_reload_payroll() {
        let db = init_memory_database().await.unwrap();
        seed_user(&db, "u1").await;

        let record = PayrollRecord {
            user_id: "u1".into(),
            month: 3,
            year: 2024,
            salary: 26_000.0,
            gross_salary: 26_000.0,
            net_salary: 26_000.0,
            status: "draft".into(),
            ..Default::default()
        };
        let id = insert(&db, &record).await.unwrap();
        let loaded = find(&db, &id).await.unwrap().unwrap();
        assert_eq!(loaded.user_name.as_deref(), Some("u1"));
        assert_eq!(loaded.net_salary, 26_000.0);
        assert!(!loaded.generated);

        let duplicate = insert(&db, &record).await.unwrap_err();
        assert!(matches!(duplicate, sqlx::Error::Database(e) if e.is_unique_violation()));
    }
}
