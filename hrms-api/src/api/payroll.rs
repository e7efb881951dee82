//! Payroll records, salary structures and payroll reporting

use crate::api::{clamp_limit, require_role, ApiJson, ApiQuery, CurrentUser, DEFAULT_LIMIT};
use crate::db::attendance as attendance_db;
use crate::db::payroll::{self as payroll_db, PayrollFilter, PayrollRecord};
use crate::db::users;
use crate::error::{conflict_on_duplicate, created, success, success_with};
use crate::services::notifier::NewNotification;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use hrms_common::db::settings;
use hrms_common::payroll::{
    component_payroll, compute_payroll, department_summary, generate_from_structure,
    GenerationInputs, ManualDeductions, PayrollFigures, PayrollStats, PayrollStatus,
    SalaryComponents,
};
use hrms_common::roles::Role;
use hrms_common::time::{format_date, now_rfc3339, today};
use hrms_common::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

const ADMIN_HR: &[Role] = &[Role::Admin, Role::Hr];

pub fn payroll_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payroll", get(list_payroll).post(create_payroll))
        .route("/api/payroll/generate", post(generate_payroll))
        .route("/api/payroll/stats", get(payroll_stats))
        .route("/api/payroll/department-summary", get(payroll_department_summary))
        .route("/api/payroll/history/:id", get(payroll_history))
        .route("/api/payroll/salary-structure", post(create_salary_structure))
        .route("/api/payroll/salary-structure/:user_id", get(get_salary_structure))
        .route("/api/payroll/user/:user_id", get(user_payroll))
        .route(
            "/api/payroll/:id",
            get(get_payroll).put(update_payroll).delete(delete_payroll),
        )
        .route("/api/payroll/:id/recalculate", post(recalculate_payroll))
        .route("/api/payroll/:id/process", put(process_payroll))
        .route("/api/payroll/:id/mark-paid", put(mark_paid))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePayrollRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
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
    #[serde(flatten)]
    pub deductions: ManualDeductions,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeneratePayrollRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    pub month: i64,
    pub year: i64,
    #[serde(flatten)]
    pub inputs: GenerationInputs,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdatePayrollRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hra: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_allowance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_allowance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_allowance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overtime_pay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_deduction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provident_fund: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional_tax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_repayment: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advance_deduction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_deductions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MarkPaidRequest {
    #[serde(alias = "paymentDate")]
    pub payment_date: Option<String>,
    #[serde(alias = "paymentMethod")]
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SalaryStructureRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(flatten)]
    pub components: SalaryComponents,
    #[serde(alias = "effectiveFrom")]
    pub effective_from: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PayrollListQuery {
    pub month: Option<i64>,
    pub year: Option<i64>,
    pub status: Option<String>,
    pub department: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PayrollStatsQuery {
    #[serde(alias = "user_id")]
    pub user_id: Option<String>,
    pub month: Option<i64>,
    pub year: Option<i64>,
}

fn validate_period(v: &mut Validator, month: i64, year: i64) {
    v.int_range("month", month, 1, 12).int_range("year", year, 2000, 2100);
}

fn validate_deductions(v: &mut Validator, deductions: &ManualDeductions) {
    for (field, value) in deductions.fields() {
        v.non_negative(field, value);
    }
}

/// HR may not prepare payroll for themselves or for other hr/admin staff
fn check_hr_target(current: &CurrentUser, target: &users::User) -> ApiResult<()> {
    if current.role != Role::Hr {
        return Ok(());
    }
    if target.id == current.id {
        return Err(ApiError::forbidden("HR cannot create their own payroll"));
    }
    if target.role.is_admin_or_hr() {
        return Err(ApiError::forbidden(
            "HR cannot create payroll for HR or admin users",
        ));
    }
    Ok(())
}

async fn load_payroll(state: &AppState, id: &str) -> ApiResult<PayrollRecord> {
    payroll_db::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record not found"))
}

async fn notify_payslip(state: &AppState, record: &PayrollRecord) {
    let content = NewNotification::new(
        "payroll",
        "New Payslip Available",
        format!(
            "Your payslip for {:02}/{} is available. Net salary: {:.2}",
            record.month, record.year, record.net_salary
        ),
    )
    .link("/payroll");
    state.notifier().notify_quietly(&record.user_id, &content).await;
}

/// POST /api/payroll
///
/// Late and absent days for the month are read from attendance and
/// deducted at half and full day rates.
pub async fn create_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreatePayrollRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, ADMIN_HR)?;

    let mut v = Validator::new();
    v.check(!req.user_id.is_empty(), "user_id", "\"user_id\" is required");
    validate_period(&mut v, req.month, req.year);
    v.positive("salary", req.salary)
        .non_negative("bonus", req.bonus)
        .non_negative("overtime_pay", req.overtime_pay);
    validate_deductions(&mut v, &req.deductions);
    v.finish()?;

    let target = users::find_by_id(&state.db, &req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    check_hr_target(&current, &target)?;

    let (year, month) = (req.year as i32, req.month as u32);
    let tally = attendance_db::month_tally(&state.db, &target.id, year, month).await?;
    let present = attendance_db::present_days(&state.db, &target.id, year, month).await?;
    let working_days = settings::payroll_working_days(&state.db).await?;
    let figures = compute_payroll(req.salary, req.bonus, &req.deductions, tally, working_days);

    let mut record = PayrollRecord {
        user_id: target.id.clone(),
        month: req.month,
        year: req.year,
        salary: req.salary,
        basic_salary: req.basic_salary,
        hra: req.hra,
        transport_allowance: req.transport_allowance,
        medical_allowance: req.medical_allowance,
        special_allowance: req.special_allowance,
        overtime_pay: req.overtime_pay,
        bonus: req.bonus,
        working_days: Some(working_days as i64),
        present_days: Some(present as i64),
        absent_days: tally.absent_days as i64,
        late_days: tally.late_days as i64,
        status: PayrollStatus::Draft.as_str().to_string(),
        payment_method: req.payment_method,
        notes: req.notes,
        created_by: Some(current.id.clone()),
        ..Default::default()
    };
    record.set_manual_deductions(&req.deductions);
    record.apply_figures(&figures);

    let id = payroll_db::insert(&state.db, &record)
        .await
        .map_err(conflict_on_duplicate(
            "Payroll already exists for this user and month",
        ))?;
    payroll_db::record_history(&state.db, &id, "created", &current.id, json!(figures)).await?;

    let record = load_payroll(&state, &id).await?;
    notify_payslip(&state, &record).await;
    info!(
        "Payroll {:02}/{} created for {} (net {:.2})",
        record.month, record.year, target.email, record.net_salary
    );
    Ok(created("Payroll created successfully", record))
}

/// POST /api/payroll/generate
///
/// Builds the month from the user's active salary structure.
pub async fn generate_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<GeneratePayrollRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, ADMIN_HR)?;

    let mut v = Validator::new();
    v.check(!req.user_id.is_empty(), "user_id", "\"user_id\" is required");
    validate_period(&mut v, req.month, req.year);
    if let Some(days) = req.inputs.working_days {
        v.int_range("working_days", days as i64, 1, 31);
    }
    v.non_negative("bonus", req.inputs.bonus)
        .non_negative("overtime_pay", req.inputs.overtime_pay);
    v.finish()?;

    let target = users::find_by_id(&state.db, &req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    check_hr_target(&current, &target)?;

    let structure = payroll_db::active_structure(&state.db, &target.id)
        .await?
        .ok_or_else(|| ApiError::not_found("No active salary structure found"))?;
    let components = structure.components();
    let generated = generate_from_structure(&components, &req.inputs);

    let mut record = PayrollRecord {
        user_id: target.id.clone(),
        month: req.month,
        year: req.year,
        salary: generated.salary,
        basic_salary: Some(generated.basic_salary),
        hra: components.hra,
        transport_allowance: components.transport_allowance,
        medical_allowance: components.medical_allowance,
        special_allowance: components.special_allowance,
        overtime_pay: generated.overtime_pay,
        bonus: generated.bonus,
        working_days: Some(generated.working_days as i64),
        present_days: Some(generated.present_days as i64),
        absent_days: generated.absent_days as i64,
        generated: true,
        status: PayrollStatus::Draft.as_str().to_string(),
        notes: req.notes,
        created_by: Some(current.id.clone()),
        ..Default::default()
    };
    record.set_manual_deductions(&generated.deductions);
    record.apply_figures(&generated.figures);

    let id = payroll_db::insert(&state.db, &record)
        .await
        .map_err(conflict_on_duplicate(
            "Payroll already exists for this user and month",
        ))?;
    payroll_db::record_history(
        &state.db,
        &id,
        "generated",
        &current.id,
        json!({ "salaryStructureId": structure.id, "figures": generated.figures }),
    )
    .await?;

    let record = load_payroll(&state, &id).await?;
    notify_payslip(&state, &record).await;
    Ok(created("Payroll generated successfully", record))
}

/// GET /api/payroll
pub async fn list_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PayrollListQuery>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let department = if current.role == Role::Manager {
        Some(current.department.clone())
    } else {
        query.department.map(Some)
    };
    let filter = PayrollFilter {
        department,
        month: query.month,
        year: query.year,
        status: query.status,
        ..Default::default()
    };
    let found = payroll_db::list(&state.db, &filter, clamp_limit(query.limit, DEFAULT_LIMIT)).await?;
    Ok(success(found))
}

/// GET /api/payroll/user/:user_id
pub async fn user_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<PayrollListQuery>,
) -> ApiResult<Json<Value>> {
    if !current.is_self_or_admin_hr(&user_id) {
        return Err(ApiError::forbidden("Not authorized to view this payroll"));
    }

    let filter = PayrollFilter {
        user_id: Some(user_id),
        month: query.month,
        year: query.year,
        status: query.status,
        ..Default::default()
    };
    let found = payroll_db::list(&state.db, &filter, clamp_limit(query.limit, DEFAULT_LIMIT)).await?;
    Ok(success(found))
}

/// GET /api/payroll/:id
pub async fn get_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = load_payroll(&state, &id).await?;
    if !current.is_self_or_admin_hr(&record.user_id) {
        return Err(ApiError::forbidden("Not authorized to view this payroll"));
    }
    Ok(success(record))
}

/// Gross, deductions and net from the record's current fields
///
/// Generated payrolls are priced from their components; manual ones from
/// the flat salary less attendance deductions.
fn recompute(record: &PayrollRecord, working_days: u32) -> PayrollFigures {
    let manual = record.manual_deductions();
    if record.generated {
        let allowances = record.hra
            + record.transport_allowance
            + record.medical_allowance
            + record.special_allowance;
        component_payroll(
            record.basic_salary.unwrap_or(0.0),
            allowances,
            record.overtime_pay,
            record.bonus,
            &manual,
        )
    } else {
        compute_payroll(record.salary, record.bonus, &manual, record.tally(), working_days)
    }
}

/// PUT /api/payroll/:id
///
/// Merges the given fields and recomputes gross, deductions and net.
/// Status changes go through `/process` and `/mark-paid`.
pub async fn update_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePayrollRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, ADMIN_HR)?;

    let mut v = Validator::new();
    if let Some(salary) = req.salary {
        v.positive("salary", salary);
    }
    for (field, value) in [
        ("bonus", req.bonus),
        ("overtime_pay", req.overtime_pay),
        ("tax_deduction", req.tax_deduction),
        ("provident_fund", req.provident_fund),
        ("professional_tax", req.professional_tax),
        ("insurance", req.insurance),
        ("loan_repayment", req.loan_repayment),
        ("advance_deduction", req.advance_deduction),
        ("other_deductions", req.other_deductions),
    ] {
        if let Some(value) = value {
            v.non_negative(field, value);
        }
    }
    v.finish()?;

    let mut record = load_payroll(&state, &id).await?;
    let changes = serde_json::to_value(&req).unwrap_or(Value::Null);

    record.salary = req.salary.unwrap_or(record.salary);
    record.basic_salary = req.basic_salary.or(record.basic_salary);
    record.hra = req.hra.unwrap_or(record.hra);
    record.transport_allowance = req.transport_allowance.unwrap_or(record.transport_allowance);
    record.medical_allowance = req.medical_allowance.unwrap_or(record.medical_allowance);
    record.special_allowance = req.special_allowance.unwrap_or(record.special_allowance);
    record.overtime_pay = req.overtime_pay.unwrap_or(record.overtime_pay);
    record.bonus = req.bonus.unwrap_or(record.bonus);

    let mut manual = record.manual_deductions();
    manual.tax_deduction = req.tax_deduction.unwrap_or(manual.tax_deduction);
    manual.provident_fund = req.provident_fund.unwrap_or(manual.provident_fund);
    manual.professional_tax = req.professional_tax.unwrap_or(manual.professional_tax);
    manual.insurance = req.insurance.unwrap_or(manual.insurance);
    manual.loan_repayment = req.loan_repayment.unwrap_or(manual.loan_repayment);
    manual.advance_deduction = req.advance_deduction.unwrap_or(manual.advance_deduction);
    manual.other_deductions = req.other_deductions.unwrap_or(manual.other_deductions);
    record.set_manual_deductions(&manual);

    if req.payment_method.is_some() {
        record.payment_method = req.payment_method;
    }
    if req.notes.is_some() {
        record.notes = req.notes;
    }

    let working_days = settings::payroll_working_days(&state.db).await?;
    record.apply_figures(&recompute(&record, working_days));

    payroll_db::save(&state.db, &record).await?;
    payroll_db::record_history(&state.db, &id, "updated", &current.id, changes).await?;

    Ok(success_with(
        "Payroll updated successfully",
        load_payroll(&state, &id).await?,
    ))
}

/// POST /api/payroll/:id/recalculate
///
/// Re-reads the month's attendance and recomputes deductions.
pub async fn recalculate_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, ADMIN_HR)?;

    let mut record = load_payroll(&state, &id).await?;
    let (year, month) = (record.year as i32, record.month as u32);
    let tally = attendance_db::month_tally(&state.db, &record.user_id, year, month).await?;
    let present = attendance_db::present_days(&state.db, &record.user_id, year, month).await?;
    let working_days = settings::payroll_working_days(&state.db).await?;

    let before = json!({
        "lateDays": record.late_days,
        "absentDays": record.absent_days,
        "netSalary": record.net_salary,
    });

    // Generated payrolls keep the attendance they were prorated with
    if !record.generated {
        record.late_days = tally.late_days as i64;
        record.absent_days = tally.absent_days as i64;
        record.present_days = Some(present as i64);
    }
    let figures = recompute(&record, working_days);
    record.apply_figures(&figures);

    payroll_db::save(&state.db, &record).await?;
    payroll_db::record_history(
        &state.db,
        &id,
        "recalculated",
        &current.id,
        json!({ "before": before, "after": figures }),
    )
    .await?;

    Ok(success_with(
        "Payroll recalculated successfully",
        load_payroll(&state, &id).await?,
    ))
}

/// PUT /api/payroll/:id/process
pub async fn process_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, ADMIN_HR)?;

    let mut record = load_payroll(&state, &id).await?;
    if record.status == PayrollStatus::Paid.as_str() || record.status == PayrollStatus::Cancelled.as_str() {
        return Err(ApiError::bad_request(format!(
            "Cannot process a {} payroll",
            record.status
        )));
    }

    record.status = PayrollStatus::Processed.as_str().to_string();
    record.processed_by = Some(current.id.clone());
    record.processed_at = Some(now_rfc3339());
    payroll_db::save(&state.db, &record).await?;
    payroll_db::record_history(&state.db, &id, "processed", &current.id, json!({ "status": "processed" }))
        .await?;

    Ok(success_with(
        "Payroll processed successfully",
        load_payroll(&state, &id).await?,
    ))
}

/// PUT /api/payroll/:id/mark-paid
pub async fn mark_paid(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    body: Option<ApiJson<MarkPaidRequest>>,
) -> ApiResult<Json<Value>> {
    require_role(&current, ADMIN_HR)?;
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();

    let payment_date = match req.payment_date {
        Some(date) => {
            let mut v = Validator::new();
            let parsed = v.date("payment_date", &date);
            v.finish()?;
            parsed.map(format_date).unwrap_or(date)
        }
        None => format_date(today()),
    };

    let mut record = load_payroll(&state, &id).await?;
    if record.status == PayrollStatus::Cancelled.as_str() {
        return Err(ApiError::bad_request("Cannot pay a cancelled payroll"));
    }

    record.status = PayrollStatus::Paid.as_str().to_string();
    record.payment_date = Some(payment_date.clone());
    if req.payment_method.is_some() {
        record.payment_method = req.payment_method;
    }
    payroll_db::save(&state.db, &record).await?;
    payroll_db::record_history(
        &state.db,
        &id,
        "paid",
        &current.id,
        json!({ "status": "paid", "paymentDate": payment_date }),
    )
    .await?;

    let content = NewNotification::new(
        "payroll",
        "Salary Paid",
        format!(
            "Your salary for {:02}/{} has been paid",
            record.month, record.year
        ),
    )
    .kind("success")
    .link("/payroll");
    state.notifier().notify_quietly(&record.user_id, &content).await;

    Ok(success_with(
        "Payroll marked as paid",
        load_payroll(&state, &id).await?,
    ))
}

/// DELETE /api/payroll/:id
pub async fn delete_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;
    if !payroll_db::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Payroll record not found"));
    }
    Ok(success_with("Payroll deleted successfully", Value::Null))
}

/// GET /api/payroll/stats
pub async fn payroll_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PayrollStatsQuery>,
) -> ApiResult<Json<Value>> {
    let mut filter = PayrollFilter {
        month: query.month,
        year: query.year,
        ..Default::default()
    };
    match current.role {
        Role::Admin | Role::Hr => filter.user_id = query.user_id,
        Role::Manager => filter.department = Some(current.department.clone()),
        Role::Employee | Role::Candidate => filter.user_id = Some(current.id.clone()),
    }

    let rows = payroll_db::summary_rows(&state.db, &filter).await?;
    Ok(success(PayrollStats::from_rows(&rows)))
}

/// GET /api/payroll/department-summary
pub async fn payroll_department_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PayrollStatsQuery>,
) -> ApiResult<Json<Value>> {
    require_role(&current, ADMIN_HR)?;

    let (Some(month), Some(year)) = (query.month, query.year) else {
        return Err(ApiError::bad_request("Month and year are required"));
    };
    let filter = PayrollFilter {
        month: Some(month),
        year: Some(year),
        ..Default::default()
    };
    let rows = payroll_db::summary_rows(&state.db, &filter).await?;
    Ok(success(department_summary(&rows)))
}

/// GET /api/payroll/history/:id
pub async fn payroll_history(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, ADMIN_HR)?;
    load_payroll(&state, &id).await?;
    Ok(success(payroll_db::history(&state.db, &id).await?))
}

/// GET /api/payroll/salary-structure/:user_id
pub async fn get_salary_structure(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !current.is_self_or_admin_hr(&user_id) {
        return Err(ApiError::forbidden("Not authorized to view this salary structure"));
    }
    let structure = payroll_db::active_structure(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No active salary structure found"))?;
    Ok(success(structure))
}

/// POST /api/payroll/salary-structure
///
/// Supersedes any structure the user already has.
pub async fn create_salary_structure(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<SalaryStructureRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, ADMIN_HR)?;

    let c = &req.components;
    let mut v = Validator::new();
    v.check(!req.user_id.is_empty(), "user_id", "\"user_id\" is required")
        .positive("basic_salary", c.basic_salary)
        .non_negative("hra", c.hra)
        .non_negative("transport_allowance", c.transport_allowance)
        .non_negative("medical_allowance", c.medical_allowance)
        .non_negative("special_allowance", c.special_allowance)
        .non_negative("professional_tax", c.professional_tax)
        .non_negative("insurance", c.insurance);
    if let Some(pf) = c.provident_fund_percent {
        v.check(
            (0.0..=100.0).contains(&pf),
            "provident_fund_percent",
            "\"provident_fund_percent\" must be between 0 and 100",
        );
    }
    let effective_from = match &req.effective_from {
        Some(date) => v.date("effective_from", date),
        None => Some(today()),
    };
    v.finish()?;

    users::find_by_id(&state.db, &req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let effective_from = effective_from.map(format_date).unwrap_or_default();
    let structure = payroll_db::replace_structure(
        &state.db,
        &req.user_id,
        &req.components,
        &effective_from,
        &current.id,
    )
    .await?;

    Ok(created("Salary structure saved successfully", structure))
}
