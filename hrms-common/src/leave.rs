//! Leave request vocabulary, approval hierarchy and statistics

use crate::roles::Role;
use crate::time::inclusive_days;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

pub const LEAVE_TYPES: [&str; 6] = ["sick", "casual", "annual", "maternity", "paternity", "unpaid"];

pub const LEAVE_STATUSES: [&str; 4] = ["pending", "approved", "rejected", "cancelled"];

/// Why an approver may not decide a leave request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDenied {
    /// Approver filed the request
    SelfApproval,
    /// Manager acting on an hr or admin request
    AboveManager,
    /// Approver is not admin, hr or manager
    NotManagement,
}

/// Check whether `approver` may approve or reject a request filed by `requester`
pub fn check_approval(
    approver_id: &str,
    approver_role: Role,
    requester_id: &str,
    requester_role: Role,
) -> Result<(), ApprovalDenied> {
    if !approver_role.is_management() {
        return Err(ApprovalDenied::NotManagement);
    }
    if approver_id == requester_id {
        return Err(ApprovalDenied::SelfApproval);
    }
    if approver_role == Role::Manager && requester_role.is_admin_or_hr() {
        return Err(ApprovalDenied::AboveManager);
    }
    Ok(())
}

/// Roles whose requests a manager may see
pub fn visible_to_manager(requester_role: Role) -> bool {
    matches!(requester_role, Role::Employee | Role::Manager)
}

/// Leave fields needed for statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveSummaryRow {
    pub leave_type: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Aggregate leave statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveStats {
    pub total_requests: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
    pub cancelled: usize,
    /// Inclusive calendar days across approved requests
    pub total_days: i64,
    pub leave_types: BTreeMap<String, usize>,
    /// Requests per start month (1-12)
    pub monthly_breakdown: BTreeMap<u32, usize>,
}

impl LeaveStats {
    pub fn from_rows(rows: &[LeaveSummaryRow]) -> Self {
        let count = |status: &str| rows.iter().filter(|r| r.status == status).count();

        let total_days = rows
            .iter()
            .filter(|r| r.status == "approved")
            .map(|r| inclusive_days(r.start_date, r.end_date).max(0))
            .sum();

        let mut leave_types = BTreeMap::new();
        let mut monthly_breakdown = BTreeMap::new();
        for row in rows {
            *leave_types.entry(row.leave_type.clone()).or_insert(0) += 1;
            *monthly_breakdown.entry(row.start_date.month()).or_insert(0) += 1;
        }

        Self {
            total_requests: rows.len(),
            approved: count("approved"),
            pending: count("pending"),
            rejected: count("rejected"),
            cancelled: count("cancelled"),
            total_days,
            leave_types,
            monthly_breakdown,
        }
    }
}
