//! Roles and the role → resource → action permission matrix

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Account role, stored as a lowercase string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hr,
    Manager,
    Employee,
    Candidate,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Hr,
        Role::Manager,
        Role::Employee,
        Role::Candidate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Manager => "manager",
            Role::Employee => "employee",
            Role::Candidate => "candidate",
        }
    }

    /// admin, hr and manager
    pub fn is_management(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::Manager)
    }

    /// admin and hr
    pub fn is_admin_or_hr(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "hr" => Ok(Role::Hr),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            "candidate" => Ok(Role::Candidate),
            other => Err(crate::Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Human-readable list used in 403 messages: "admin or hr"
pub fn describe_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Resource/action grants for one role
fn grants(role: Role) -> &'static [(&'static str, &'static [&'static str])] {
    const CRUD: &[&str] = &["create", "read", "update", "delete"];
    match role {
        Role::Admin => &[
            ("users", CRUD),
            ("departments", CRUD),
            ("attendance", CRUD),
            ("payroll", CRUD),
            ("performance", CRUD),
            ("jobs", CRUD),
            ("applications", CRUD),
            ("leaves", &["create", "read", "update", "delete", "approve"]),
            ("events", CRUD),
            ("notifications", CRUD),
            ("documents", CRUD),
            ("dashboard", &["view_all", "view_analytics"]),
        ],
        Role::Manager => &[
            ("users", &["read", "update"]),
            ("departments", &["read"]),
            ("attendance", &["read", "update"]),
            ("payroll", &["read"]),
            ("performance", &["create", "read", "update"]),
            ("jobs", &["create", "read", "update"]),
            ("applications", &["read", "update"]),
            ("leaves", &["read", "approve", "reject"]),
            ("events", CRUD),
            ("notifications", &["read"]),
            ("documents", &["read", "create"]),
            ("dashboard", &["view_team", "view_analytics"]),
        ],
        Role::Hr => &[
            ("users", &["create", "read", "update"]),
            ("departments", &["read"]),
            ("attendance", &["read", "update"]),
            ("payroll", &["create", "read", "update"]),
            ("performance", &["read"]),
            ("jobs", CRUD),
            ("applications", &["read", "update", "delete"]),
            ("leaves", &["read", "approve", "reject"]),
            ("events", CRUD),
            ("notifications", &["read"]),
            ("documents", CRUD),
            ("dashboard", &["view_hr", "view_analytics"]),
        ],
        Role::Employee => &[
            ("users", &["read_self"]),
            ("departments", &["read"]),
            ("attendance", &["create", "read_self"]),
            ("payroll", &["read_self"]),
            ("performance", &["read_self"]),
            ("jobs", &["read"]),
            ("applications", &["create", "read_self", "update_self"]),
            ("leaves", &["create", "read_self", "update_self"]),
            ("events", &["read"]),
            ("notifications", &["read"]),
            ("documents", &["read_self", "create_self"]),
            ("dashboard", &["view_self"]),
        ],
        Role::Candidate => &[
            ("users", &["read_self"]),
            ("jobs", &["read"]),
            ("applications", &["create", "read_self", "update_self"]),
            ("events", &["read"]),
            ("notifications", &["read"]),
            ("documents", &["create_self", "read_self"]),
            ("dashboard", &["view_self"]),
        ],
    }
}

/// Check whether `role` may perform `action` on `resource`
pub fn has_permission(role: Role, resource: &str, action: &str) -> bool {
    grants(role)
        .iter()
        .find(|(name, _)| *name == resource)
        .map(|(_, actions)| actions.contains(&action))
        .unwrap_or(false)
}

/// Full permission map for a role, keyed by resource
pub fn role_permissions(role: Role) -> BTreeMap<&'static str, Vec<&'static str>> {
    grants(role)
        .iter()
        .map(|(resource, actions)| (*resource, actions.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("HR".parse::<Role>().unwrap(), Role::Hr);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_management_groups() {
        assert!(Role::Manager.is_management());
        assert!(!Role::Manager.is_admin_or_hr());
        assert!(!Role::Employee.is_management());
        assert!(Role::Hr.is_admin_or_hr());
    }

    #[test]
    fn test_has_permission_matrix() {
        assert!(has_permission(Role::Admin, "payroll", "delete"));
        assert!(!has_permission(Role::Hr, "payroll", "delete"));
        assert!(has_permission(Role::Manager, "leaves", "approve"));
        assert!(has_permission(Role::Employee, "attendance", "create"));
        assert!(!has_permission(Role::Employee, "attendance", "read"));
        assert!(!has_permission(Role::Candidate, "departments", "read"));
        assert!(!has_permission(Role::Admin, "unknown", "read"));
    }

    #[test]
    fn test_role_permissions_lists_resources() {
        let perms = role_permissions(Role::Candidate);
        assert_eq!(perms.len(), 7);
        assert_eq!(perms["jobs"], vec!["read"]);
    }

    #[test]
    fn test_describe_roles() {
        assert_eq!(describe_roles(&[Role::Admin, Role::Hr]), "admin or hr");
    }
}
