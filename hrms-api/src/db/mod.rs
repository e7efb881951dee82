//! Database access for hrms-api
//!
//! Row types and the queries shared between handlers. Handler-local
//! queries stay next to their handlers.

pub mod applications;
pub mod attendance;
pub mod audit;
pub mod jobs;
pub mod payroll;
pub mod users;
