//! hrms-common - Shared domain rules for the HR management service
//!
//! Everything here is free of HTTP concerns so the same rules can be
//! exercised from handlers, background jobs and tests:
//! - role matrix and password/token primitives
//! - working-day calendar helpers
//! - attendance, payroll and leave calculators
//! - deterministic resume screening
//! - database bootstrap and the in-process event bus

pub mod ats;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod leave;
pub mod payroll;
pub mod roles;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
