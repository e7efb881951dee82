//! Request field validation
//!
//! Handlers collect every failing field before rejecting a request so the
//! client sees all problems at once.

use crate::time::parse_date;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// One failed field rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All failed rules for one request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation error")]
pub struct ValidationErrors(pub Vec<FieldError>);

/// Accumulates field errors
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless `ok` holds
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.into(),
            });
        }
        self
    }

    pub fn required<T>(&mut self, field: &str, value: Option<&T>) -> &mut Self {
        self.check(value.is_some(), field, format!("\"{}\" is required", field))
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        self.check(
            value.trim().chars().count() >= min,
            field,
            format!("\"{}\" must be at least {} characters long", field, min),
        )
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            is_valid_email(value),
            field,
            format!("\"{}\" must be a valid email", field),
        )
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        self.check(
            allowed.contains(&value),
            field,
            format!("\"{}\" must be one of [{}]", field, allowed.join(", ")),
        )
    }

    pub fn int_range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        self.check(
            (min..=max).contains(&value),
            field,
            format!("\"{}\" must be between {} and {}", field, min, max),
        )
    }

    pub fn positive(&mut self, field: &str, value: f64) -> &mut Self {
        self.check(
            value.is_finite() && value > 0.0,
            field,
            format!("\"{}\" must be a positive number", field),
        )
    }

    pub fn non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        self.check(
            value.is_finite() && value >= 0.0,
            field,
            format!("\"{}\" must be greater than or equal to 0", field),
        )
    }

    /// Parse a `YYYY-MM-DD` field, recording an error when it is malformed
    pub fn date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        match parse_date(value) {
            Ok(date) => Some(date),
            Err(_) => {
                self.check(false, field, format!("\"{}\" must be a valid date (YYYY-MM-DD)", field));
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&mut self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(std::mem::take(&mut self.errors)))
        }
    }
}

/// Minimal structural email check: `local@domain.tld`, no whitespace
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("ada@.com"));
    }

    #[test]
    fn test_validator_collects_all_errors() {
        let mut v = Validator::new();
        v.min_len("name", "A", 2)
            .email("email", "nope")
            .min_len("password", "12345", 6)
            .one_of("status", "present", &["present", "absent"]);
        let err = v.finish().unwrap_err();
        let fields: Vec<_> = err.0.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email", "password"]);
    }

    #[test]
    fn test_validator_ok_when_clean() {
        let mut v = Validator::new();
        v.int_range("month", 12, 1, 12).positive("salary", 1.0);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_validator_date_field() {
        let mut v = Validator::new();
        assert!(v.date("start_date", "2024-01-15").is_some());
        assert!(v.date("end_date", "2024-13-01").is_none());
        assert_eq!(v.finish().unwrap_err().0[0].field, "end_date");
    }

    #[test]
    fn test_required_and_ranges() {
        let mut v = Validator::new();
        let missing: Option<&String> = None;
        v.required("user_id", missing)
            .int_range("year", 1999, 2000, 2100)
            .positive("salary", 0.0)
            .non_negative("bonus", -1.0);
        assert_eq!(v.finish().unwrap_err().0.len(), 4);
    }
}
