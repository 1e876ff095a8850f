//! Field checks shared by request inputs

use chrono::{DateTime, NaiveDateTime};

use crate::engine::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Trimmed value of a required text field.
pub fn required<'a>(value: Option<&'a str>, field: &str) -> AppResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(format!("{} is required", field))),
    }
}

/// Empty or whitespace-only optional text becomes `None`.
pub fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `local@domain.tld` with no whitespace and a dot after the `@`.
pub fn is_email(value: &str) -> bool {
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
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn email(value: &str) -> AppResult<&str> {
    if is_email(value) {
        Ok(value)
    } else {
        Err(AppError::validation("Invalid email"))
    }
}

pub fn password(value: &str) -> AppResult<&str> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(value)
}

/// Appointment timestamps: `YYYY-MM-DDTHH:MM[:SS]` (also with a space) or RFC 3339.
/// Offsets are normalized to UTC.
pub fn appointment_date(value: &str) -> AppResult<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .map_err(|_| AppError::validation(format!("Invalid appointment date: {}", value)))
}
