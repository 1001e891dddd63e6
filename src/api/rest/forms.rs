//! Input cleanup shared by the registration handlers. Free text is stored
//! upper-cased, emails lower-cased.

use crate::error::AppError;

pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    let cleaned = value.trim().to_uppercase();
    if cleaned.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(cleaned)
}

pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_uppercase())
        .filter(|value| !value.is_empty())
}

pub fn email(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}
