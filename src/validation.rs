use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Serialize;
use tracing::instrument;
use validator::ValidateEmail;

use crate::error::{AppError, ValidationError};

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$").expect("phone pattern compiles"));

#[derive(Debug, Serialize, Clone)]
pub struct ValidationResponse {
    pub status: &'static str,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error",
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API error");
        let status = self.status_code();

        let response = match self {
            AppError::Validation(ValidationError::Fields(fields)) => {
                ValidationResponse::new(fields.into_iter().collect())
            }
            AppError::Validation(ValidationError::Duplicate { message, .. }) => {
                ValidationResponse::with_error("duplicate", &message)
            }
            AppError::NotFound(msg) => {
                ValidationResponse::with_error("resource", &format!("Not found: {}", msg))
            }
            AppError::Load(err) => ValidationResponse::with_error("source", &err.to_string()),
            AppError::Unsupported(msg) => ValidationResponse::with_error("operation", &msg),
            AppError::Internal(_) => {
                ValidationResponse::with_error("server", "Internal server error")
            }
        };

        Custom(status, Json(response))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            404 => ("resource", "Resource not found"),
            400 => ("request", "Bad request"),
            422 => ("request", "Request body could not be parsed"),
            500 => ("server", "Internal server error"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

impl From<AppError> for Custom<Json<ValidationResponse>> {
    fn from(error: AppError) -> Self {
        error.to_validation_response()
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = std::collections::BTreeMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            fields.insert(wire_name(&field), messages);
        }

        ValidationError::Fields(fields)
    }
}

/// Form fields are reported under their camelCase request names.
fn wire_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            name.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

// Blank strings count as missing.
pub fn required(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("required").with_message("is required".into()));
    }
    Ok(())
}

pub fn required_email(value: &str) -> Result<(), validator::ValidationError> {
    required(value)?;
    optional_email(value)
}

pub fn optional_email(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() || value.trim().to_string().validate_email() {
        return Ok(());
    }
    Err(validator::ValidationError::new("email")
        .with_message("must be a valid email address".into()))
}

pub fn optional_phone(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() || PHONE_PATTERN.is_match(value.trim()) {
        return Ok(());
    }
    Err(validator::ValidationError::new("phone")
        .with_message("must be a valid phone number".into()))
}
