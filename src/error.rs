use std::collections::BTreeMap;
use std::time::Duration;

use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::models::EntityKind;
use crate::source::Collection;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", summarize(.0))]
    Fields(BTreeMap<String, Vec<String>>),

    #[error("{message}")]
    Duplicate { kind: EntityKind, message: String },
}

impl ValidationError {
    pub fn field(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        ValidationError::Fields(fields)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        match self {
            ValidationError::Fields(fields) => fields.get(field).map(Vec::as_slice).unwrap_or(&[]),
            ValidationError::Duplicate { .. } => &[],
        }
    }
}

fn summarize(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not parse {collection}: {message}")]
    Parse {
        collection: Collection,
        message: String,
    },

    #[error("Invalid fixture document: {0}")]
    InvalidDocument(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Not available: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Validation(err) => {
                warn!(message = %err, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Load(err) => {
                error!(error = %err, context = %ctx, "Load error");
                "load_error"
            }
            AppError::Unsupported(msg) => {
                warn!(message = %msg, context = %ctx, "Unsupported operation");
                "unsupported_operation"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if let AppError::Load(_) | AppError::Internal(_) = self {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Validation(ValidationError::Fields(_)) => Status::UnprocessableEntity,
            AppError::Validation(ValidationError::Duplicate { .. }) => Status::Conflict,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Load(_) => Status::ServiceUnavailable,
            AppError::Unsupported(_) => Status::NotImplemented,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::from(errors))
    }
}
