//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use onramp_core::workflow::engine::EngineError;
use onramp_types::error::EmployeeError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Employee-related errors.
    Employee(EmployeeError),
    /// Validation error (malformed request payload).
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<EmployeeError> for AppError {
    fn from(e: EmployeeError) -> Self {
        AppError::Employee(e)
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::EmployeeNotFound(_) => AppError::Employee(EmployeeError::NotFound),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Employee(EmployeeError::NotFound) => (
                StatusCode::NOT_FOUND,
                "EMPLOYEE_NOT_FOUND",
                "Employee not found".to_string(),
            ),
            AppError::Employee(EmployeeError::EmailConflict(email)) => (
                StatusCode::CONFLICT,
                "EMAIL_CONFLICT",
                format!("Employee with email '{email}' already exists"),
            ),
            AppError::Employee(
                e @ (EmployeeError::InvalidEmail(_)
                | EmployeeError::InvalidName(_)
                | EmployeeError::InvalidStartDate(_)),
            ) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Employee(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "EMPLOYEE_ERROR",
                e.to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
