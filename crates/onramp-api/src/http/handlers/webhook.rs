//! Webhook receiver handlers for external service callbacks.
//!
//! Payloads are validated field by field so a missing or malformed field
//! yields a clean 400 with no state mutated. Acknowledgment is decoupled
//! from processing: events for unknown employees are acknowledged with
//! `"processed": false` rather than an error, so delivery keeps succeeding
//! for callers that only check status codes.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use onramp_core::workflow::resume::{DocumentStatusEvent, QuizResultEvent};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/webhooks/document-status - Document lifecycle callback.
///
/// Payload: `{employee_id, document_kind ∈ {policy, nda, guidelines},
/// status ∈ {sent, signed}}`.
pub async fn document_status(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let event = DocumentStatusEvent {
        employee_id: parse_field(&payload, "employee_id")?,
        document: parse_field(&payload, "document_kind")?,
        status: parse_field(&payload, "status")?,
    };

    let disposition = state
        .dispatcher
        .on_document_status(event)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({
            "status": "received",
            "processed": disposition.processed(),
        }),
        request_id,
        elapsed,
    )))
}

/// POST /api/v1/webhooks/quiz-status - Quiz result callback.
///
/// Payload: `{employee_id, quiz_kind ∈ {policy, nda, guidelines}, score,
/// passed}`. The attempt is recorded regardless of pass/fail.
pub async fn quiz_status(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let event = QuizResultEvent {
        employee_id: parse_field(&payload, "employee_id")?,
        quiz: parse_field(&payload, "quiz_kind")?,
        score: parse_field(&payload, "score")?,
        passed: parse_field(&payload, "passed")?,
    };

    let disposition = state
        .dispatcher
        .on_quiz_result(event)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({
            "status": "received",
            "processed": disposition.processed(),
        }),
        request_id,
        elapsed,
    )))
}

/// Extract and deserialize one required field from a webhook payload.
fn parse_field<T: DeserializeOwned>(payload: &Value, field: &str) -> Result<T, AppError> {
    let value = payload
        .get(field)
        .cloned()
        .ok_or_else(|| AppError::Validation(format!("missing required field '{field}'")))?;
    serde_json::from_value(value)
        .map_err(|_| AppError::Validation(format!("invalid value for field '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use onramp_types::onboarding::{DocumentKind, QuizKind};

    #[test]
    fn parse_field_extracts_typed_values() {
        let payload = json!({
            "employee_id": "018f4e9a-0000-7000-8000-000000000001",
            "document_kind": "nda",
            "quiz_kind": "policy",
            "score": 90,
            "passed": true,
        });

        let id: Uuid = parse_field(&payload, "employee_id").unwrap();
        assert_eq!(id.to_string(), "018f4e9a-0000-7000-8000-000000000001");
        let document: DocumentKind = parse_field(&payload, "document_kind").unwrap();
        assert_eq!(document, DocumentKind::Nda);
        let quiz: QuizKind = parse_field(&payload, "quiz_kind").unwrap();
        assert_eq!(quiz, QuizKind::Policy);
        let score: u32 = parse_field(&payload, "score").unwrap();
        assert_eq!(score, 90);
        let passed: bool = parse_field(&payload, "passed").unwrap();
        assert!(passed);
    }

    #[test]
    fn parse_field_rejects_missing_and_invalid() {
        let payload = json!({"document_kind": "passport"});

        let missing = parse_field::<Uuid>(&payload, "employee_id").unwrap_err();
        assert!(matches!(missing, AppError::Validation(_)));

        let invalid = parse_field::<DocumentKind>(&payload, "document_kind").unwrap_err();
        assert!(matches!(invalid, AppError::Validation(_)));
    }
}
