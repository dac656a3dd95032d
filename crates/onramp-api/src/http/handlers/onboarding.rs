//! Onboarding workflow handlers: enrollment trigger and status query.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use onramp_types::onboarding::OnboardingStatusView;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartOnboardingRequest {
    pub employee_id: Option<Uuid>,
}

/// POST /api/v1/onboarding/start - Start the onboarding workflow.
///
/// Assigns a fresh workflow-instance token and returns it immediately; the
/// pipeline itself advances in a background task so enrollment never
/// blocks on document dispatch.
pub async fn start_onboarding(
    State(state): State<AppState>,
    Json(body): Json<StartOnboardingRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let employee_id = body
        .employee_id
        .ok_or_else(|| AppError::Validation("employee_id is required".to_string()))?;

    // 404 before any state is touched.
    let employee = state.employee_service.get(&employee_id).await?;

    let token = state.engine.start(&employee_id).await?;

    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        match engine.advance(employee_id).await {
            Ok(outcome) => {
                tracing::info!(
                    employee_id = %employee_id,
                    outcome = ?outcome,
                    "initial workflow advance finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    employee_id = %employee_id,
                    error = %e,
                    "initial workflow advance failed"
                );
            }
        }
    });

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({
            "message": "Onboarding workflow started",
            "employee_id": employee.id,
            "workflow_token": token,
        }),
        request_id,
        elapsed,
    )
    .with_link("status", &format!("/api/v1/onboarding/status/{token}"))
    .with_link("employee", &format!("/api/v1/employees/{}", employee.id));

    Ok(Json(resp))
}

/// GET /api/v1/onboarding/status/:token - Workflow status by instance token.
pub async fn get_onboarding_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let token: Uuid = token
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid workflow token '{token}'")))?;
    let employee = state.employee_service.get_by_token(&token).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let view = OnboardingStatusView::from(&employee.onboarding);
    let resp = ApiResponse::success(
        json!({
            "workflow_token": token,
            "employee_id": employee.id,
            "employee_name": employee.name,
            "progress": view.progress,
            "status": view,
        }),
        request_id,
        elapsed,
    )
    .with_link("employee", &format!("/api/v1/employees/{}", employee.id));

    Ok(Json(resp))
}
