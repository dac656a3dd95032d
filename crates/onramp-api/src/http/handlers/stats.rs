//! Dashboard statistics handler.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use onramp_types::onboarding::StepName;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/stats - Employee counts and progress distribution.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let employees = state.employee_service.list().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let mut distribution: BTreeMap<String, u32> = BTreeMap::new();
    for employee in &employees {
        let bucket = format!(
            "{}%",
            employee.onboarding.completed_count() * 100 / StepName::ALL.len()
        );
        *distribution.entry(bucket).or_insert(0) += 1;
    }

    let completed = employees
        .iter()
        .filter(|e| e.onboarding.completed_at.is_some())
        .count();
    let in_flight = employees
        .iter()
        .filter(|e| e.workflow_token.is_some() && e.onboarding.completed_at.is_none())
        .count();

    let resp = ApiResponse::success(
        json!({
            "total_employees": employees.len(),
            "completed": completed,
            "in_flight": in_flight,
            "progress_distribution": distribution,
        }),
        request_id,
        elapsed,
    );

    Ok(Json(resp))
}
