//! Employee handlers for the REST API.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use onramp_types::employee::CreateEmployeeRequest;
use onramp_types::onboarding::OnboardingStatusView;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/employees - Create a new employee.
pub async fn create_employee(
    State(state): State<AppState>,
    Json(body): Json<CreateEmployeeRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let employee = state.employee_service.create(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let employee_json = serde_json::to_value(&employee).unwrap();
    let resp = ApiResponse::success(employee_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/employees/{}", employee.id))
        .with_link("start", "/api/v1/onboarding/start");

    Ok(Json(resp))
}

/// GET /api/v1/employees - List all employees with progress.
pub async fn list_employees(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let employees = state.employee_service.list().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let employees_json: Vec<serde_json::Value> = employees
        .iter()
        .map(|e| {
            let mut value = serde_json::to_value(e).unwrap();
            value["progress"] = json!(e.onboarding.progress());
            value
        })
        .collect();

    let resp = ApiResponse::success(employees_json, request_id, elapsed)
        .with_link("self", "/api/v1/employees");

    Ok(Json(resp))
}

/// GET /api/v1/employees/:id - Get an employee by ID.
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id: Uuid = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid employee id '{id}'")))?;
    let employee = state.employee_service.get(&id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let mut employee_json = serde_json::to_value(&employee).unwrap();
    employee_json["progress"] = json!(employee.onboarding.progress());
    employee_json["onboarding_view"] =
        serde_json::to_value(OnboardingStatusView::from(&employee.onboarding)).unwrap();

    let resp = ApiResponse::success(employee_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/employees/{}", employee.id));

    Ok(Json(resp))
}
