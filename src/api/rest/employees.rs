use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::forms;
use crate::engine::pin::{generate_unique_pin, validate_pin};
use crate::error::AppError;
use crate::models::employee::Employee;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/employees", post(register_employee))
}

#[derive(Deserialize)]
pub struct RegisterEmployeeRequest {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub job_title: String,
    pub pharmacy_pin: String,
}

#[derive(Serialize)]
pub struct RegisteredEmployee {
    pub employee: Employee,
    pub pin: String,
}

async fn register_employee(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterEmployeeRequest>,
) -> Result<Json<RegisteredEmployee>, AppError> {
    let pharmacy_pin = payload.pharmacy_pin.trim();
    validate_pin(pharmacy_pin)?;
    let full_name = forms::required("full name", &payload.full_name)?;
    let job_title = forms::required("job title", &payload.job_title)?;

    let pharmacy = state
        .pharmacies
        .iter()
        .find(|pharmacy| pharmacy.active && pharmacy.pin == pharmacy_pin)
        .map(|pharmacy| pharmacy.clone())
        .ok_or(AppError::InvalidPin)?;

    // PIN draw and insert must not interleave with another registration.
    let _guard = state.workflow_guard.lock().await;
    let employee = Employee {
        id: Uuid::new_v4(),
        full_name,
        email: forms::email(payload.email).unwrap_or_default(),
        job_title,
        pharmacy_id: pharmacy.id,
        pharmacy_name: pharmacy.name.clone(),
        pin: generate_unique_pin(&state)?,
        active: true,
        created_at: Utc::now(),
    };

    state.employees.insert(employee.id, employee.clone());
    info!(employee_id = %employee.id, pharmacy_id = %pharmacy.id, "employee registered");

    Ok(Json(RegisteredEmployee {
        pin: employee.pin.clone(),
        employee,
    }))
}
