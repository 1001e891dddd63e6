use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::forms;
use crate::api::rest::pharmacies::find_pharmacy;
use crate::engine::inventory::customer_pump_history;
use crate::engine::workflow::{active_employee, snapshot_orders};
use crate::error::AppError;
use crate::models::customer::Customer;
use crate::models::employee::Employee;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/pharmacies/:id/customers",
            post(register_customer).get(list_customers),
        )
        .route("/customers/:id", delete(deactivate_customer))
        .route(
            "/customers/:id/reminder",
            put(set_return_reminder).delete(clear_return_reminder),
        )
        .route("/customers/:id/pumps", get(customer_pumps))
}

#[derive(Deserialize)]
pub struct RegisterCustomerRequest {
    pub employee_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub representative: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct EmployeeQuery {
    pub employee_id: Uuid,
}

#[derive(Deserialize)]
pub struct ReminderRequest {
    pub employee_id: Uuid,
    pub note: String,
}

#[derive(Serialize)]
pub struct CustomerPumps {
    pub customer_id: Uuid,
    pub pump_numbers: Vec<String>,
}

fn employee_for_pharmacy(
    state: &AppState,
    employee_id: Uuid,
    pharmacy_id: Uuid,
) -> Result<Employee, AppError> {
    let employee = active_employee(state, employee_id)?;
    if employee.pharmacy_id != pharmacy_id {
        return Err(AppError::Forbidden(
            "employee cannot manage this pharmacy".to_string(),
        ));
    }
    Ok(employee)
}

fn find_customer(state: &AppState, id: Uuid) -> Result<Customer, AppError> {
    state
        .customers
        .get(&id)
        .map(|customer| customer.clone())
        .ok_or_else(|| AppError::NotFound(format!("customer {id} not found")))
}

async fn register_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RegisterCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    find_pharmacy(&state, id)?;
    let employee = employee_for_pharmacy(&state, payload.employee_id, id)?;

    let customer = Customer {
        id: Uuid::new_v4(),
        pharmacy_id: id,
        name: forms::required("customer name", &payload.name)?,
        representative: forms::optional(payload.representative),
        email: forms::email(payload.email),
        country: forms::required("country", &payload.country)?,
        state: forms::required("state", &payload.state)?,
        city: forms::required("city", &payload.city)?,
        address: forms::optional(payload.address),
        return_reminder_note: String::new(),
        return_reminder_at: None,
        return_reminder_by: None,
        active: true,
        created_by: employee.full_name,
        created_at: Utc::now(),
    };

    state.customers.insert(customer.id, customer.clone());
    info!(customer_id = %customer.id, pharmacy_id = %id, "customer registered");

    Ok(Json(customer))
}

async fn list_customers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Customer>>, AppError> {
    find_pharmacy(&state, id)?;

    let mut customers: Vec<Customer> = state
        .customers
        .iter()
        .filter(|customer| customer.pharmacy_id == id && customer.active)
        .map(|entry| entry.value().clone())
        .collect();
    customers.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(customers))
}

async fn deactivate_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<Customer>, AppError> {
    let customer = find_customer(&state, id)?;
    employee_for_pharmacy(&state, query.employee_id, customer.pharmacy_id)?;

    let mut customer = state
        .customers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("customer {id} not found")))?;
    customer.active = false;
    info!(customer_id = %id, "customer deactivated");

    Ok(Json(customer.clone()))
}

async fn set_return_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReminderRequest>,
) -> Result<Json<Customer>, AppError> {
    let note = payload.note.trim().to_uppercase();
    write_reminder(&state, id, payload.employee_id, note)
}

async fn clear_return_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<Customer>, AppError> {
    write_reminder(&state, id, query.employee_id, String::new())
}

fn write_reminder(
    state: &AppState,
    id: Uuid,
    employee_id: Uuid,
    note: String,
) -> Result<Json<Customer>, AppError> {
    let customer = find_customer(state, id)?;
    let employee = employee_for_pharmacy(state, employee_id, customer.pharmacy_id)?;

    let mut customer = state
        .customers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("customer {id} not found")))?;
    customer.return_reminder_note = note;
    customer.return_reminder_at = Some(Utc::now());
    customer.return_reminder_by = Some(employee.full_name);

    Ok(Json(customer.clone()))
}

async fn customer_pumps(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerPumps>, AppError> {
    let customer = find_customer(&state, id)?;
    let pump_numbers =
        customer_pump_history(&snapshot_orders(&state), customer.pharmacy_id, customer.id);

    Ok(Json(CustomerPumps {
        customer_id: customer.id,
        pump_numbers,
    }))
}
