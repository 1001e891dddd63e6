use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::forms;
use crate::engine::inventory::delivery_backups;
use crate::engine::pin::generate_unique_pin;
use crate::engine::tracking::{active_drivers, DriverPosition};
use crate::engine::workflow::snapshot_orders;
use crate::error::AppError;
use crate::models::movement::PumpMovement;
use crate::models::order::Order;
use crate::models::pharmacy::Pharmacy;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pharmacies", post(register_pharmacy))
        .route("/pharmacies/:id", get(get_pharmacy))
        .route("/pharmacies/:id/orders", get(list_orders))
        .route("/pharmacies/:id/deliveries", get(list_delivery_backups))
        .route("/pharmacies/:id/tracking", get(list_active_drivers))
        .route("/pharmacies/:id/movements", get(list_movements))
}

#[derive(Deserialize)]
pub struct RegisterPharmacyRequest {
    pub name: String,
    pub license_code: String,
    #[serde(default)]
    pub email: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct RegisteredPharmacy {
    pub pharmacy: Pharmacy,
    pub pin: String,
}

pub(crate) fn find_pharmacy(state: &AppState, id: Uuid) -> Result<Pharmacy, AppError> {
    state
        .pharmacies
        .get(&id)
        .map(|pharmacy| pharmacy.clone())
        .ok_or_else(|| AppError::NotFound(format!("pharmacy {id} not found")))
}

async fn register_pharmacy(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPharmacyRequest>,
) -> Result<Json<RegisteredPharmacy>, AppError> {
    let license_code = forms::required("license code", &payload.license_code)?;
    let address = forms::required("physical address", &payload.address)?;

    // PIN draw and insert must not interleave with another registration.
    let _guard = state.workflow_guard.lock().await;
    let pharmacy = Pharmacy {
        id: Uuid::new_v4(),
        name: forms::required("pharmacy name", &payload.name)?,
        license_code,
        email: forms::email(payload.email).unwrap_or_default(),
        country: forms::required("country", &payload.country)?,
        state: forms::required("state", &payload.state)?,
        city: forms::required("city", &payload.city)?,
        address,
        pin: generate_unique_pin(&state)?,
        active: true,
        created_at: Utc::now(),
    };

    state.pharmacies.insert(pharmacy.id, pharmacy.clone());
    info!(pharmacy_id = %pharmacy.id, "pharmacy registered");

    Ok(Json(RegisteredPharmacy {
        pin: pharmacy.pin.clone(),
        pharmacy,
    }))
}

async fn get_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Pharmacy>, AppError> {
    Ok(Json(find_pharmacy(&state, id)?))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    find_pharmacy(&state, id)?;

    let mut orders: Vec<Order> = snapshot_orders(&state)
        .into_iter()
        .filter(|order| order.pharmacy_id == id)
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(orders))
}

async fn list_delivery_backups(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    find_pharmacy(&state, id)?;

    let orders = snapshot_orders(&state)
        .into_iter()
        .filter(|order| order.pharmacy_id == id)
        .collect();

    Ok(Json(delivery_backups(orders)))
}

async fn list_active_drivers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverPosition>>, AppError> {
    find_pharmacy(&state, id)?;
    Ok(Json(active_drivers(&state, id)))
}

async fn list_movements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PumpMovement>>, AppError> {
    find_pharmacy(&state, id)?;
    Ok(Json(state.movements_where(|movement| movement.pharmacy_id == id)))
}
