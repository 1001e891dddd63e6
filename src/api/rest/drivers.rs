use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::forms;
use crate::engine::pin::{generate_unique_pin, validate_pin};
use crate::engine::workflow::{active_driver, snapshot_orders};
use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::event::DispatchEvent;
use crate::models::order::{Order, OrderStatus};
use crate::models::pharmacy::Pharmacy;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver))
        .route("/drivers/:id", get(get_driver))
        .route(
            "/drivers/:id/pharmacies",
            post(connect_pharmacy).get(list_connected_pharmacies),
        )
        .route("/drivers/:id/location", patch(update_driver_location))
        .route("/drivers/:id/orders", get(list_driver_orders))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub plate_number: String,
}

#[derive(Serialize)]
pub struct RegisteredDriver {
    pub driver: Driver,
    pub pin: String,
}

#[derive(Deserialize)]
pub struct ConnectPharmacyRequest {
    pub pin: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    AlreadyConnected,
}

#[derive(Serialize)]
pub struct ConnectPharmacyResponse {
    pub status: ConnectionStatus,
    pub pharmacy_id: Uuid,
    pub pharmacy_name: String,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Serialize)]
pub struct DriverOrders {
    pub available: Vec<Order>,
    pub active: Vec<Order>,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<RegisteredDriver>, AppError> {
    let full_name = forms::required("full name", &payload.full_name)?;
    let plate_number = forms::required("plate number", &payload.plate_number)?;

    // PIN draw and insert must not interleave with another registration.
    let _guard = state.workflow_guard.lock().await;
    let driver = Driver {
        id: Uuid::new_v4(),
        full_name,
        email: forms::email(payload.email).unwrap_or_default(),
        country: forms::required("country", &payload.country)?,
        state: forms::required("state", &payload.state)?,
        city: forms::required("city", &payload.city)?,
        plate_number,
        pin: generate_unique_pin(&state)?,
        active: true,
        location: None,
        location_updated_at: None,
        connected_pharmacies: HashSet::new(),
        created_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    info!(driver_id = %driver.id, "driver registered");

    Ok(Json(RegisteredDriver {
        pin: driver.pin.clone(),
        driver,
    }))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(active_driver(&state, id)?))
}

async fn connect_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConnectPharmacyRequest>,
) -> Result<Json<ConnectPharmacyResponse>, AppError> {
    let pin = payload.pin.trim();
    validate_pin(pin)?;

    let pharmacy = state
        .pharmacies
        .iter()
        .find(|pharmacy| pharmacy.active && pharmacy.pin == pin)
        .map(|pharmacy| pharmacy.clone())
        .ok_or(AppError::InvalidPin)?;

    let mut driver = state
        .drivers
        .get_mut(&id)
        .filter(|driver| driver.active)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    let status = if driver.connected_pharmacies.insert(pharmacy.id) {
        info!(driver_id = %id, pharmacy_id = %pharmacy.id, "driver connected to pharmacy");
        ConnectionStatus::Connected
    } else {
        ConnectionStatus::AlreadyConnected
    };

    Ok(Json(ConnectPharmacyResponse {
        status,
        pharmacy_id: pharmacy.id,
        pharmacy_name: pharmacy.name,
    }))
}

async fn list_connected_pharmacies(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Pharmacy>>, AppError> {
    let driver = active_driver(&state, id)?;

    let mut pharmacies: Vec<Pharmacy> = driver
        .connected_pharmacies
        .iter()
        .filter_map(|pharmacy_id| state.pharmacies.get(pharmacy_id).map(|p| p.clone()))
        .collect();
    pharmacies.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(pharmacies))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("invalid coordinates".to_string()));
    }

    let driver = {
        let mut driver = state
            .drivers
            .get_mut(&id)
            .filter(|driver| driver.active)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        driver.location = Some(payload.location);
        driver.location_updated_at = Some(Utc::now());
        driver.clone()
    };

    state.publish(DispatchEvent::DriverLocation {
        driver_id: driver.id,
        driver_name: driver.full_name.clone(),
        pharmacy_ids: driver.connected_pharmacies.iter().copied().collect(),
        location: payload.location,
        at: driver.location_updated_at.unwrap_or_else(Utc::now),
    });

    Ok(Json(driver))
}

/// Orders waiting at the driver's pharmacies, and the ones the driver has
/// accepted and not yet finished.
async fn list_driver_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverOrders>, AppError> {
    let driver = active_driver(&state, id)?;

    let mut available = Vec::new();
    let mut active = Vec::new();
    for order in snapshot_orders(&state) {
        if order.status == OrderStatus::Pending
            && driver.connected_pharmacies.contains(&order.pharmacy_id)
        {
            available.push(order);
        } else if order.driver_id == Some(driver.id) && order.status.is_in_progress() {
            active.push(order);
        }
    }
    available.sort_by_key(|order| order.created_at);
    active.sort_by_key(|order| order.assigned_at);

    Ok(Json(DriverOrders { available, active }))
}
