use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::pharmacies::find_pharmacy;
use crate::engine::inventory::committed_pump_ids;
use crate::engine::scanner::{matches_search, normalize_pump_input, resolve_scan, split_batch};
use crate::engine::workflow::{
    delete_pump, reconcile_maintenance, register_pump, snapshot_orders, update_maintenance,
    NewPump, ReconcileReport,
};
use crate::error::AppError;
use crate::models::movement::PumpMovement;
use crate::models::pump::{MaintenanceChecks, Pump};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pharmacies/:id/pumps", post(create_pump).get(list_pumps))
        .route("/pharmacies/:id/pumps/scan", post(scan_pumps))
        .route("/pharmacies/:id/maintenance", get(list_maintenance_due))
        .route("/pumps/:id", delete(remove_pump))
        .route("/pumps/:id/movements", get(list_pump_movements))
        .route("/pumps/:id/maintenance", put(save_maintenance))
        .route("/maintenance/reconcile", post(run_reconciliation))
}

#[derive(Deserialize, Default)]
pub struct PumpListQuery {
    #[serde(default)]
    pub selectable: bool,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct EmployeeQuery {
    pub employee_id: Uuid,
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub input: String,
    #[serde(default)]
    pub chosen: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub matched: Vec<Pump>,
    pub not_found: Vec<String>,
}

#[derive(Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub pharmacy_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Pumps an employee may put on a new order right now.
fn selectable_pumps(state: &AppState, pharmacy_id: Uuid) -> Vec<Pump> {
    let committed = committed_pump_ids(&snapshot_orders(state));
    let mut pumps: Vec<Pump> = state
        .pumps
        .iter()
        .filter(|pump| {
            pump.pharmacy_id == pharmacy_id && pump.is_selectable() && !committed.contains(&pump.id)
        })
        .map(|entry| entry.value().clone())
        .collect();
    pumps.sort_by(|a, b| a.pump_number.cmp(&b.pump_number));
    pumps
}

async fn create_pump(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewPump>,
) -> Result<Json<Pump>, AppError> {
    find_pharmacy(&state, id)?;
    Ok(Json(register_pump(&state, id, payload).await?))
}

async fn list_pumps(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PumpListQuery>,
) -> Result<Json<Vec<Pump>>, AppError> {
    find_pharmacy(&state, id)?;

    let mut pumps = if query.selectable {
        selectable_pumps(&state, id)
    } else {
        let mut pumps: Vec<Pump> = state
            .pumps
            .iter()
            .filter(|pump| pump.pharmacy_id == id)
            .map(|entry| entry.value().clone())
            .collect();
        pumps.sort_by(|a, b| a.pump_number.cmp(&b.pump_number));
        pumps
    };

    if let Some(search) = query.search.as_deref() {
        pumps.retain(|pump| matches_search(&pump.pump_number, search));
    }

    Ok(Json(pumps))
}

/// Resolves scanner input (one code or a pasted batch) against the
/// pharmacy's selectable pumps.
async fn scan_pumps(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    find_pharmacy(&state, id)?;

    let candidates = selectable_pumps(&state, id);
    let mut chosen = payload.chosen;
    let mut matched = Vec::new();
    let mut not_found = Vec::new();

    for part in split_batch(&payload.input) {
        let normalized = normalize_pump_input(&part);
        if normalized.is_empty() {
            continue;
        }
        match resolve_scan(&candidates, &chosen, &normalized) {
            Some(pump) => {
                chosen.push(pump.id);
                matched.push(pump.clone());
            }
            None => not_found.push(normalized),
        }
    }

    Ok(Json(ScanResponse { matched, not_found }))
}

async fn list_maintenance_due(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Pump>>, AppError> {
    find_pharmacy(&state, id)?;

    let mut pumps: Vec<Pump> = state
        .pumps
        .iter()
        .filter(|pump| pump.pharmacy_id == id && pump.maintenance_due)
        .map(|entry| entry.value().clone())
        .collect();
    pumps.sort_by_key(|pump| pump.maintenance_due_at);

    Ok(Json(pumps))
}

async fn remove_pump(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<Pump>, AppError> {
    Ok(Json(delete_pump(&state, id, query.employee_id).await?))
}

async fn list_pump_movements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<PumpMovement>> {
    Json(state.movements_where(|movement| movement.pump_id == id))
}

async fn save_maintenance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MaintenanceChecks>,
) -> Result<Json<Pump>, AppError> {
    Ok(Json(update_maintenance(&state, id, payload).await?))
}

async fn run_reconciliation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReconcileRequest>,
) -> Json<ReconcileReport> {
    Json(reconcile_maintenance(&state, payload.pharmacy_id, payload.dry_run).await)
}
