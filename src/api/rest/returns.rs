use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::pharmacies::find_pharmacy;
use crate::engine::inventory::{
    has_return_tracking, matches_return_filter, matches_return_search, return_counts,
    ReturnCounts, ReturnFilter,
};
use crate::engine::workflow::{self, snapshot_orders, WorkflowOutcome};
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pharmacies/:id/returns", get(list_returns))
        .route("/orders/:id/returns", post(confirm_return))
}

#[derive(Deserialize, Default)]
pub struct ReturnsQuery {
    #[serde(default)]
    pub filter: ReturnFilter,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct ReturnsResponse {
    pub counts: ReturnCounts,
    pub orders: Vec<Order>,
}

#[derive(Deserialize)]
pub struct ConfirmReturnRequest {
    pub employee_id: Uuid,
    pub pump_number: String,
}

async fn list_returns(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReturnsQuery>,
) -> Result<Json<ReturnsResponse>, AppError> {
    find_pharmacy(&state, id)?;

    let mut tracked: Vec<Order> = snapshot_orders(&state)
        .into_iter()
        .filter(|order| order.pharmacy_id == id && has_return_tracking(order))
        .collect();
    tracked.sort_by(|a, b| b.status_updated_at.cmp(&a.status_updated_at));

    let counts = return_counts(&tracked);
    let search = query.search.unwrap_or_default();
    let orders = tracked
        .into_iter()
        .filter(|order| matches_return_search(order, &search))
        .filter(|order| matches_return_filter(order, query.filter))
        .collect();

    Ok(Json(ReturnsResponse { counts, orders }))
}

async fn confirm_return(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmReturnRequest>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(
        workflow::confirm_return(&state, id, &payload.pump_number, payload.employee_id).await?,
    ))
}
