use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::notify::delivery_pdf_email;
use crate::engine::queue::enqueue_email;
use crate::engine::workflow::{
    self, DeliveryInput, NewOrder, PickupInput, WorkflowOutcome,
};
use crate::error::AppError;
use crate::models::delivery::PickupRecord;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/depart", post(start_to_pharmacy))
        .route("/orders/:id/pickup", post(confirm_pickup).get(get_pickup))
        .route("/orders/:id/deliver", post(complete_delivery))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/share-pdf", post(share_delivery_pdf))
}

#[derive(Deserialize)]
pub struct DriverRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub actor_id: Uuid,
}

#[derive(Deserialize)]
pub struct SharePdfRequest {
    pub to: String,
}

#[derive(Serialize)]
pub struct SharePdfResponse {
    pub queued: bool,
    pub to: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(workflow::create_order(&state, payload).await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order.value().clone()))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverRequest>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(workflow::accept_order(&state, id, payload.driver_id).await?))
}

async fn start_to_pharmacy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverRequest>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(
        workflow::start_to_pharmacy(&state, id, payload.driver_id).await?,
    ))
}

async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PickupInput>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(workflow::confirm_pickup(&state, id, payload).await?))
}

async fn get_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PickupRecord>, AppError> {
    let pickup = state
        .pickups
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no pickup recorded for order {id}")))?;

    Ok(Json(pickup.value().clone()))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeliveryInput>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(workflow::complete_delivery(&state, id, payload).await?))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    Ok(Json(workflow::cancel_order(&state, id, payload.actor_id).await?))
}

async fn share_delivery_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SharePdfRequest>,
) -> Result<Json<SharePdfResponse>, AppError> {
    let order = state
        .orders
        .get(&id)
        .map(|order| order.clone())
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    let email = delivery_pdf_email(&order, &payload.to)?;
    let to = email.to.clone();
    enqueue_email(&state, email);

    Ok(Json(SharePdfResponse { queued: true, to }))
}
