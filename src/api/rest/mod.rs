pub mod auth;
pub mod customers;
pub mod drivers;
pub mod employees;
pub mod forms;
pub mod orders;
pub mod pharmacies;
pub mod pumps;
pub mod returns;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(pharmacies::router())
        .merge(employees::router())
        .merge(drivers::router())
        .merge(customers::router())
        .merge(pumps::router())
        .merge(orders::router())
        .merge(returns::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    pharmacies: usize,
    pumps: usize,
    orders: usize,
    movements: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pharmacies: state.pharmacies.len(),
        pumps: state.pumps.len(),
        orders: state.orders.len(),
        movements: state.movement_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
