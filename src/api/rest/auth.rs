use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::pin::{resolve_login, Session};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/auth/login", post(login))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub pin: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let session = resolve_login(&state, payload.pin.trim())?;
    Ok(Json(session))
}
