use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementAction {
    Assigned,
    PickedUp,
    Delivered,
    Returned,
    Released,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Employee,
    Driver,
}

/// Who performed a workflow step. Recorded on every movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: ActorRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpMovement {
    pub id: Uuid,
    pub pump_id: Uuid,
    pub pump_number: String,
    pub pharmacy_id: Uuid,
    pub order_id: Option<Uuid>,
    pub action: MovementAction,
    pub performed_by_id: Uuid,
    pub performed_by_name: String,
    pub role: ActorRole,
    pub timestamp: DateTime<Utc>,
}
