use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;
use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    OrderStatus {
        order_id: Uuid,
        pharmacy_id: Uuid,
        status: OrderStatus,
        driver_id: Option<Uuid>,
        driver_name: Option<String>,
        at: DateTime<Utc>,
    },
    DriverLocation {
        driver_id: Uuid,
        driver_name: String,
        pharmacy_ids: Vec<Uuid>,
        location: GeoPoint,
        at: DateTime<Utc>,
    },
}

impl DispatchEvent {
    pub fn concerns_pharmacy(&self, pharmacy_id: Uuid) -> bool {
        match self {
            DispatchEvent::OrderStatus {
                pharmacy_id: order_pharmacy,
                ..
            } => *order_pharmacy == pharmacy_id,
            DispatchEvent::DriverLocation { pharmacy_ids, .. } => pharmacy_ids.contains(&pharmacy_id),
        }
    }
}
