use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::driver::GeoPoint;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct DriverPosition {
    pub driver_id: Uuid,
    pub driver_name: String,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub location: Option<GeoPoint>,
    pub last_update: DateTime<Utc>,
}

/// Drivers currently working an order for `pharmacy_id`, one entry per
/// driver, taken from their most recently updated order.
pub fn active_drivers(state: &AppState, pharmacy_id: Uuid) -> Vec<DriverPosition> {
    let mut latest: HashMap<Uuid, Order> = HashMap::new();
    for entry in state.orders.iter() {
        let order = entry.value();
        if order.pharmacy_id != pharmacy_id || !order.status.is_in_progress() {
            continue;
        }
        let Some(driver_id) = order.driver_id else {
            continue;
        };
        let newer = latest
            .get(&driver_id)
            .is_none_or(|current| order.status_updated_at > current.status_updated_at);
        if newer {
            latest.insert(driver_id, order.clone());
        }
    }

    let mut positions: Vec<DriverPosition> = latest
        .into_iter()
        .map(|(driver_id, order)| {
            let driver = state.drivers.get(&driver_id);
            let location = driver.as_ref().and_then(|driver| driver.location);
            let last_update = driver
                .as_ref()
                .and_then(|driver| driver.location_updated_at)
                .map_or(order.status_updated_at, |at| at.max(order.status_updated_at));

            DriverPosition {
                driver_id,
                driver_name: order.driver_name.clone().unwrap_or_default(),
                order_id: order.id,
                status: order.status,
                location,
                last_update,
            }
        })
        .collect();

    positions.sort_by(|a, b| b.last_update.cmp(&a.last_update));
    positions
}
