use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

/// Reference to a signature image held by the object store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignatureRef {
    pub url: String,
    pub sha256: String,
}

impl SignatureRef {
    pub fn is_present(&self) -> bool {
        !self.url.trim().is_empty() && is_sha256_hex(&self.sha256)
    }
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub pharmacy_id: Uuid,
    pub driver_id: Uuid,
    pub employee_signature: SignatureRef,
    pub driver_signature: SignatureRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub pharmacy_id: Uuid,
    pub driver_id: Uuid,
    pub driver_name: String,
    pub pump_numbers: Vec<String>,
    pub customer_name: String,
    pub customer_address: Option<String>,
    pub customer_signature: SignatureRef,
    pub driver_signature: SignatureRef,
    pub delivered_at: DateTime<Utc>,
    pub delivered_from_ip: Option<String>,
    pub location: GeoPoint,
    pub legal_pdf_url: Option<String>,
}
