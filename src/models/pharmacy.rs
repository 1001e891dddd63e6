use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: Uuid,
    pub name: String,
    pub license_code: String,
    pub email: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub address: String,
    #[serde(skip_serializing)]
    pub pin: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
