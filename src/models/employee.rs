use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub job_title: String,
    pub pharmacy_id: Uuid,
    pub pharmacy_name: String,
    #[serde(skip_serializing)]
    pub pin: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
