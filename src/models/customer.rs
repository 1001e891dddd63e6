use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub name: String,
    pub representative: Option<String>,
    pub email: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub address: Option<String>,
    pub return_reminder_note: String,
    pub return_reminder_at: Option<DateTime<Utc>>,
    pub return_reminder_by: Option<String>,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
