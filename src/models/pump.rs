use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpStatus {
    Available,
    Assigned,
    InTransit,
    Delivered,
    InMaintenance,
}

impl PumpStatus {
    pub const ALL: [PumpStatus; 5] = [
        PumpStatus::Available,
        PumpStatus::Assigned,
        PumpStatus::InTransit,
        PumpStatus::Delivered,
        PumpStatus::InMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PumpStatus::Available => "AVAILABLE",
            PumpStatus::Assigned => "ASSIGNED",
            PumpStatus::InTransit => "IN_TRANSIT",
            PumpStatus::Delivered => "DELIVERED",
            PumpStatus::InMaintenance => "IN_MAINTENANCE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceChecks {
    pub cleaned: bool,
    pub calibrated: bool,
    pub inspected: bool,
}

impl MaintenanceChecks {
    pub fn is_complete(&self) -> bool {
        self.cleaned && self.calibrated && self.inspected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pump {
    pub id: Uuid,
    pub pump_number: String,
    pub brand: Option<String>,
    pub pharmacy_id: Uuid,
    pub status: PumpStatus,
    pub active: bool,
    pub maintenance_due: bool,
    pub maintenance: MaintenanceChecks,
    pub maintenance_due_at: Option<DateTime<Utc>>,
    pub maintenance_updated_at: Option<DateTime<Utc>>,
    pub maintenance_completed_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Pump {
    /// A pump can be put on a new order only when it is active, in stock and
    /// not waiting for maintenance.
    pub fn is_selectable(&self) -> bool {
        self.active && self.status == PumpStatus::Available && !self.maintenance_due
    }
}
