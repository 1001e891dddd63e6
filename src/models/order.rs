use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[serde(alias = "CREATED")]
    Pending,
    Assigned,
    #[serde(alias = "IN_PROGRESS")]
    OnWayToPharmacy,
    OnWayToCustomer,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub city: String,
    pub address: Option<String>,
    pub state: String,
    pub country: String,
    pub email: Option<String>,
}

/// Driver's report, made at the door, about pumps left with the customer by
/// earlier orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviousPumpStatus {
    pub pump_number: String,
    pub returned: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PumpReturnConfirmation {
    pub pump_number: String,
    pub returned_to_pharmacy: bool,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub pharmacy_name: String,
    pub customer_id: Uuid,
    pub customer: CustomerSnapshot,
    pub pump_ids: Vec<Uuid>,
    pub pump_numbers: Vec<String>,
    pub customer_previous_pumps: Vec<String>,
    pub return_reminder_note: String,
    pub created_by_employee_id: Uuid,
    pub created_by_employee_name: String,
    pub status: OrderStatus,
    pub driver_id: Option<Uuid>,
    pub driver_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status_updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub delivery: Option<DeliveryRecord>,
    pub previous_pumps_status: Vec<PreviousPumpStatus>,
    pub previous_pumps_return_to_pharmacy: Vec<PumpReturnConfirmation>,
}

impl Order {
    pub fn legal_pdf_url(&self) -> Option<&str> {
        self.delivery
            .as_ref()
            .and_then(|delivery| delivery.legal_pdf_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Pump numbers left at the customer by earlier orders, either as
    /// reported by the driver or as captured when the order was created.
    pub fn previous_pump_numbers(&self) -> Vec<String> {
        let mut numbers = self.customer_previous_pumps.clone();
        for entry in &self.previous_pumps_status {
            if !numbers.contains(&entry.pump_number) {
                numbers.push(entry.pump_number.clone());
            }
        }
        numbers
    }

    pub fn is_pump_returned_to_pharmacy(&self, pump_number: &str) -> bool {
        self.previous_pumps_return_to_pharmacy
            .iter()
            .any(|entry| entry.pump_number == pump_number && entry.returned_to_pharmacy)
    }
}
