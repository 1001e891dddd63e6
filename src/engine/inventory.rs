//! Pump availability, customer pump history, return and maintenance rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::scanner::matches_search;
use crate::models::order::{Order, OrderStatus};
use crate::models::pump::{MaintenanceChecks, Pump, PumpStatus};

pub const DELIVERY_BACKUP_LIMIT: usize = 10;

/// Pumps attached to any order that has not reached a terminal status.
pub fn committed_pump_ids(orders: &[Order]) -> HashSet<Uuid> {
    orders
        .iter()
        .filter(|order| order.status.holds_pumps())
        .flat_map(|order| order.pump_ids.iter().copied())
        .collect()
}

/// Pump numbers among `requested` that can't go on a new order.
pub fn unavailable_pumps(requested: &[Pump], committed: &HashSet<Uuid>) -> Vec<String> {
    requested
        .iter()
        .filter(|pump| !pump.is_selectable() || committed.contains(&pump.id))
        .map(|pump| pump.pump_number.clone())
        .collect()
}

/// Distinct pump numbers ever sent to a customer, oldest order first.
/// Cancelled orders never left the pharmacy and don't count.
pub fn customer_pump_history(orders: &[Order], pharmacy_id: Uuid, customer_id: Uuid) -> Vec<String> {
    let mut matching: Vec<&Order> = orders
        .iter()
        .filter(|order| {
            order.pharmacy_id == pharmacy_id
                && order.customer_id == customer_id
                && order.status != OrderStatus::Cancelled
        })
        .collect();
    matching.sort_by_key(|order| order.created_at);

    let mut seen = HashSet::new();
    let mut history = Vec::new();
    for number in matching.iter().flat_map(|order| order.pump_numbers.iter()) {
        if !number.is_empty() && seen.insert(number.clone()) {
            history.push(number.clone());
        }
    }
    history
}

/// A pump back from a customer needs a full maintenance pass before it can
/// be booked again.
pub fn mark_returned(pump: &mut Pump, now: DateTime<Utc>) {
    pump.status = PumpStatus::InMaintenance;
    pump.maintenance_due = true;
    pump.maintenance_due_at = Some(now);
    pump.maintenance = MaintenanceChecks::default();
    pump.maintenance_completed_at = None;
}

/// Stores the maintenance checks. Returns true when the pass completed and
/// the pump went back into stock.
pub fn apply_maintenance(pump: &mut Pump, checks: MaintenanceChecks, now: DateTime<Utc>) -> bool {
    pump.maintenance = checks;
    pump.maintenance_updated_at = Some(now);

    if checks.is_complete() {
        pump.maintenance_due = false;
        pump.maintenance_completed_at = Some(now);
        if pump.status == PumpStatus::InMaintenance {
            pump.status = PumpStatus::Available;
        }
        true
    } else {
        pump.maintenance_due = true;
        pump.maintenance_completed_at = None;
        false
    }
}

/// Fully maintained pumps still flagged as in maintenance.
pub fn needs_reconciliation(pump: &Pump) -> bool {
    pump.maintenance.is_complete()
        && (pump.status == PumpStatus::InMaintenance || pump.maintenance_due)
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFilter {
    #[default]
    All,
    Pending,
    Returned,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ReturnCounts {
    pub all: usize,
    pub pending: usize,
    pub returned: usize,
}

pub fn has_return_tracking(order: &Order) -> bool {
    !order.customer_previous_pumps.is_empty() || !order.previous_pumps_status.is_empty()
}

/// `None` when the driver reported nothing, else whether every reported
/// pump has been confirmed back at the pharmacy.
pub fn all_returned_to_pharmacy(order: &Order) -> Option<bool> {
    if order.previous_pumps_status.is_empty() {
        return None;
    }
    Some(
        order
            .previous_pumps_status
            .iter()
            .all(|entry| order.is_pump_returned_to_pharmacy(&entry.pump_number)),
    )
}

pub fn matches_return_filter(order: &Order, filter: ReturnFilter) -> bool {
    match filter {
        ReturnFilter::All => true,
        ReturnFilter::Pending => all_returned_to_pharmacy(order) == Some(false),
        ReturnFilter::Returned => all_returned_to_pharmacy(order) == Some(true),
    }
}

pub fn matches_return_search(order: &Order, raw_search: &str) -> bool {
    if raw_search.trim().is_empty() {
        return true;
    }
    order
        .previous_pump_numbers()
        .iter()
        .any(|number| matches_search(number, raw_search))
}

pub fn return_counts(orders: &[Order]) -> ReturnCounts {
    ReturnCounts {
        all: orders.len(),
        pending: orders
            .iter()
            .filter(|order| matches_return_filter(order, ReturnFilter::Pending))
            .count(),
        returned: orders
            .iter()
            .filter(|order| matches_return_filter(order, ReturnFilter::Returned))
            .count(),
    }
}

/// Latest delivered orders that have a legal PDF on file, newest first.
pub fn delivery_backups(mut orders: Vec<Order>) -> Vec<Order> {
    orders.retain(|order| order.status == OrderStatus::Delivered && order.legal_pdf_url().is_some());
    orders.sort_by(|a, b| {
        let a_at = a.delivered_at.unwrap_or(a.status_updated_at);
        let b_at = b.delivered_at.unwrap_or(b.status_updated_at);
        b_at.cmp(&a_at)
    });
    orders.truncate(DELIVERY_BACKUP_LIMIT);
    orders
}
