//! Order lifecycle operations and the pump inventory writes that go with
//! them.
//!
//! Every operation that reads pump or order status and then writes it holds
//! `AppState::workflow_guard` for the whole read-check-write sequence, so two
//! employees booking the same pump at once can't both succeed.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::inventory::{
    apply_maintenance, committed_pump_ids, customer_pump_history, mark_returned,
    needs_reconciliation, unavailable_pumps,
};
use crate::engine::lifecycle::{movement_for, pump_status_for};
use crate::engine::notify::{delivery_confirmation_email, order_created_email};
use crate::engine::queue::enqueue_email;
use crate::engine::scanner::normalize_pump_input;
use crate::error::AppError;
use crate::models::delivery::{DeliveryRecord, PickupRecord, SignatureRef};
use crate::models::driver::{Driver, GeoPoint};
use crate::models::employee::Employee;
use crate::models::event::DispatchEvent;
use crate::models::movement::{Actor, ActorRole, MovementAction, PumpMovement};
use crate::models::order::{
    CustomerSnapshot, Order, OrderStatus, PreviousPumpStatus, PumpReturnConfirmation,
};
use crate::models::pump::{MaintenanceChecks, Pump, PumpStatus};
use crate::state::AppState;

/// Result of a workflow step. Pump writes that could not be applied don't
/// undo the step; their pump numbers are listed instead.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub order: Order,
    pub pump_update_failures: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub employee_id: Uuid,
    pub customer_id: Uuid,
    pub pump_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickupInput {
    pub driver_id: Uuid,
    pub employee_signature: SignatureRef,
    pub driver_signature: SignatureRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryInput {
    pub driver_id: Uuid,
    pub customer_signature: SignatureRef,
    pub driver_signature: SignatureRef,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub legal_pdf_url: Option<String>,
    #[serde(default)]
    pub previous_pumps: Vec<PreviousPumpStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPump {
    pub employee_id: Uuid,
    pub pump_number: String,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciledPump {
    pub id: Uuid,
    pub pump_number: String,
    pub pharmacy_id: Uuid,
    pub before_status: PumpStatus,
    pub before_maintenance_due: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub updated: usize,
    pub pumps: Vec<ReconciledPump>,
}

pub async fn create_order(state: &AppState, request: NewOrder) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();

    if request.pump_ids.is_empty() {
        return Err(AppError::BadRequest(
            "at least one pump and a customer are required".to_string(),
        ));
    }
    let distinct: HashSet<&Uuid> = request.pump_ids.iter().collect();
    if distinct.len() != request.pump_ids.len() {
        return Err(AppError::BadRequest("a pump can only be added once".to_string()));
    }

    let employee = active_employee(state, request.employee_id)?;
    let customer = state
        .customers
        .get(&request.customer_id)
        .filter(|customer| customer.active)
        .map(|customer| customer.clone())
        .ok_or_else(|| AppError::NotFound(format!("customer {} not found", request.customer_id)))?;
    if customer.pharmacy_id != employee.pharmacy_id {
        return Err(AppError::Forbidden(
            "customer belongs to another pharmacy".to_string(),
        ));
    }
    let pharmacy = state
        .pharmacies
        .get(&employee.pharmacy_id)
        .map(|pharmacy| pharmacy.clone())
        .ok_or_else(|| AppError::NotFound(format!("pharmacy {} not found", employee.pharmacy_id)))?;

    let _guard = state.workflow_guard.lock().await;

    let mut requested = Vec::with_capacity(request.pump_ids.len());
    let mut missing = Vec::new();
    for pump_id in &request.pump_ids {
        match state.pumps.get(pump_id) {
            Some(pump) if pump.pharmacy_id == pharmacy.id => requested.push(pump.clone()),
            _ => missing.push(pump_id.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "pumps not found: {}",
            missing.join(", ")
        )));
    }

    let orders = snapshot_orders(state);
    let unavailable = unavailable_pumps(&requested, &committed_pump_ids(&orders));
    if !unavailable.is_empty() {
        state.metrics.pump_conflicts_total.inc();
        warn!(
            employee_id = %employee.id,
            pumps = %unavailable.join(","),
            "rejected order: pumps already booked or unavailable"
        );
        return Err(AppError::PumpsUnavailable(unavailable));
    }

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        pharmacy_id: pharmacy.id,
        pharmacy_name: pharmacy.name.clone(),
        customer_id: customer.id,
        customer: CustomerSnapshot {
            name: customer.name.clone(),
            city: customer.city.clone(),
            address: customer.address.clone(),
            state: customer.state.clone(),
            country: customer.country.clone(),
            email: customer.email.clone(),
        },
        pump_ids: requested.iter().map(|pump| pump.id).collect(),
        pump_numbers: requested.iter().map(|pump| pump.pump_number.clone()).collect(),
        customer_previous_pumps: customer_pump_history(&orders, pharmacy.id, customer.id),
        return_reminder_note: customer.return_reminder_note.clone(),
        created_by_employee_id: employee.id,
        created_by_employee_name: employee.full_name.clone(),
        status: OrderStatus::Pending,
        driver_id: None,
        driver_name: None,
        created_at: now,
        status_updated_at: now,
        assigned_at: None,
        started_at: None,
        picked_up_at: None,
        delivered_at: None,
        cancelled_at: None,
        delivery: None,
        previous_pumps_status: Vec::new(),
        previous_pumps_return_to_pharmacy: Vec::new(),
    };

    state.metrics.orders_created_total.inc();
    let outcome = commit_transition(state, order, &employee_actor(&employee), now);

    if let Some(email) = order_created_email(&outcome.order, &pharmacy) {
        enqueue_email(state, email);
    }

    observe(state, "create_order", started);
    info!(
        order_id = %outcome.order.id,
        pharmacy_id = %pharmacy.id,
        pumps = outcome.order.pump_ids.len(),
        "order created"
    );

    Ok(outcome)
}

pub async fn accept_order(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();
    let driver = active_driver(state, driver_id)?;

    let _guard = state.workflow_guard.lock().await;
    let mut order = load_order(state, order_id)?;

    if !driver.connected_pharmacies.contains(&order.pharmacy_id) {
        return Err(AppError::Forbidden(
            "driver is not connected to this pharmacy".to_string(),
        ));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "order {} is no longer available ({})",
            order.id,
            order.status.as_str()
        )));
    }

    let now = Utc::now();
    order.status = OrderStatus::Assigned;
    order.driver_id = Some(driver.id);
    order.driver_name = Some(driver.full_name.clone());
    order.assigned_at = Some(now);

    let outcome = commit_transition(state, order, &driver_actor(&driver), now);
    observe(state, "accept_order", started);
    info!(order_id = %order_id, driver_id = %driver.id, "order accepted");

    Ok(outcome)
}

pub async fn start_to_pharmacy(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();
    let driver = active_driver(state, driver_id)?;

    let _guard = state.workflow_guard.lock().await;
    let mut order = load_order(state, order_id)?;
    ensure_assigned_driver(&order, &driver)?;
    ensure_transition(&order, OrderStatus::OnWayToPharmacy)?;

    let now = Utc::now();
    order.status = OrderStatus::OnWayToPharmacy;
    order.started_at = Some(now);

    let outcome = commit_transition(state, order, &driver_actor(&driver), now);
    observe(state, "start_to_pharmacy", started);
    info!(order_id = %order_id, driver_id = %driver.id, "driver heading to pharmacy");

    Ok(outcome)
}

pub async fn confirm_pickup(
    state: &AppState,
    order_id: Uuid,
    input: PickupInput,
) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();
    if !input.employee_signature.is_present() || !input.driver_signature.is_present() {
        return Err(AppError::BadRequest(
            "pharmacy staff and driver signatures are required".to_string(),
        ));
    }
    let driver = active_driver(state, input.driver_id)?;

    let _guard = state.workflow_guard.lock().await;
    let mut order = load_order(state, order_id)?;
    ensure_assigned_driver(&order, &driver)?;
    ensure_transition(&order, OrderStatus::OnWayToCustomer)?;

    let now = Utc::now();
    state.pickups.insert(
        order.id,
        PickupRecord {
            id: Uuid::new_v4(),
            order_id: order.id,
            pharmacy_id: order.pharmacy_id,
            driver_id: driver.id,
            employee_signature: input.employee_signature,
            driver_signature: input.driver_signature,
            created_at: now,
        },
    );

    order.status = OrderStatus::OnWayToCustomer;
    order.picked_up_at = Some(now);

    let outcome = commit_transition(state, order, &driver_actor(&driver), now);
    observe(state, "confirm_pickup", started);
    info!(order_id = %order_id, driver_id = %driver.id, "pumps picked up");

    Ok(outcome)
}

pub async fn complete_delivery(
    state: &AppState,
    order_id: Uuid,
    input: DeliveryInput,
) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();
    if !input.customer_signature.is_present() || !input.driver_signature.is_present() {
        return Err(AppError::BadRequest(
            "both customer and driver signatures are required before delivery".to_string(),
        ));
    }
    let location = input
        .location
        .filter(GeoPoint::is_valid)
        .ok_or_else(|| AppError::BadRequest("location is required for delivery".to_string()))?;
    let previous_pumps = normalize_previous_pumps(input.previous_pumps)?;
    let driver = active_driver(state, input.driver_id)?;

    let _guard = state.workflow_guard.lock().await;
    let mut order = load_order(state, order_id)?;
    ensure_assigned_driver(&order, &driver)?;
    ensure_transition(&order, OrderStatus::Delivered)?;

    let now = Utc::now();
    order.delivery = Some(DeliveryRecord {
        id: Uuid::new_v4(),
        order_id: order.id,
        pharmacy_id: order.pharmacy_id,
        driver_id: driver.id,
        driver_name: driver.full_name.clone(),
        pump_numbers: order.pump_numbers.clone(),
        customer_name: order.customer.name.clone(),
        customer_address: order.customer.address.clone(),
        customer_signature: input.customer_signature,
        driver_signature: input.driver_signature,
        delivered_at: now,
        delivered_from_ip: input.ip.filter(|ip| !ip.trim().is_empty()),
        location,
        legal_pdf_url: input.legal_pdf_url.filter(|url| !url.trim().is_empty()),
    });
    order.previous_pumps_status = previous_pumps;
    order.status = OrderStatus::Delivered;
    order.delivered_at = Some(now);

    let outcome = commit_transition(state, order, &driver_actor(&driver), now);

    if let Some(email) = delivery_confirmation_email(&outcome.order) {
        enqueue_email(state, email);
    }

    observe(state, "complete_delivery", started);
    info!(order_id = %order_id, driver_id = %driver.id, "order delivered");

    Ok(outcome)
}

/// Cancels an order before its pumps leave the pharmacy. Employees of the
/// order's pharmacy and the assigned driver may cancel.
pub async fn cancel_order(
    state: &AppState,
    order_id: Uuid,
    actor_id: Uuid,
) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();

    let _guard = state.workflow_guard.lock().await;
    let mut order = load_order(state, order_id)?;

    let actor = if let Some(employee) = state.employees.get(&actor_id).map(|e| e.clone()) {
        if !employee.active || employee.pharmacy_id != order.pharmacy_id {
            return Err(AppError::Forbidden(
                "employee cannot manage this order".to_string(),
            ));
        }
        employee_actor(&employee)
    } else if let Some(driver) = state.drivers.get(&actor_id).map(|d| d.clone()) {
        ensure_assigned_driver(&order, &driver)?;
        driver_actor(&driver)
    } else {
        return Err(AppError::NotFound(format!("actor {actor_id} not found")));
    };

    ensure_transition(&order, OrderStatus::Cancelled)?;

    let now = Utc::now();
    order.status = OrderStatus::Cancelled;
    order.cancelled_at = Some(now);

    let outcome = commit_transition(state, order, &actor, now);
    observe(state, "cancel_order", started);
    info!(order_id = %order_id, actor_id = %actor_id, "order cancelled");

    Ok(outcome)
}

/// Records that a pump left at the customer by an earlier order is back at
/// the pharmacy, and sends it to maintenance. Confirming twice is a no-op.
pub async fn confirm_return(
    state: &AppState,
    order_id: Uuid,
    raw_pump_number: &str,
    employee_id: Uuid,
) -> Result<WorkflowOutcome, AppError> {
    let started = Instant::now();
    let pump_number = normalize_pump_input(raw_pump_number);
    if pump_number.is_empty() {
        return Err(AppError::BadRequest("pump number is required".to_string()));
    }
    let employee = active_employee(state, employee_id)?;

    let _guard = state.workflow_guard.lock().await;
    let mut order = load_order(state, order_id)?;
    if order.pharmacy_id != employee.pharmacy_id {
        return Err(AppError::Forbidden(
            "employee cannot manage this order".to_string(),
        ));
    }
    if !order.previous_pump_numbers().contains(&pump_number) {
        return Err(AppError::NotFound(format!(
            "pump {pump_number} is not pending return on order {order_id}"
        )));
    }
    if order.is_pump_returned_to_pharmacy(&pump_number) {
        return Ok(WorkflowOutcome {
            order,
            pump_update_failures: Vec::new(),
        });
    }

    let pump = state
        .pumps
        .iter()
        .find(|pump| pump.pharmacy_id == order.pharmacy_id && pump.pump_number == pump_number)
        .map(|pump| (pump.id, pump.status));
    if let Some((pump_id, status)) = pump {
        if committed_pump_ids(&snapshot_orders(state)).contains(&pump_id) {
            return Err(AppError::Conflict(format!(
                "pump {pump_number} is on an active order"
            )));
        }
        if status != PumpStatus::Delivered {
            return Err(AppError::Conflict(format!(
                "pump {pump_number} is not out with a customer ({})",
                status.as_str()
            )));
        }
    }
    let pump_id = pump.map(|(id, _)| id);

    let now = Utc::now();
    match order
        .previous_pumps_return_to_pharmacy
        .iter_mut()
        .find(|entry| entry.pump_number == pump_number)
    {
        Some(entry) => {
            entry.returned_to_pharmacy = true;
            entry.confirmed_at = now;
        }
        None => order
            .previous_pumps_return_to_pharmacy
            .push(PumpReturnConfirmation {
                pump_number: pump_number.clone(),
                returned_to_pharmacy: true,
                confirmed_at: now,
            }),
    }
    order.status_updated_at = now;
    state.orders.insert(order.id, order.clone());

    let mut pump_update_failures = Vec::new();
    let returned = pump_id.and_then(|id| {
        let mut pump = state.pumps.get_mut(&id)?;
        mark_returned(&mut pump, now);
        Some(pump.clone())
    });
    match returned {
        Some(pump) => state.record_movement(movement(
            &pump.id,
            &pump.pump_number,
            &order,
            MovementAction::Returned,
            &employee_actor(&employee),
            now,
        )),
        None => {
            warn!(order_id = %order.id, pump_number = %pump_number, "returned pump is not registered");
            pump_update_failures.push(pump_number.clone());
        }
    }

    refresh_pump_gauges(state);
    observe(state, "confirm_return", started);
    info!(order_id = %order.id, pump_number = %pump_number, "pump returned to pharmacy");

    Ok(WorkflowOutcome {
        order,
        pump_update_failures,
    })
}

pub async fn update_maintenance(
    state: &AppState,
    pump_id: Uuid,
    checks: MaintenanceChecks,
) -> Result<Pump, AppError> {
    let _guard = state.workflow_guard.lock().await;

    let updated = {
        let mut pump = state
            .pumps
            .get_mut(&pump_id)
            .ok_or_else(|| AppError::NotFound(format!("pump {pump_id} not found")))?;
        if !pump.maintenance_due && pump.status != PumpStatus::InMaintenance {
            return Err(AppError::Conflict(format!(
                "pump {} is not due for maintenance",
                pump.pump_number
            )));
        }

        if apply_maintenance(&mut pump, checks, Utc::now()) {
            info!(pump_id = %pump_id, pump_number = %pump.pump_number, "maintenance completed");
        }
        pump.clone()
    };

    refresh_pump_gauges(state);
    Ok(updated)
}

/// Puts fully maintained pumps that are still flagged as in maintenance
/// back into stock.
pub async fn reconcile_maintenance(
    state: &AppState,
    pharmacy_id: Option<Uuid>,
    dry_run: bool,
) -> ReconcileReport {
    let _guard = state.workflow_guard.lock().await;
    let now = Utc::now();

    let mut scanned = 0;
    let mut pumps = Vec::new();
    for mut pump in state.pumps.iter_mut() {
        if pharmacy_id.is_some_and(|id| id != pump.pharmacy_id) {
            continue;
        }
        scanned += 1;
        if !needs_reconciliation(&pump) {
            continue;
        }

        pumps.push(ReconciledPump {
            id: pump.id,
            pump_number: pump.pump_number.clone(),
            pharmacy_id: pump.pharmacy_id,
            before_status: pump.status,
            before_maintenance_due: pump.maintenance_due,
        });

        if !dry_run {
            pump.status = PumpStatus::Available;
            pump.maintenance_due = false;
            pump.maintenance_updated_at = Some(now);
            pump.maintenance_completed_at = Some(now);
        }
    }

    if !dry_run {
        refresh_pump_gauges(state);
    }
    info!(scanned, updated = pumps.len(), dry_run, "maintenance reconciliation finished");

    ReconcileReport {
        dry_run,
        scanned,
        updated: pumps.len(),
        pumps,
    }
}

pub async fn register_pump(
    state: &AppState,
    pharmacy_id: Uuid,
    request: NewPump,
) -> Result<Pump, AppError> {
    let pump_number = normalize_pump_input(&request.pump_number);
    if pump_number.is_empty() {
        return Err(AppError::BadRequest("pump number is required".to_string()));
    }
    let employee = active_employee(state, request.employee_id)?;
    if employee.pharmacy_id != pharmacy_id {
        return Err(AppError::Forbidden(
            "employee cannot manage this pharmacy".to_string(),
        ));
    }

    let _guard = state.workflow_guard.lock().await;
    let taken = state
        .pumps
        .iter()
        .any(|pump| pump.pharmacy_id == pharmacy_id && pump.pump_number == pump_number);
    if taken {
        return Err(AppError::Conflict(format!(
            "pump {pump_number} is already registered"
        )));
    }

    let pump = Pump {
        id: Uuid::new_v4(),
        pump_number,
        brand: request
            .brand
            .map(|brand| brand.trim().to_uppercase())
            .filter(|brand| !brand.is_empty()),
        pharmacy_id,
        status: PumpStatus::Available,
        active: true,
        maintenance_due: false,
        maintenance: MaintenanceChecks::default(),
        maintenance_due_at: None,
        maintenance_updated_at: None,
        maintenance_completed_at: None,
        created_by: employee.full_name.clone(),
        created_at: Utc::now(),
    };
    state.pumps.insert(pump.id, pump.clone());
    refresh_pump_gauges(state);

    info!(pump_id = %pump.id, pump_number = %pump.pump_number, "pump registered");
    Ok(pump)
}

pub async fn delete_pump(state: &AppState, pump_id: Uuid, employee_id: Uuid) -> Result<Pump, AppError> {
    let employee = active_employee(state, employee_id)?;

    let _guard = state.workflow_guard.lock().await;
    let pump = state
        .pumps
        .get(&pump_id)
        .map(|pump| pump.clone())
        .ok_or_else(|| AppError::NotFound(format!("pump {pump_id} not found")))?;
    if pump.pharmacy_id != employee.pharmacy_id {
        return Err(AppError::Forbidden(
            "employee cannot manage this pharmacy".to_string(),
        ));
    }
    if committed_pump_ids(&snapshot_orders(state)).contains(&pump_id) {
        return Err(AppError::Conflict(format!(
            "pump {} is on an active order",
            pump.pump_number
        )));
    }

    state.pumps.remove(&pump_id);
    refresh_pump_gauges(state);

    info!(pump_id = %pump_id, pump_number = %pump.pump_number, "pump deleted");
    Ok(pump)
}

pub fn snapshot_orders(state: &AppState) -> Vec<Order> {
    state
        .orders
        .iter()
        .map(|entry| entry.value().clone())
        .collect()
}

pub fn active_employee(state: &AppState, employee_id: Uuid) -> Result<Employee, AppError> {
    state
        .employees
        .get(&employee_id)
        .filter(|employee| employee.active)
        .map(|employee| employee.clone())
        .ok_or_else(|| AppError::NotFound(format!("employee {employee_id} not found")))
}

pub fn active_driver(state: &AppState, driver_id: Uuid) -> Result<Driver, AppError> {
    state
        .drivers
        .get(&driver_id)
        .filter(|driver| driver.active)
        .map(|driver| driver.clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
}

pub fn refresh_pump_gauges(state: &AppState) {
    for status in PumpStatus::ALL {
        let count = state
            .pumps
            .iter()
            .filter(|pump| pump.status == status)
            .count();
        state
            .metrics
            .pumps_by_status
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }
}

fn load_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get(&order_id)
        .map(|order| order.clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
}

fn ensure_transition(order: &Order, to: OrderStatus) -> Result<(), AppError> {
    if order.status.can_transition(to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: order.status,
            to,
        })
    }
}

fn ensure_assigned_driver(order: &Order, driver: &Driver) -> Result<(), AppError> {
    if order.driver_id == Some(driver.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "order is not assigned to this driver".to_string(),
        ))
    }
}

/// Stores `order` (already carrying its new status) and applies the pump
/// status and audit entries tied to that status.
fn commit_transition(
    state: &AppState,
    mut order: Order,
    actor: &Actor,
    now: DateTime<Utc>,
) -> WorkflowOutcome {
    order.status_updated_at = now;
    state.orders.insert(order.id, order.clone());

    let mut pump_update_failures = Vec::new();
    if let Some(action) = movement_for(order.status) {
        let pump_status = pump_status_for(order.status);
        for (pump_id, pump_number) in order.pump_ids.iter().zip(&order.pump_numbers) {
            let updated = match state.pumps.get_mut(pump_id) {
                Some(mut pump) => {
                    pump.status = pump_status;
                    true
                }
                None => false,
            };

            if updated {
                state.record_movement(movement(pump_id, pump_number, &order, action, actor, now));
            } else {
                warn!(order_id = %order.id, pump_number = %pump_number, "pump update failed: pump missing");
                pump_update_failures.push(pump_number.clone());
            }
        }
        refresh_pump_gauges(state);
    }

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[order.status.as_str()])
        .inc();
    state.publish(DispatchEvent::OrderStatus {
        order_id: order.id,
        pharmacy_id: order.pharmacy_id,
        status: order.status,
        driver_id: order.driver_id,
        driver_name: order.driver_name.clone(),
        at: now,
    });

    WorkflowOutcome {
        order,
        pump_update_failures,
    }
}

fn movement(
    pump_id: &Uuid,
    pump_number: &str,
    order: &Order,
    action: MovementAction,
    actor: &Actor,
    now: DateTime<Utc>,
) -> PumpMovement {
    PumpMovement {
        id: Uuid::new_v4(),
        pump_id: *pump_id,
        pump_number: pump_number.to_string(),
        pharmacy_id: order.pharmacy_id,
        order_id: Some(order.id),
        action,
        performed_by_id: actor.id,
        performed_by_name: actor.name.clone(),
        role: actor.role,
        timestamp: now,
    }
}

fn normalize_previous_pumps(
    reported: Vec<PreviousPumpStatus>,
) -> Result<Vec<PreviousPumpStatus>, AppError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(reported.len());
    for entry in reported {
        let pump_number = normalize_pump_input(&entry.pump_number);
        if pump_number.is_empty() {
            return Err(AppError::BadRequest(
                "previous pump entries need a pump number".to_string(),
            ));
        }
        if !seen.insert(pump_number.clone()) {
            continue;
        }
        let reason = entry
            .reason
            .map(|reason| reason.trim().to_uppercase())
            .filter(|reason| !reason.is_empty());
        if !entry.returned && reason.is_none() {
            return Err(AppError::BadRequest(format!(
                "a reason is required for pump {pump_number} not being returned"
            )));
        }
        normalized.push(PreviousPumpStatus {
            pump_number,
            returned: entry.returned,
            reason,
        });
    }
    Ok(normalized)
}

fn employee_actor(employee: &Employee) -> Actor {
    Actor {
        id: employee.id,
        name: employee.full_name.clone(),
        role: ActorRole::Employee,
    }
}

fn driver_actor(driver: &Driver) -> Actor {
    Actor {
        id: driver.id,
        name: driver.full_name.clone(),
        role: ActorRole::Driver,
    }
}

fn observe(state: &AppState, operation: &str, started: Instant) {
    state
        .metrics
        .workflow_latency_seconds
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
}
