use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::engine::notify::EmailMessage;
use crate::models::customer::Customer;
use crate::models::delivery::PickupRecord;
use crate::models::driver::Driver;
use crate::models::employee::Employee;
use crate::models::event::DispatchEvent;
use crate::models::movement::PumpMovement;
use crate::models::order::Order;
use crate::models::pharmacy::Pharmacy;
use crate::models::pump::Pump;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub pharmacies: DashMap<Uuid, Pharmacy>,
    pub employees: DashMap<Uuid, Employee>,
    pub drivers: DashMap<Uuid, Driver>,
    pub customers: DashMap<Uuid, Customer>,
    pub pumps: DashMap<Uuid, Pump>,
    pub orders: DashMap<Uuid, Order>,
    /// Keyed by order id.
    pub pickups: DashMap<Uuid, PickupRecord>,
    movements: Mutex<Vec<PumpMovement>>,
    /// Held by every operation that reads then writes pump or order status.
    pub workflow_guard: tokio::sync::Mutex<()>,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub email_tx: mpsc::Sender<EmailMessage>,
    pub admin_pin: Option<String>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        email_queue_size: usize,
        admin_pin: Option<String>,
    ) -> (Self, mpsc::Receiver<EmailMessage>) {
        let (email_tx, email_rx) = mpsc::channel(email_queue_size);
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                pharmacies: DashMap::new(),
                employees: DashMap::new(),
                drivers: DashMap::new(),
                customers: DashMap::new(),
                pumps: DashMap::new(),
                orders: DashMap::new(),
                pickups: DashMap::new(),
                movements: Mutex::new(Vec::new()),
                workflow_guard: tokio::sync::Mutex::new(()),
                events_tx,
                email_tx,
                admin_pin,
                metrics: Metrics::new(),
            },
            email_rx,
        )
    }

    pub fn record_movement(&self, movement: PumpMovement) {
        self.movement_log().push(movement);
    }

    pub fn movements_where<F>(&self, predicate: F) -> Vec<PumpMovement>
    where
        F: Fn(&PumpMovement) -> bool,
    {
        self.movement_log()
            .iter()
            .filter(|&movement| predicate(movement))
            .cloned()
            .collect()
    }

    pub fn movement_count(&self) -> usize {
        self.movement_log().len()
    }

    pub fn publish(&self, event: DispatchEvent) {
        let _ = self.events_tx.send(event);
    }

    // Append-only: a poisoned lock still guards whole entries.
    fn movement_log(&self) -> MutexGuard<'_, Vec<PumpMovement>> {
        self.movements.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
