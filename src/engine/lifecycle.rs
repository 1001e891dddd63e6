//! Order status transition table and the pump side effects tied to each
//! status.

use crate::models::movement::MovementAction;
use crate::models::order::OrderStatus;
use crate::models::pump::PumpStatus;

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::OnWayToPharmacy => "ON_WAY_TO_PHARMACY",
            OrderStatus::OnWayToCustomer => "ON_WAY_TO_CUSTOMER",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Assigned),
            OrderStatus::Assigned => Some(OrderStatus::OnWayToPharmacy),
            OrderStatus::OnWayToPharmacy => Some(OrderStatus::OnWayToCustomer),
            OrderStatus::OnWayToCustomer => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Orders in these states still hold their pumps.
    pub fn holds_pumps(self) -> bool {
        !self.is_terminal()
    }

    /// Statuses a driver works on after accepting.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            OrderStatus::Assigned | OrderStatus::OnWayToPharmacy | OrderStatus::OnWayToCustomer
        )
    }

    /// Pumps have not left the pharmacy yet.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Assigned | OrderStatus::OnWayToPharmacy
        )
    }

    pub fn can_transition(self, to: OrderStatus) -> bool {
        if to == OrderStatus::Cancelled {
            return self.is_cancellable();
        }
        self.next() == Some(to)
    }
}

/// Pump status that must accompany an order entering `status`.
pub fn pump_status_for(status: OrderStatus) -> PumpStatus {
    match status {
        OrderStatus::Pending => PumpStatus::Assigned,
        OrderStatus::Assigned | OrderStatus::OnWayToPharmacy | OrderStatus::OnWayToCustomer => {
            PumpStatus::InTransit
        }
        OrderStatus::Delivered => PumpStatus::Delivered,
        OrderStatus::Cancelled => PumpStatus::Available,
    }
}

/// Audit entry written per pump when an order enters `status`. Steps that
/// don't move the pump are not logged.
pub fn movement_for(status: OrderStatus) -> Option<MovementAction> {
    match status {
        OrderStatus::Pending => Some(MovementAction::Assigned),
        OrderStatus::Assigned => Some(MovementAction::PickedUp),
        OrderStatus::Delivered => Some(MovementAction::Delivered),
        OrderStatus::Cancelled => Some(MovementAction::Released),
        OrderStatus::OnWayToPharmacy | OrderStatus::OnWayToCustomer => None,
    }
}
