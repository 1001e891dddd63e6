//! PIN handling. A 4-digit PIN is the whole credential for every role.

use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

const PIN_LEN: usize = 4;
const MAX_PIN_ATTEMPTS: usize = 64;

pub fn validate_pin(pin: &str) -> Result<(), AppError> {
    if pin.len() == PIN_LEN && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::InvalidPin)
    }
}

pub fn pin_in_use(state: &AppState, pin: &str) -> bool {
    state.admin_pin.as_deref() == Some(pin)
        || state.pharmacies.iter().any(|entry| entry.pin == pin)
        || state.employees.iter().any(|entry| entry.pin == pin)
        || state.drivers.iter().any(|entry| entry.pin == pin)
}

/// Draws a PIN in `1000..=9999` that no pharmacy, employee or driver holds.
pub fn generate_unique_pin(state: &AppState) -> Result<String, AppError> {
    let mut rng = rand::rng();
    for _ in 0..MAX_PIN_ATTEMPTS {
        let candidate = rng.random_range(1000..=9999u16).to_string();
        if !pin_in_use(state, &candidate) {
            return Ok(candidate);
        }
    }

    (1000..=9999u16)
        .map(|value| value.to_string())
        .find(|candidate| !pin_in_use(state, candidate))
        .ok_or_else(|| AppError::Conflict("no free pins left".to_string()))
}

/// What the client keeps after a successful login.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Admin,
    Pharmacy {
        pharmacy_id: Uuid,
        pharmacy_name: String,
        city: String,
        state: String,
        country: String,
    },
    Employee {
        employee_id: Uuid,
        employee_name: String,
        email: String,
        pharmacy_id: Uuid,
        pharmacy_name: String,
    },
    Driver {
        driver_id: Uuid,
        driver_name: String,
    },
}

/// Resolves a PIN in precedence order: admin, pharmacy, employee, driver.
/// Inactive records never match.
pub fn resolve_login(state: &AppState, pin: &str) -> Result<Session, AppError> {
    validate_pin(pin)?;

    if state.admin_pin.as_deref() == Some(pin) {
        info!("admin login");
        return Ok(Session::Admin);
    }

    if let Some(pharmacy) = state
        .pharmacies
        .iter()
        .find(|entry| entry.active && entry.pin == pin)
    {
        info!(pharmacy_id = %pharmacy.id, "pharmacy login");
        return Ok(Session::Pharmacy {
            pharmacy_id: pharmacy.id,
            pharmacy_name: pharmacy.name.clone(),
            city: pharmacy.city.clone(),
            state: pharmacy.state.clone(),
            country: pharmacy.country.clone(),
        });
    }

    if let Some(employee) = state
        .employees
        .iter()
        .find(|entry| entry.active && entry.pin == pin)
    {
        info!(employee_id = %employee.id, "employee login");
        return Ok(Session::Employee {
            employee_id: employee.id,
            employee_name: employee.full_name.clone(),
            email: employee.email.clone(),
            pharmacy_id: employee.pharmacy_id,
            pharmacy_name: employee.pharmacy_name.clone(),
        });
    }

    if let Some(driver) = state
        .drivers
        .iter()
        .find(|entry| entry.active && entry.pin == pin)
    {
        info!(driver_id = %driver.id, "driver login");
        return Ok(Session::Driver {
            driver_id: driver.id,
            driver_name: driver.full_name.clone(),
        });
    }

    Err(AppError::InvalidPin)
}
