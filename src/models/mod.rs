pub mod customer;
pub mod delivery;
pub mod driver;
pub mod employee;
pub mod event;
pub mod movement;
pub mod order;
pub mod pharmacy;
pub mod pump;
