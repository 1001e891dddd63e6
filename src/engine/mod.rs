pub mod inventory;
pub mod lifecycle;
pub mod notify;
pub mod pin;
pub mod queue;
pub mod scanner;
pub mod tracking;
pub mod workflow;
