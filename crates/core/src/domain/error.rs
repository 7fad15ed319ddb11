// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Vehicle {plate} is under a missed check-in penalty until {until}")]
    VehicleInPenalty { plate: String, until: i64 },

    #[error("Vehicle {plate} was already registered at {registered_at}")]
    VehicleAlreadyRegistered { plate: String, registered_at: i64 },

    #[error("Invalid registration state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Registration not found: {0}")]
    RegistrationNotFound(String),

    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
