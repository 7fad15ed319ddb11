// Domain Layer - Pure business logic and entities

pub mod driver;
pub mod error;
pub mod registration;
pub mod vehicle;

/// Instant in epoch milliseconds
pub type Timestamp = i64;

// Re-exports
pub use driver::{Driver, DriverId, DriverStatus};
pub use error::DomainError;
pub use registration::{normalize_trailer, Registration, RegistrationId, RegistrationState, Route};
pub use vehicle::{normalize_plate, Vehicle, VehicleId, VehicleType};
