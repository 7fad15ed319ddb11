// Driver Domain Model

use super::Timestamp;
use serde::{Deserialize, Serialize};

/// Driver ID (UUID v4)
pub type DriverId = String;

/// Driver lifecycle status, mirrored from the driver's active registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Registered,
    CheckedIn,
    Dispatched,
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverStatus::Registered => write!(f, "REGISTERED"),
            DriverStatus::CheckedIn => write!(f, "CHECKED_IN"),
            DriverStatus::Dispatched => write!(f, "DISPATCHED"),
        }
    }
}

/// Driver Entity
///
/// A continuous driver books an expected check-in slot and must arrive inside
/// the check-in window. Any other driver is checked in the moment they register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub license_number: Option<String>,
    pub is_continuous: bool,
    pub expected_check_in_time: Option<Timestamp>,
    pub status: DriverStatus,
    pub check_in_time: Option<Timestamp>,
    pub trailer_number: Option<String>,
}

impl Driver {
    /// Create a new driver
    ///
    /// # Arguments
    ///
    /// * `id` - Unique driver ID (injected, not generated)
    /// * `registered_at` - Registration instant (injected, not system time)
    /// * `name` - Display name
    /// * `phone_number` - Contact number
    /// * `is_continuous` - Whether the driver runs on a booked slot
    /// * `expected_check_in_time` - Booked slot, ignored for non-continuous drivers
    pub fn new(
        id: impl Into<String>,
        registered_at: Timestamp,
        name: impl Into<String>,
        phone_number: impl Into<String>,
        is_continuous: bool,
        expected_check_in_time: Option<Timestamp>,
    ) -> Self {
        let (status, check_in_time, expected_check_in_time) = if is_continuous {
            (DriverStatus::Registered, None, expected_check_in_time)
        } else {
            (DriverStatus::CheckedIn, Some(registered_at), None)
        };

        Self {
            id: id.into(),
            name: name.into(),
            phone_number: phone_number.into(),
            license_number: None,
            is_continuous,
            expected_check_in_time,
            status,
            check_in_time,
            trailer_number: None,
        }
    }

    pub fn with_license_number(mut self, license_number: Option<String>) -> Self {
        self.license_number = license_number;
        self
    }

    pub(crate) fn mark_checked_in(&mut self, now_millis: Timestamp) {
        self.status = DriverStatus::CheckedIn;
        self.check_in_time.get_or_insert(now_millis);
    }

    pub(crate) fn mark_dispatched(&mut self, trailer_number: &str) {
        self.status = DriverStatus::Dispatched;
        self.trailer_number = Some(trailer_number.to_string());
    }
}
