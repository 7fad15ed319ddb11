// Registration Domain Model

use super::error::{DomainError, Result};
use super::{Driver, Timestamp, Vehicle};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Registration ID (UUID v4)
pub type RegistrationId = String;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Dispatch route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    CityDelivery,
    Regional,
    LongHaul,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::CityDelivery, Route::Regional, Route::LongHaul];

    /// Nominal door-to-door transit time in milliseconds
    pub fn transit_ms(&self) -> i64 {
        match self {
            Route::CityDelivery => 2 * HOUR_MS,
            Route::Regional => 6 * HOUR_MS,
            Route::LongHaul => 18 * HOUR_MS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Route::CityDelivery => "City delivery",
            Route::Regional => "Regional",
            Route::LongHaul => "Long haul",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::CityDelivery => write!(f, "CITY_DELIVERY"),
            Route::Regional => write!(f, "REGIONAL"),
            Route::LongHaul => write!(f, "LONG_HAUL"),
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "city" | "citydelivery" => Ok(Route::CityDelivery),
            "regional" => Ok(Route::Regional),
            "longhaul" => Ok(Route::LongHaul),
            other => Err(format!("unknown route: {}", other)),
        }
    }
}

/// Registration state, derived from the timestamps and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationState {
    Registered,
    MissedWindow,
    CheckedIn,
    Dispatched,
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationState::Registered => write!(f, "REGISTERED"),
            RegistrationState::MissedWindow => write!(f, "MISSED_WINDOW"),
            RegistrationState::CheckedIn => write!(f, "CHECKED_IN"),
            RegistrationState::Dispatched => write!(f, "DISPATCHED"),
        }
    }
}

/// Canonical trailer form: trimmed and uppercased
pub fn normalize_trailer(trailer_number: &str) -> String {
    trailer_number.trim().to_uppercase()
}

/// Registration Entity
///
/// Invariants:
/// - `check_in_time` is never cleared once set
/// - `is_dispatched` implies `check_in_time` and `trailer_number` are set
/// - `missed_check_in_time` and `check_in_time` both persist once set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub driver: Driver,
    pub vehicle: Option<Vehicle>,
    pub registered_at: Timestamp,
    pub expires_at: Timestamp,
    pub expected_check_in_time: Option<Timestamp>,
    pub check_in_time: Option<Timestamp>,
    pub missed_check_in_time: Option<Timestamp>,
    pub is_dispatched: bool,
    pub dispatch_time: Option<Timestamp>,
    pub trailer_number: Option<String>,
    pub route: Option<Route>,
}

impl Registration {
    /// Create a new registration
    ///
    /// Walk-in (non-continuous) drivers are checked in at `registered_at`;
    /// continuous drivers keep `check_in_time` unset until they arrive.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique registration ID (injected, not generated)
    /// * `registered_at` - Creation instant (injected, not system time)
    /// * `driver` - Owning driver
    /// * `vehicle` - Registered vehicle, if any
    /// * `expected_check_in_time` - Booked slot (continuous drivers only)
    /// * `ttl_ms` - Lifetime of the registration record
    pub fn new(
        id: impl Into<String>,
        registered_at: Timestamp,
        driver: Driver,
        vehicle: Option<Vehicle>,
        expected_check_in_time: Option<Timestamp>,
        ttl_ms: i64,
    ) -> Self {
        let (check_in_time, expected_check_in_time) = if driver.is_continuous {
            (None, expected_check_in_time)
        } else {
            (Some(registered_at), None)
        };

        Self {
            id: id.into(),
            driver,
            vehicle,
            registered_at,
            expires_at: registered_at + ttl_ms,
            expected_check_in_time,
            check_in_time,
            missed_check_in_time: None,
            is_dispatched: false,
            dispatch_time: None,
            trailer_number: None,
            route: None,
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.driver.is_continuous
    }

    pub fn is_checked_in(&self) -> bool {
        self.check_in_time.is_some()
    }

    /// Plate number of the attached vehicle
    pub fn plate(&self) -> Option<&str> {
        self.vehicle.as_ref().map(|v| v.plate_number.as_str())
    }

    /// Active registrations are still waiting in the queue
    pub fn is_active(&self) -> bool {
        !self.is_dispatched
    }

    pub fn state(&self) -> RegistrationState {
        if self.is_dispatched {
            RegistrationState::Dispatched
        } else if self.check_in_time.is_some() {
            RegistrationState::CheckedIn
        } else if self.missed_check_in_time.is_some() {
            RegistrationState::MissedWindow
        } else {
            RegistrationState::Registered
        }
    }

    /// Transition to CheckedIn with explicit timestamp
    pub fn check_in(&mut self, now_millis: Timestamp) -> Result<()> {
        match self.state() {
            RegistrationState::Registered | RegistrationState::MissedWindow => {
                self.check_in_time = Some(now_millis);
                self.driver.mark_checked_in(now_millis);
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition {
                from: other.to_string(),
                to: RegistrationState::CheckedIn.to_string(),
            }),
        }
    }

    /// Record a check-in attempt outside the window
    ///
    /// Only continuous registrations that are not yet checked in can miss.
    /// The first miss is kept; later misses do not move the penalty clock.
    pub fn mark_missed(&mut self, now_millis: Timestamp) -> Result<()> {
        let state = self.state();
        let allowed = self.is_continuous()
            && matches!(
                state,
                RegistrationState::Registered | RegistrationState::MissedWindow
            );
        if !allowed {
            return Err(DomainError::InvalidStateTransition {
                from: state.to_string(),
                to: RegistrationState::MissedWindow.to_string(),
            });
        }
        self.missed_check_in_time.get_or_insert(now_millis);
        Ok(())
    }

    /// Transition to Dispatched with explicit timestamp
    ///
    /// The trailer number is normalized (trimmed, uppercased) and must not be empty.
    pub fn dispatch(
        &mut self,
        now_millis: Timestamp,
        trailer_number: &str,
        route: Route,
    ) -> Result<()> {
        let state = self.state();
        if state != RegistrationState::CheckedIn {
            return Err(DomainError::InvalidStateTransition {
                from: state.to_string(),
                to: RegistrationState::Dispatched.to_string(),
            });
        }

        let trailer = normalize_trailer(trailer_number);
        if trailer.is_empty() {
            return Err(DomainError::ValidationError(
                "trailer number cannot be empty".to_string(),
            ));
        }

        self.driver.mark_dispatched(&trailer);
        self.is_dispatched = true;
        self.dispatch_time = Some(now_millis);
        self.trailer_number = Some(trailer);
        self.route = Some(route);
        Ok(())
    }

    /// Checked in later than `expected + overtime_after_ms`
    pub fn is_overtime(&self, overtime_after_ms: i64) -> bool {
        match (self.expected_check_in_time, self.check_in_time) {
            (Some(expected), Some(check_in)) => check_in > expected + overtime_after_ms,
            _ => false,
        }
    }

    pub fn is_expired(&self, now_millis: Timestamp) -> bool {
        now_millis > self.expires_at
    }

    /// Unchecked with a slot more than `stale_after_ms` in the past
    pub fn is_stale(&self, now_millis: Timestamp, stale_after_ms: i64) -> bool {
        match self.expected_check_in_time {
            Some(expected) => self.check_in_time.is_none() && now_millis > expected + stale_after_ms,
            None => false,
        }
    }

    /// Booked hour as `"H:00-H+1:00"` in the given offset
    pub fn slot_label(&self, offset: &FixedOffset) -> Option<String> {
        let expected = self.expected_check_in_time?;
        let hour = DateTime::<Utc>::from_timestamp_millis(expected)?
            .with_timezone(offset)
            .hour();
        Some(format!("{}:00-{}:00", hour, (hour + 1) % 24))
    }

    /// Dispatch time plus the route's nominal transit time
    pub fn estimated_arrival(&self) -> Option<Timestamp> {
        match (self.dispatch_time, self.route) {
            (Some(dispatched_at), Some(route)) => Some(dispatched_at + route.transit_ms()),
            _ => None,
        }
    }
}
