//! Eligibility & penalty rules
//!
//! Pure functions over registrations and an explicit `now`:
//! - check-in window: `expected ± window` (bounds inclusive)
//! - penalty: a missed, never checked-in registration blocks its plate until `missed + penalty`
//! - dedup: a plate registered at `T` cannot register again while `now <= T + dedup`
//! - a vehicle registered but not yet attached to any registration holds its
//!   plate for the same dedup window

use crate::domain::{normalize_plate, Registration, Timestamp, Vehicle};

/// Inclusive `[earliest, latest]` check-in range around a booked slot
pub fn check_in_window(expected: Timestamp, window_ms: i64) -> (Timestamp, Timestamp) {
    (expected - window_ms, expected + window_ms)
}

/// Whether a continuous driver may check in right now
///
/// Always false for walk-in drivers (they never need to) and for
/// registrations without a booked slot.
pub fn can_check_in(registration: &Registration, now: Timestamp, window_ms: i64) -> bool {
    if !registration.is_continuous() {
        return false;
    }
    match registration.expected_check_in_time {
        Some(expected) => {
            let (earliest, latest) = check_in_window(expected, window_ms);
            now >= earliest && now <= latest
        }
        None => false,
    }
}

fn matches_plate(registration: &Registration, plate: &str) -> bool {
    registration.plate() == Some(plate)
}

/// End of the active penalty for `plate`, if any
///
/// When several misses are unresolved the latest expiry wins.
pub fn penalty_until(
    registrations: &[Registration],
    plate: &str,
    now: Timestamp,
    penalty_ms: i64,
) -> Option<Timestamp> {
    let plate = normalize_plate(plate);
    registrations
        .iter()
        .filter(|r| matches_plate(r, &plate) && r.check_in_time.is_none())
        .filter_map(|r| r.missed_check_in_time)
        .map(|missed| missed + penalty_ms)
        .filter(|until| now < *until)
        .max()
}

pub fn is_vehicle_in_penalty(
    registrations: &[Registration],
    plate: &str,
    now: Timestamp,
    penalty_ms: i64,
) -> bool {
    penalty_until(registrations, plate, now, penalty_ms).is_some()
}

/// Most recent registration time of `plate` inside the dedup window, if any
pub fn latest_registration_within(
    registrations: &[Registration],
    plate: &str,
    now: Timestamp,
    dedup_ms: i64,
) -> Option<Timestamp> {
    let plate = normalize_plate(plate);
    let cutoff = now - dedup_ms;
    registrations
        .iter()
        .filter(|r| matches_plate(r, &plate) && r.registered_at >= cutoff)
        .map(|r| r.registered_at)
        .max()
}

pub fn is_registered_within(
    registrations: &[Registration],
    plate: &str,
    now: Timestamp,
    dedup_ms: i64,
) -> bool {
    latest_registration_within(registrations, plate, now, dedup_ms).is_some()
}

/// Registration time of a vehicle holding `plate` that no registration has claimed yet
pub fn unclaimed_vehicle_within(
    vehicles: &[Vehicle],
    registrations: &[Registration],
    plate: &str,
    now: Timestamp,
    dedup_ms: i64,
) -> Option<Timestamp> {
    let plate = normalize_plate(plate);
    let cutoff = now - dedup_ms;
    vehicles
        .iter()
        .filter(|v| v.plate_number == plate && v.registered_at >= cutoff)
        .filter(|v| {
            !registrations
                .iter()
                .any(|r| r.vehicle.as_ref().map_or(false, |rv| rv.id == v.id))
        })
        .map(|v| v.registered_at)
        .max()
}
