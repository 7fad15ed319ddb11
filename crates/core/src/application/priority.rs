//! Priority Sorter - dispatch order of the queue
//!
//! Every registration is placed in a [`QueueTier`]; earlier tiers are served
//! first. Inside a tier the order is by a single instant:
//!
//! | Tier                 | Members                                             | Ordered by          |
//! |----------------------|-----------------------------------------------------|---------------------|
//! | `PriorDayContinuous` | continuous, checked in before today, not dispatched | check-in time       |
//! | `PriorDayWalkIn`     | walk-in, arrived before today, not dispatched       | registration time   |
//! | `SameDayContinuous`  | continuous, checked in today, not dispatched        | check-in time       |
//! | `SameDayWalkIn`      | walk-in, arrived today, not dispatched              | registration time   |
//! | `AwaitingCheckIn`    | continuous, not checked in                          | slot (or reg. time) |
//! | `Stale`              | not checked in, slot older than the stale threshold | slot                |
//! | `Dispatched`         | archive                                             | dispatch time       |
//!
//! Registration time breaks remaining ties. Continuous and walk-in drivers
//! never share a tier, so the comparator is a lexicographic key comparison
//! and therefore transitive.

use crate::domain::{Registration, Timestamp};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::cmp::Ordering;
use tracing::debug;

/// Queue tier (lower = served earlier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueTier {
    PriorDayContinuous = 0,
    PriorDayWalkIn = 1,
    SameDayContinuous = 2,
    SameDayWalkIn = 3,
    AwaitingCheckIn = 4,
    Stale = 5,
    Dispatched = 6,
}

/// Full sort key: tier, tier-specific instant, registration time
pub type SortKey = (QueueTier, Timestamp, Timestamp);

/// Comparator bound to one instant and calendar
#[derive(Debug, Clone, Copy)]
pub struct PrioritySorter {
    now: Timestamp,
    offset: FixedOffset,
    stale_after_ms: i64,
}

fn calendar_day(at: Timestamp, offset: &FixedOffset) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(at).map(|dt| dt.with_timezone(offset).date_naive())
}

impl PrioritySorter {
    pub fn new(now: Timestamp, offset: FixedOffset, stale_after_ms: i64) -> Self {
        Self {
            now,
            offset,
            stale_after_ms,
        }
    }

    /// Whether `at` falls on a calendar day before today
    fn is_prior_day(&self, at: Timestamp) -> bool {
        match (
            calendar_day(at, &self.offset),
            calendar_day(self.now, &self.offset),
        ) {
            (Some(day), Some(today)) => day < today,
            _ => false,
        }
    }

    pub fn tier(&self, reg: &Registration) -> QueueTier {
        if reg.is_dispatched {
            return QueueTier::Dispatched;
        }
        if reg.is_stale(self.now, self.stale_after_ms) {
            return QueueTier::Stale;
        }

        if reg.is_continuous() {
            match reg.check_in_time {
                Some(check_in) if self.is_prior_day(check_in) => QueueTier::PriorDayContinuous,
                Some(_) => QueueTier::SameDayContinuous,
                None => QueueTier::AwaitingCheckIn,
            }
        } else {
            let arrived = reg.check_in_time.unwrap_or(reg.registered_at);
            if self.is_prior_day(arrived) {
                QueueTier::PriorDayWalkIn
            } else {
                QueueTier::SameDayWalkIn
            }
        }
    }

    pub fn sort_key(&self, reg: &Registration) -> SortKey {
        let tier = self.tier(reg);
        let instant = match tier {
            QueueTier::PriorDayContinuous | QueueTier::SameDayContinuous => {
                reg.check_in_time.unwrap_or(reg.registered_at)
            }
            QueueTier::PriorDayWalkIn | QueueTier::SameDayWalkIn => reg.registered_at,
            QueueTier::AwaitingCheckIn | QueueTier::Stale => {
                reg.expected_check_in_time.unwrap_or(reg.registered_at)
            }
            QueueTier::Dispatched => reg.dispatch_time.unwrap_or(reg.registered_at),
        };
        (tier, instant, reg.registered_at)
    }

    /// `Less` means `a` is served before `b`
    pub fn compare(&self, a: &Registration, b: &Registration) -> Ordering {
        self.sort_key(a).cmp(&self.sort_key(b))
    }

    /// Stable in-place sort into dispatch order
    pub fn sort(&self, registrations: &mut [Registration]) {
        registrations.sort_by_cached_key(|r| self.sort_key(r));
        debug!(
            count = registrations.len(),
            now = self.now,
            "Registrations re-sorted"
        );
    }
}
