// Queue constants (No magic values)

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Half-width of the check-in window around the booked slot (15 minutes)
pub const CHECK_IN_WINDOW_MS: i64 = 15 * MINUTE_MS;

/// Penalty after a missed check-in during which the plate cannot register (12 hours)
pub const PENALTY_MS: i64 = 12 * HOUR_MS;

/// A plate registered within this period cannot register again (24 hours)
pub const DEDUP_MS: i64 = DAY_MS;

/// Unchecked registrations whose slot is older than this sink to the end of the queue (12 hours)
pub const STALE_AFTER_MS: i64 = 12 * HOUR_MS;

/// Check-in later than slot + this counts as overtime (30 minutes)
pub const OVERTIME_AFTER_MS: i64 = 30 * MINUTE_MS;

/// Registration record lifetime (1 day)
pub const REGISTRATION_TTL_MS: i64 = DAY_MS;

/// Latest bookable slot, relative to submission (12 hours)
pub const MAX_SLOT_AHEAD_MS: i64 = 12 * HOUR_MS;

/// Capacity of the queue event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Built-in reset passphrase, replaced through configuration in deployments
pub const DEFAULT_RESET_PASSPHRASE: &str = "truckq-reset";
