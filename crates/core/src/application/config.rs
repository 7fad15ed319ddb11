// Queue configuration

use super::constants::*;
use crate::error::{AppError, Result};
use chrono::{FixedOffset, Offset, Utc};

/// Shared secret guarding the full reset
///
/// Never printed; compare through [`ResetPassphrase::verify`].
#[derive(Clone)]
pub struct ResetPassphrase(String);

impl ResetPassphrase {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn verify(&self, candidate: &str) -> bool {
        // Constant-time over equal-length inputs
        self.0.len() == candidate.len()
            && self
                .0
                .bytes()
                .zip(candidate.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ResetPassphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResetPassphrase(***)")
    }
}

/// Queue engine configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Half-width of the check-in window (ms)
    pub check_in_window_ms: i64,

    /// Missed check-in penalty (ms)
    pub penalty_ms: i64,

    /// Duplicate registration window per plate (ms)
    pub dedup_ms: i64,

    /// Age past the slot after which unchecked registrations sink (ms)
    pub stale_after_ms: i64,

    /// Late check-in threshold for the overtime flag (ms)
    pub overtime_after_ms: i64,

    /// Registration lifetime (ms)
    pub registration_ttl_ms: i64,

    /// Latest bookable slot relative to submission (ms)
    pub max_slot_ahead_ms: i64,

    /// Offset used to decide calendar days (seconds east of UTC)
    pub utc_offset_secs: i32,

    pub reset_passphrase: ResetPassphrase,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            check_in_window_ms: CHECK_IN_WINDOW_MS,
            penalty_ms: PENALTY_MS,
            dedup_ms: DEDUP_MS,
            stale_after_ms: STALE_AFTER_MS,
            overtime_after_ms: OVERTIME_AFTER_MS,
            registration_ttl_ms: REGISTRATION_TTL_MS,
            max_slot_ahead_ms: MAX_SLOT_AHEAD_MS,
            utc_offset_secs: 0,
            reset_passphrase: ResetPassphrase::new(DEFAULT_RESET_PASSPHRASE),
        }
    }
}

impl QueueConfig {
    pub fn with_reset_passphrase(mut self, secret: impl Into<String>) -> Self {
        self.reset_passphrase = ResetPassphrase::new(secret);
        self
    }

    pub fn with_utc_offset_secs(mut self, secs: i32) -> Self {
        self.utc_offset_secs = secs;
        self
    }

    /// Offset for calendar-day decisions (UTC if out of range)
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    pub fn validate(&self) -> Result<()> {
        if FixedOffset::east_opt(self.utc_offset_secs).is_none() {
            return Err(AppError::Config(format!(
                "UTC offset out of range: {} seconds",
                self.utc_offset_secs
            )));
        }

        let durations = [
            ("check_in_window_ms", self.check_in_window_ms),
            ("penalty_ms", self.penalty_ms),
            ("dedup_ms", self.dedup_ms),
            ("stale_after_ms", self.stale_after_ms),
            ("overtime_after_ms", self.overtime_after_ms),
            ("registration_ttl_ms", self.registration_ttl_ms),
            ("max_slot_ahead_ms", self.max_slot_ahead_ms),
        ];
        if let Some((name, value)) = durations.iter().find(|(_, v)| *v <= 0) {
            return Err(AppError::Config(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }

        if self.reset_passphrase.is_empty() {
            return Err(AppError::Config(
                "reset passphrase cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
