// Slot and offset parsing for command-line input

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use truckq_core::domain::Timestamp;

const MAX_OFFSET_SECS: i32 = 14 * 3600;

/// Parse a UTC offset such as `+08:00`, `-05:30`, `8` or `Z` into seconds east of UTC
pub fn parse_utc_offset(input: &str) -> std::result::Result<i32, String> {
    let s = input.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(0);
    }

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let secs = if !digits.is_empty() && digits.len() <= 2 && digits.bytes().all(|b| b.is_ascii_digit()) {
        // Bare hour shorthand
        let hours: i32 = digits
            .parse()
            .map_err(|_| format!("invalid UTC offset: {}", input))?;
        if negative {
            -hours * 3600
        } else {
            hours * 3600
        }
    } else {
        s.parse::<FixedOffset>()
            .map_err(|e| format!("invalid UTC offset '{}': {}", input, e))?
            .local_minus_utc()
    };

    if secs.abs() > MAX_OFFSET_SECS {
        return Err(format!("UTC offset out of range: {}", input));
    }
    Ok(secs)
}

/// Resolve an `HH:MM` slot to the next occurrence at or after `now`
pub fn resolve_slot(input: &str, now: Timestamp, offset: &FixedOffset) -> Result<Timestamp> {
    let time = NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .with_context(|| format!("Invalid slot '{}', expected HH:MM", input))?;

    let local_now = DateTime::<Utc>::from_timestamp_millis(now)
        .context("Clock out of range")?
        .with_timezone(offset);
    let mut slot = local_now
        .date_naive()
        .and_time(time)
        .and_local_timezone(*offset)
        .single()
        .with_context(|| format!("Slot '{}' does not exist today", input))?;

    if slot.timestamp_millis() < now {
        slot += Duration::days(1);
    }
    Ok(slot.timestamp_millis())
}
