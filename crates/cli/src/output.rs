// Table rendering for queue listings

use chrono::{DateTime, FixedOffset, Utc};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use truckq_core::application::eligibility::can_check_in;
use truckq_core::application::QueueConfig;
use truckq_core::domain::{Registration, Timestamp};

/// `MM-DD HH:MM` in the configured offset
pub fn format_time(at: Timestamp, offset: &FixedOffset) -> String {
    DateTime::<Utc>::from_timestamp_millis(at)
        .map(|dt| dt.with_timezone(offset).format("%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_opt(at: Option<Timestamp>, offset: &FixedOffset) -> String {
    at.map(|t| format_time(t, offset))
        .unwrap_or_else(|| "-".to_string())
}

fn plate(reg: &Registration) -> String {
    reg.plate().unwrap_or("-").to_string()
}

fn kind(reg: &Registration) -> &'static str {
    if reg.is_continuous() {
        "continuous"
    } else {
        "walk-in"
    }
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Registration")]
    id: String,
    #[tabled(rename = "Plate")]
    plate: String,
    #[tabled(rename = "Vehicle")]
    vehicle_type: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Checked in")]
    checked_in: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Active registrations in dispatch order
pub fn queue_table(registrations: &[Registration], config: &QueueConfig) -> String {
    let offset = config.utc_offset();
    let rows = registrations
        .iter()
        .enumerate()
        .map(|(i, reg)| {
            let mut checked_in = format_opt(reg.check_in_time, &offset);
            if reg.is_overtime(config.overtime_after_ms) {
                checked_in.push_str(" (late)");
            }
            QueueRow {
                position: i + 1,
                id: reg.id.clone(),
                plate: plate(reg),
                vehicle_type: reg
                    .vehicle
                    .as_ref()
                    .map(|v| v.vehicle_type.label().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                driver: reg.driver.name.clone(),
                kind: kind(reg),
                slot: reg.slot_label(&offset).unwrap_or_else(|| "-".to_string()),
                checked_in,
                state: reg.state().to_string(),
            }
        })
        .collect();
    render::<QueueRow>(rows)
}

#[derive(Tabled)]
struct PendingRow {
    #[tabled(rename = "Registration")]
    id: String,
    #[tabled(rename = "Plate")]
    plate: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Open now")]
    open_now: &'static str,
    #[tabled(rename = "Missed at")]
    missed_at: String,
}

/// Registrations still waiting for check-in
pub fn pending_table(registrations: &[Registration], config: &QueueConfig, now: Timestamp) -> String {
    let offset = config.utc_offset();
    let rows = registrations
        .iter()
        .map(|reg| PendingRow {
            id: reg.id.clone(),
            plate: plate(reg),
            driver: reg.driver.name.clone(),
            phone: reg.driver.phone_number.clone(),
            expected: format_opt(reg.expected_check_in_time, &offset),
            open_now: if can_check_in(reg, now, config.check_in_window_ms) {
                "yes"
            } else {
                "no"
            },
            missed_at: format_opt(reg.missed_check_in_time, &offset),
        })
        .collect();
    render::<PendingRow>(rows)
}

#[derive(Tabled)]
struct DispatchRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Registration")]
    id: String,
    #[tabled(rename = "Plate")]
    plate: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Checked in")]
    checked_in: String,
    #[tabled(rename = "Waiting (min)")]
    waiting_minutes: i64,
}

/// Checked-in registrations awaiting a trailer
pub fn dispatch_table(registrations: &[Registration], config: &QueueConfig, now: Timestamp) -> String {
    let offset = config.utc_offset();
    let rows = registrations
        .iter()
        .enumerate()
        .map(|(i, reg)| DispatchRow {
            position: i + 1,
            id: reg.id.clone(),
            plate: plate(reg),
            driver: reg.driver.name.clone(),
            kind: kind(reg),
            checked_in: format_opt(reg.check_in_time, &offset),
            waiting_minutes: reg
                .check_in_time
                .map(|at| (now - at).max(0) / 60_000)
                .unwrap_or(0),
        })
        .collect();
    render::<DispatchRow>(rows)
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Registration")]
    id: String,
    #[tabled(rename = "Registered")]
    registered_at: String,
    #[tabled(rename = "Plate")]
    plate: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Trailer")]
    trailer: String,
    #[tabled(rename = "Route")]
    route: String,
    #[tabled(rename = "Dispatched")]
    dispatched_at: String,
    #[tabled(rename = "ETA")]
    eta: String,
}

/// Every registration, newest first
pub fn history_table(registrations: &[Registration], config: &QueueConfig) -> String {
    let offset = config.utc_offset();
    let rows = registrations
        .iter()
        .map(|reg| HistoryRow {
            id: reg.id.clone(),
            registered_at: format_time(reg.registered_at, &offset),
            plate: plate(reg),
            driver: reg.driver.name.clone(),
            state: reg.state().to_string(),
            trailer: reg.trailer_number.clone().unwrap_or_else(|| "-".to_string()),
            route: reg
                .route
                .map(|r| r.label().to_string())
                .unwrap_or_else(|| "-".to_string()),
            dispatched_at: format_opt(reg.dispatch_time, &offset),
            eta: format_opt(reg.estimated_arrival(), &offset),
        })
        .collect();
    render::<HistoryRow>(rows)
}
